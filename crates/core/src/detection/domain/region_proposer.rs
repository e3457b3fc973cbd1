use crate::shared::image_view::ImageView;
use crate::shared::rect::Rectangle;

/// Domain interface for candidate region search.
///
/// Output order is the implementation's scan order and must be preserved
/// downstream; landmark shapes are matched to rectangles by index.
pub trait RegionProposer: Send {
    fn propose(&self, image: &ImageView<'_>) -> Result<Vec<Rectangle>, Box<dyn std::error::Error>>;
}
