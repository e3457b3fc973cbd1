use crate::detection::domain::shape::Shape;
use crate::shared::image_view::ImageView;
use crate::shared::rect::Rectangle;

/// Domain interface for per-region landmark regression.
pub trait LandmarkExtractor: Send {
    /// Number of points every returned [`Shape`] carries.
    fn num_parts(&self) -> usize;

    fn extract(
        &self,
        image: &ImageView<'_>,
        region: &Rectangle,
    ) -> Result<Shape, Box<dyn std::error::Error>>;
}
