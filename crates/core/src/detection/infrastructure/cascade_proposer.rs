//! Face region proposer driving a [`CascadeClassifier`] over an image pyramid.
//!
//! The image is never resized; instead the classifier's features are scaled
//! and evaluated against one integral image of the input.
use crate::detection::domain::region_proposer::RegionProposer;
use crate::detection::infrastructure::cascade_classifier::CascadeClassifier;
use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::detection::infrastructure::rect_grouping::{group_rectangles, DEFAULT_GROUP_EPS};
use crate::shared::config::CascadeParams;
use crate::shared::image_view::ImageView;
use crate::shared::rect::Rectangle;

/// Window scale at or below which the search steps two pixels at a time.
const COARSE_STEP_MAX_SCALE: f64 = 2.0;

pub struct CascadeProposer {
    classifier: CascadeClassifier,
    params: CascadeParams,
}

impl CascadeProposer {
    /// Invalid parameters are replaced by the defaults; a scale factor of
    /// 1 or less would never leave the first pyramid level.
    pub fn new(classifier: CascadeClassifier, params: CascadeParams) -> Self {
        log::debug!(
            "Cascade proposer: {} stages, {:?} window",
            classifier.num_stages(),
            classifier.window_size()
        );
        Self {
            classifier,
            params: params.or_default(),
        }
    }

    /// Every window accepted by the cascade, before grouping.
    ///
    /// Windows are visited scale by scale, row-major within a scale.
    pub fn raw_hits(&self, image: &ImageView<'_>) -> Vec<Rectangle> {
        let (img_w, img_h) = (image.width(), image.height());
        let (base_w, base_h) = self.classifier.window_size();
        if img_w < base_w || img_h < base_h {
            return Vec::new();
        }

        let ii = IntegralImage::new(image);
        let mut hits = Vec::new();
        let mut scale = 1.0f64;

        loop {
            let cascade = self.classifier.scaled(scale);
            let (win_w, win_h) = cascade.window_size();
            if win_w > img_w || win_h > img_h {
                break;
            }
            if let Some((max_w, max_h)) = self.params.max_size {
                if win_w > max_w || win_h > max_h {
                    break;
                }
            }

            let (min_w, min_h) = self.params.min_size;
            if win_w >= min_w && win_h >= min_h {
                let step = if scale > COARSE_STEP_MAX_SCALE { 1 } else { 2 };
                for y in (0..=img_h - win_h).step_by(step) {
                    for x in (0..=img_w - win_w).step_by(step) {
                        if cascade.evaluate(&ii, x, y) {
                            hits.push(Rectangle::new(
                                x as i32,
                                y as i32,
                                win_w as i32,
                                win_h as i32,
                            ));
                        }
                    }
                }
            }

            scale *= self.params.scale_factor;
        }
        hits
    }
}

impl RegionProposer for CascadeProposer {
    fn propose(&self, image: &ImageView<'_>) -> Result<Vec<Rectangle>, Box<dyn std::error::Error>> {
        let hits = self.raw_hits(image);
        let mut grouped = group_rectangles(&hits, self.params.min_neighbors, DEFAULT_GROUP_EPS);
        log::debug!(
            "Cascade search: {} raw hits, {} grouped",
            hits.len(),
            grouped.len()
        );

        if self.params.biggest_only && grouped.len() > 1 {
            let mut best = 0;
            for (i, r) in grouped.iter().enumerate() {
                if r.area() > grouped[best].area() {
                    best = i;
                }
            }
            grouped = vec![grouped[best]];
        }
        Ok(grouped)
    }
}
