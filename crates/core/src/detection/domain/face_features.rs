//! Named facial features on the 68-point landmark layout.
//!
//! Index ranges follow the iBUG 300-W annotation used by the common
//! 68-point shape models. Shapes with any other cardinality have no
//! feature mapping.

use crate::detection::domain::shape::{LandmarkPoint, Shape};
use crate::shared::rect::Rectangle;

pub const FULL_FACE_PARTS: usize = 68;

/// Extra horizontal margin on each side of a feature box, in pixels.
const HORIZONTAL_MARGIN: i32 = 8;
/// Feature box side divided by this gives the mask feathering kernel.
const KERNEL_RATE: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FacialFeature {
    Jaw,
    RightBrow,
    LeftBrow,
    Nose,
    RightEye,
    LeftEye,
    Mouth,
}

impl FacialFeature {
    pub const ALL: &[FacialFeature] = &[
        FacialFeature::Jaw,
        FacialFeature::RightBrow,
        FacialFeature::LeftBrow,
        FacialFeature::Nose,
        FacialFeature::RightEye,
        FacialFeature::LeftEye,
        FacialFeature::Mouth,
    ];

    /// Half-open landmark index range of the feature.
    pub fn range(&self) -> std::ops::Range<usize> {
        match self {
            FacialFeature::Jaw => 0..17,
            FacialFeature::RightBrow => 17..22,
            FacialFeature::LeftBrow => 22..27,
            FacialFeature::Nose => 27..35,
            FacialFeature::RightEye => 36..42,
            FacialFeature::LeftEye => 42..48,
            FacialFeature::Mouth => 48..61,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FacialFeature::Jaw => "jaw",
            FacialFeature::RightBrow => "right_brow",
            FacialFeature::LeftBrow => "left_brow",
            FacialFeature::Nose => "nose",
            FacialFeature::RightEye => "right_eye",
            FacialFeature::LeftEye => "left_eye",
            FacialFeature::Mouth => "mouth",
        }
    }

    pub fn from_name(name: &str) -> Option<FacialFeature> {
        FacialFeature::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl Shape {
    /// Points of one feature, `None` unless this is a 68-point shape.
    pub fn feature_points(&self, feature: FacialFeature) -> Option<&[LandmarkPoint]> {
        if self.num_parts() != FULL_FACE_PARTS {
            return None;
        }
        Some(&self.points()[feature.range()])
    }
}

/// Bounding box of a feature's points, padded and clipped to the image.
///
/// The box is widened by a fixed horizontal margin, then grown on every
/// side by `floor(sqrt(area) / 20)` so larger features get larger margins.
pub fn feature_bounds(points: &[LandmarkPoint], image_w: u32, image_h: u32) -> Option<Rectangle> {
    let (left, top, right, bottom) = widened_extent(points)?;
    let pad = (box_side(left, top, right, bottom) / 20.0) as i32;

    let bounds = Rectangle::from_edges(
        (left - pad).max(0),
        (top - pad).max(0),
        (right + pad).min(image_w as i32),
        (bottom + pad).min(image_h as i32),
    );
    if bounds.is_empty() {
        return None;
    }
    Some(bounds)
}

/// Odd Gaussian kernel size used to feather a feature mask: the widened
/// box's mean side over 15, at least 1.
pub fn feature_kernel_size(points: &[LandmarkPoint]) -> Option<u32> {
    let (left, top, right, bottom) = widened_extent(points)?;
    let size = ((box_side(left, top, right, bottom) / KERNEL_RATE) as u32).max(1);
    Some(size | 1)
}

/// Min/max box of `points`, widened horizontally by the fixed margin.
fn widened_extent(points: &[LandmarkPoint]) -> Option<(i32, i32, i32, i32)> {
    let first = points.first()?;
    let (mut left, mut top, mut right, mut bottom) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        left = left.min(p.x);
        right = right.max(p.x);
        top = top.min(p.y);
        bottom = bottom.max(p.y);
    }
    Some((left - HORIZONTAL_MARGIN, top, right + HORIZONTAL_MARGIN, bottom))
}

/// Square root of the box area.
fn box_side(left: i32, top: i32, right: i32, bottom: i32) -> f64 {
    let area = ((bottom - top) as f64) * ((right - left) as f64);
    area.max(0.0).sqrt()
}
