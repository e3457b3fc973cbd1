use serde::Serialize;

use crate::detection::domain::shape::{LandmarkPoint, Shape};
use crate::shared::rect::Rectangle;

/// One detected object: where it is, what it is, and optionally its landmarks.
///
/// `shape` is `None` when no landmark model is loaded for the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub rect: Rectangle,
    pub label: &'static str,
    pub shape: Option<Shape>,
}

impl Detection {
    pub fn new(rect: Rectangle, label: &'static str, shape: Option<Shape>) -> Self {
        Self { rect, label, shape }
    }

    /// Landmark points, empty when no shape was extracted.
    pub fn landmarks(&self) -> &[LandmarkPoint] {
        self.shape.as_ref().map(|s| s.points()).unwrap_or(&[])
    }
}

/// Detections in region-proposer output order.
///
/// Index `i` always corresponds to the `i`-th proposed rectangle; callers
/// pair shapes with rectangles by position.
pub type DetectionResult = Vec<Detection>;
