use serde::Serialize;

/// A landmark position in the pixel coordinates of the source image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct LandmarkPoint {
    pub x: i32,
    pub y: i32,
}

impl LandmarkPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Ordered landmark points produced by a shape model.
///
/// Cardinality and index meaning are fixed by the model that produced it;
/// points are never reordered after prediction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Shape {
    points: Vec<LandmarkPoint>,
}

impl Shape {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    pub fn num_parts(&self) -> usize {
        self.points.len()
    }

    pub fn part(&self, index: usize) -> Option<LandmarkPoint> {
        self.points.get(index).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl From<Vec<LandmarkPoint>> for Shape {
    fn from(points: Vec<LandmarkPoint>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_preserves_order() {
        let shape = Shape::new(vec![
            LandmarkPoint::new(5, 6),
            LandmarkPoint::new(1, 2),
            LandmarkPoint::new(3, 4),
        ]);
        assert_eq!(shape.num_parts(), 3);
        assert_eq!(shape.part(0), Some(LandmarkPoint::new(5, 6)));
        assert_eq!(shape.part(2), Some(LandmarkPoint::new(3, 4)));
        assert_eq!(shape.part(3), None);
    }

    #[test]
    fn test_serializes_as_point_array() {
        let shape = Shape::new(vec![LandmarkPoint::new(1, 2)]);
        let json = serde_json::to_string(&shape).unwrap();
        assert_eq!(json, r#"[{"x":1,"y":2}]"#);
    }
}
