//! Ensemble of regression trees landmark predictor (Kazemi & Sullivan).
//!
//! Shapes live in a unit box while regressing and are mapped onto the face
//! rectangle only to sample pixels and to report the final points.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detection::domain::landmark_extractor::LandmarkExtractor;
use crate::detection::domain::shape::{LandmarkPoint, Shape};
use crate::detection::infrastructure::math::similarity_matrix;
use crate::detection::infrastructure::model_error::{read_json, ModelLoadError};
use crate::shared::image_view::ImageView;
use crate::shared::rect::Rectangle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeModel {
    /// Mean shape in unit-box coordinates.
    pub initial_shape: Vec<(f32, f32)>,
    pub cascades: Vec<CascadeLevel>,
}

/// One regression stage: feature pixels placed relative to anchor parts,
/// and the trees reading them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeLevel {
    pub anchor_idx: Vec<usize>,
    pub deltas: Vec<(f32, f32)>,
    pub forest: Vec<RegressionTree>,
}

/// Complete binary tree stored breadth-first: node `i` has children
/// `2i + 1` and `2i + 2`; leaves follow the last split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub splits: Vec<Split>,
    pub leaf_values: Vec<Vec<(f32, f32)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub idx1: usize,
    pub idx2: usize,
    pub thresh: f32,
}

impl RegressionTree {
    fn leaf(&self, features: &[f32]) -> &[(f32, f32)] {
        let mut i = 0;
        while i < self.splits.len() {
            let split = &self.splits[i];
            i = if features[split.idx1] - features[split.idx2] > split.thresh {
                2 * i + 1
            } else {
                2 * i + 2
            };
        }
        &self.leaf_values[i - self.splits.len()]
    }
}

pub struct ShapePredictor {
    model: ShapeModel,
}

impl ShapePredictor {
    pub fn from_model(model: ShapeModel) -> Result<Self, ModelLoadError> {
        validate(&model)?;
        Ok(Self { model })
    }

    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        Self::from_model(read_json(path)?)
    }

    /// Regressed shape in unit-box coordinates of `region`.
    fn regress(&self, image: &ImageView<'_>, region: &Rectangle) -> Vec<(f32, f32)> {
        let initial = &self.model.initial_shape;
        let mut current = initial.clone();
        let mut features = Vec::new();

        for level in &self.model.cascades {
            let m = similarity_matrix(initial, &current);
            features.clear();
            for (&anchor, &(dx, dy)) in level.anchor_idx.iter().zip(&level.deltas) {
                let (ax, ay) = current[anchor];
                let px = ax + m[0][0] * dx + m[0][1] * dy;
                let py = ay + m[1][0] * dx + m[1][1] * dy;
                let (ix, iy) = to_image(region, px, py);
                features.push(pixel_value(image, ix.round() as i64, iy.round() as i64));
            }
            for tree in &level.forest {
                for (p, d) in current.iter_mut().zip(tree.leaf(&features)) {
                    p.0 += d.0;
                    p.1 += d.1;
                }
            }
        }
        current
    }
}

impl LandmarkExtractor for ShapePredictor {
    fn num_parts(&self) -> usize {
        self.model.initial_shape.len()
    }

    fn extract(
        &self,
        image: &ImageView<'_>,
        region: &Rectangle,
    ) -> Result<Shape, Box<dyn std::error::Error>> {
        let points = self
            .regress(image, region)
            .into_iter()
            .map(|(x, y)| {
                let (ix, iy) = to_image(region, x, y);
                LandmarkPoint::new(ix.round() as i32, iy.round() as i32)
            })
            .collect();
        Ok(Shape::new(points))
    }
}

/// Unit box to image coordinates, `(0, 0)` at the left/top edge and `(1, 1)`
/// at the right/bottom edge of `region`.
fn to_image(region: &Rectangle, x: f32, y: f32) -> (f32, f32) {
    let (left, top, right, bottom) = region.edges();
    (
        left as f32 + x * (right - left) as f32,
        top as f32 + y * (bottom - top) as f32,
    )
}

/// Intensity at `(x, y)`, averaged over channels; 0 outside the image.
fn pixel_value(image: &ImageView<'_>, x: i64, y: i64) -> f32 {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return 0.0;
    }
    let channels = image.channels().max(1);
    let total: u32 = (0..channels)
        .map(|c| image.sample(x as u32, y as u32, c) as u32)
        .sum();
    total as f32 / channels as f32
}

fn validate(model: &ShapeModel) -> Result<(), ModelLoadError> {
    let parts = model.initial_shape.len();
    if parts == 0 {
        return Err(ModelLoadError::Invalid("shape model has no parts".into()));
    }
    for (ci, level) in model.cascades.iter().enumerate() {
        let invalid = |msg: String| Err(ModelLoadError::Invalid(format!("cascade {ci}: {msg}")));
        if level.anchor_idx.len() != level.deltas.len() {
            return invalid(format!(
                "{} anchors but {} deltas",
                level.anchor_idx.len(),
                level.deltas.len()
            ));
        }
        if let Some(a) = level.anchor_idx.iter().find(|&&a| a >= parts) {
            return invalid(format!("anchor {a} out of range for {parts} parts"));
        }
        let features = level.anchor_idx.len();
        for (ti, tree) in level.forest.iter().enumerate() {
            if tree.leaf_values.len() != tree.splits.len() + 1 {
                return invalid(format!(
                    "tree {ti} has {} splits but {} leaves",
                    tree.splits.len(),
                    tree.leaf_values.len()
                ));
            }
            if tree
                .splits
                .iter()
                .any(|s| s.idx1 >= features || s.idx2 >= features)
            {
                return invalid(format!("tree {ti} reads a feature pixel out of range"));
            }
            if tree.leaf_values.iter().any(|leaf| leaf.len() != parts) {
                return invalid(format!("tree {ti} leaf size differs from {parts} parts"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn triangle() -> Vec<(f32, f32)> {
        vec![(0.25, 0.25), (0.75, 0.25), (0.5, 0.75)]
    }

    /// Shifts every point 0.1 right when the pixel under the second part is
    /// much brighter than the pixel under the first.
    fn brightness_split_model() -> ShapeModel {
        ShapeModel {
            initial_shape: triangle(),
            cascades: vec![CascadeLevel {
                anchor_idx: vec![0, 0],
                deltas: vec![(0.0, 0.0), (0.5, 0.0)],
                forest: vec![RegressionTree {
                    splits: vec![Split {
                        idx1: 1,
                        idx2: 0,
                        thresh: 50.0,
                    }],
                    leaf_values: vec![vec![(0.1, 0.0); 3], vec![(0.0, 0.0); 3]],
                }],
            }],
        }
    }

    fn points(shape: &Shape) -> Vec<(i32, i32)> {
        shape.points().iter().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn test_mean_shape_mapped_onto_region() {
        let predictor = ShapePredictor::from_model(ShapeModel {
            initial_shape: triangle(),
            cascades: vec![],
        })
        .unwrap();
        let data = vec![0u8; 64 * 64];
        let shape = predictor
            .extract(&ImageView::new(&data, 64, 64, 1), &Rectangle::new(10, 10, 40, 40))
            .unwrap();
        assert_eq!(points(&shape), vec![(20, 20), (40, 20), (30, 40)]);
    }

    #[test]
    fn test_split_takes_left_leaf_on_bright_feature() {
        let predictor = ShapePredictor::from_model(brightness_split_model()).unwrap();
        let mut data = vec![0u8; 64 * 64];
        data[20 * 64 + 40] = 200;
        let shape = predictor
            .extract(&ImageView::new(&data, 64, 64, 1), &Rectangle::new(10, 10, 40, 40))
            .unwrap();
        assert_eq!(points(&shape), vec![(24, 20), (44, 20), (34, 40)]);
    }

    #[test]
    fn test_split_takes_right_leaf_on_dark_feature() {
        let predictor = ShapePredictor::from_model(brightness_split_model()).unwrap();
        let data = vec![0u8; 64 * 64];
        let shape = predictor
            .extract(&ImageView::new(&data, 64, 64, 1), &Rectangle::new(10, 10, 40, 40))
            .unwrap();
        assert_eq!(points(&shape), vec![(20, 20), (40, 20), (30, 40)]);
    }

    #[test]
    fn test_region_outside_image_keeps_cardinality() {
        let predictor = ShapePredictor::from_model(brightness_split_model()).unwrap();
        let data = vec![255u8; 16 * 16];
        let shape = predictor
            .extract(
                &ImageView::new(&data, 16, 16, 1),
                &Rectangle::new(100, 100, 40, 40),
            )
            .unwrap();
        assert_eq!(shape.num_parts(), predictor.num_parts());
    }

    #[test]
    fn test_validate_rejects_leaf_count() {
        let mut model = brightness_split_model();
        model.cascades[0].forest[0].leaf_values.pop();
        assert!(matches!(
            ShapePredictor::from_model(model),
            Err(ModelLoadError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_rejects_anchor_out_of_range() {
        let mut model = brightness_split_model();
        model.cascades[0].anchor_idx[1] = 3;
        assert!(ShapePredictor::from_model(model).is_err());
    }

    #[test]
    fn test_validate_rejects_feature_index_out_of_range() {
        let mut model = brightness_split_model();
        model.cascades[0].forest[0].splits[0].idx1 = 2;
        assert!(ShapePredictor::from_model(model).is_err());
    }

    #[test]
    fn test_load_json_model() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shape.json");
        std::fs::write(
            &path,
            serde_json::to_string(&brightness_split_model()).unwrap(),
        )
        .unwrap();
        let predictor = ShapePredictor::load(&path).unwrap();
        assert_eq!(predictor.num_parts(), 3);
    }
}
