//! Pedestrian region proposer: HOG descriptors scored by a linear SVM over an
//! image pyramid.
use std::path::Path;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::detection::domain::region_proposer::RegionProposer;
use crate::detection::infrastructure::hog_descriptor::{HogDescriptor, HogGeometry};
use crate::detection::infrastructure::model_error::{read_json, ModelLoadError};
use crate::detection::infrastructure::rect_grouping::{group_rectangles, DEFAULT_GROUP_EPS};
use crate::shared::config::HogParams;
use crate::shared::image_view::ImageView;
use crate::shared::rect::Rectangle;

/// Serialized linear SVM over HOG descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeopleModel {
    #[serde(default)]
    pub geometry: HogGeometry,
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl PeopleModel {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let model: PeopleModel = read_json(path)?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ModelLoadError> {
        self.geometry.validate()?;
        let expected = self.geometry.descriptor_len();
        if self.weights.len() != expected {
            return Err(ModelLoadError::Invalid(format!(
                "people model has {} weights, descriptor needs {expected}",
                self.weights.len()
            )));
        }
        if self.weights.iter().any(|w| !w.is_finite()) || !self.bias.is_finite() {
            return Err(ModelLoadError::Invalid("people model has non-finite weights".into()));
        }
        Ok(())
    }
}

pub struct HogPeopleProposer {
    hog: HogDescriptor,
    weights: Vec<f32>,
    bias: f32,
    params: HogParams,
}

impl HogPeopleProposer {
    /// Invalid search parameters are replaced by the defaults.
    pub fn new(model: PeopleModel, params: HogParams) -> Result<Self, ModelLoadError> {
        model.validate()?;
        Ok(Self {
            hog: HogDescriptor::new(model.geometry)?,
            weights: model.weights,
            bias: model.bias,
            params: params.or_default(),
        })
    }

    /// Window hits in source coordinates, clamped to the image, before
    /// grouping. Pyramid levels are visited from full resolution down.
    pub fn raw_hits(
        &self,
        image: &ImageView<'_>,
    ) -> Result<Vec<Rectangle>, Box<dyn std::error::Error>> {
        let g = self.hog.geometry();
        let (src_w, src_h) = (image.width(), image.height());
        let stride_blocks = (self.params.win_stride.0 / g.block_stride).max(1) as usize;
        let stride_blocks_y = (self.params.win_stride.1 / g.block_stride).max(1) as usize;

        let mut hits = Vec::new();
        let mut scale = 1.0f64;
        for _ in 0..self.params.max_levels {
            let level_w = (src_w as f64 / scale).round() as u32;
            let level_h = (src_h as f64 / scale).round() as u32;
            if level_w < g.win_width || level_h < g.win_height {
                break;
            }

            let resized;
            let level = if level_w == src_w && level_h == src_h {
                *image
            } else {
                resized = resize(image, level_w, level_h)?;
                ImageView::new(&resized, level_w, level_h, image.channels())
            };

            let grid = self.hog.block_grid(&level);
            let (nx, ny) = grid.window_positions();
            for by in (0..ny).step_by(stride_blocks_y) {
                for bx in (0..nx).step_by(stride_blocks) {
                    let score = grid.window_dot(bx, by, &self.weights) + self.bias;
                    if score as f64 >= self.params.hit_threshold {
                        let stride = grid.block_stride() as i32;
                        let level_rect = Rectangle::new(
                            bx as i32 * stride,
                            by as i32 * stride,
                            g.win_width as i32,
                            g.win_height as i32,
                        );
                        let rect = level_rect.scale(scale).clamp_to(src_w, src_h);
                        if !rect.is_empty() {
                            hits.push(rect);
                        }
                    }
                }
            }
            scale *= self.params.scale_factor;
        }
        Ok(hits)
    }
}

/// Bilinear resize of a 1- or 3-channel view into an owned buffer.
fn resize(image: &ImageView<'_>, w: u32, h: u32) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    match image.channels() {
        1 => {
            let src = image.to_gray_image().ok_or("inconsistent grayscale buffer")?;
            Ok(imageops::resize(&src, w, h, FilterType::Triangle).into_raw())
        }
        3 => {
            let src = image.to_rgb_image().ok_or("inconsistent RGB buffer")?;
            Ok(imageops::resize(&src, w, h, FilterType::Triangle).into_raw())
        }
        n => Err(format!("HOG pyramid supports 1 or 3 channels, got {n}").into()),
    }
}

impl RegionProposer for HogPeopleProposer {
    fn propose(&self, image: &ImageView<'_>) -> Result<Vec<Rectangle>, Box<dyn std::error::Error>> {
        let hits = self.raw_hits(image)?;
        let grouped = group_rectangles(&hits, self.params.group_threshold, DEFAULT_GROUP_EPS);
        log::debug!(
            "HOG search: {} raw hits, {} grouped",
            hits.len(),
            grouped.len()
        );
        Ok(grouped)
    }
}
