//! Boosted cascade of decision stumps over Haar or LBP features.
//!
//! Models are stored as JSON. Feature geometry is expressed in the model's
//! base window; [`CascadeClassifier::scaled`] precomputes integer geometry
//! for one search scale so windows can be evaluated on a single integral
//! image without resampling.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::detection::infrastructure::model_error::{read_json, ModelLoadError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeModel {
    pub window_width: u32,
    pub window_height: u32,
    pub stages: Vec<Stage>,
}

/// Passes when the sum of its stump outputs reaches `threshold`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub threshold: f64,
    pub stumps: Vec<Stump>,
}

/// Haar: `response < threshold` yields `left`, otherwise `right`.
/// LBP: code bit set in the subset yields `left`, otherwise `right`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    pub feature: Feature,
    #[serde(default)]
    pub threshold: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Feature {
    /// Weighted rectangle sums, normalized by the window's standard deviation.
    Haar { rects: Vec<WeightedRect> },
    /// 3x3 grid of `block_width x block_height` blocks anchored at `(x, y)`;
    /// `subset` is a 256-bit mask over the 8-bit local binary pattern.
    Lbp {
        x: u32,
        y: u32,
        block_width: u32,
        block_height: u32,
        subset: [i32; 8],
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

pub struct CascadeClassifier {
    model: CascadeModel,
}

impl CascadeClassifier {
    pub fn from_model(model: CascadeModel) -> Result<Self, ModelLoadError> {
        validate(&model)?;
        Ok(Self { model })
    }

    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let model: CascadeModel = read_json(path)?;
        Self::from_model(model)
    }

    /// Base detection window `(width, height)`.
    pub fn window_size(&self) -> (u32, u32) {
        (self.model.window_width, self.model.window_height)
    }

    pub fn num_stages(&self) -> usize {
        self.model.stages.len()
    }

    /// Feature geometry rounded for search scale `scale`.
    pub fn scaled(&self, scale: f64) -> ScaledCascade {
        let win_w = ((self.model.window_width as f64 * scale).round() as u32).max(1);
        let win_h = ((self.model.window_height as f64 * scale).round() as u32).max(1);
        let stages = self
            .model
            .stages
            .iter()
            .map(|stage| ScaledStage {
                threshold: stage.threshold,
                stumps: stage
                    .stumps
                    .iter()
                    .map(|s| ScaledStump {
                        feature: scale_feature(&s.feature, scale, win_w, win_h),
                        threshold: s.threshold,
                        left: s.left,
                        right: s.right,
                    })
                    .collect(),
            })
            .collect();
        let needs_norm = self.model.stages.iter().any(|s| {
            s.stumps
                .iter()
                .any(|st| matches!(st.feature, Feature::Haar { .. }))
        });
        ScaledCascade {
            win_w,
            win_h,
            stages,
            needs_norm,
        }
    }
}

/// A cascade with integer feature geometry for one window size.
pub struct ScaledCascade {
    win_w: u32,
    win_h: u32,
    stages: Vec<ScaledStage>,
    needs_norm: bool,
}

struct ScaledStage {
    threshold: f64,
    stumps: Vec<ScaledStump>,
}

struct ScaledStump {
    feature: ScaledFeature,
    threshold: f64,
    left: f64,
    right: f64,
}

enum ScaledFeature {
    Haar(Vec<ScaledRect>),
    Lbp {
        x: u32,
        y: u32,
        bw: u32,
        bh: u32,
        subset: [i32; 8],
    },
}

struct ScaledRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    weight: f64,
}

impl ScaledCascade {
    pub fn window_size(&self) -> (u32, u32) {
        (self.win_w, self.win_h)
    }

    /// Runs the window at `(x, y)` through every stage, stopping at the
    /// first rejection. Caller guarantees the window fits the image.
    pub fn evaluate(&self, ii: &IntegralImage, x: u32, y: u32) -> bool {
        let norm = if self.needs_norm {
            window_norm(ii, x, y, self.win_w, self.win_h)
        } else {
            1.0
        };

        for stage in &self.stages {
            let mut sum = 0.0;
            for stump in &stage.stumps {
                sum += match &stump.feature {
                    ScaledFeature::Haar(rects) => {
                        let response: f64 = rects
                            .iter()
                            .map(|r| r.weight * ii.rect_sum(x + r.x, y + r.y, r.w, r.h))
                            .sum::<f64>()
                            / norm;
                        if response < stump.threshold {
                            stump.left
                        } else {
                            stump.right
                        }
                    }
                    ScaledFeature::Lbp {
                        x: fx,
                        y: fy,
                        bw,
                        bh,
                        subset,
                    } => {
                        let code = lbp_code(ii, x + fx, y + fy, *bw, *bh);
                        let word = subset[(code >> 5) as usize] as u32;
                        if word & (1u32 << (code & 31)) != 0 {
                            stump.left
                        } else {
                            stump.right
                        }
                    }
                };
            }
            if sum < stage.threshold {
                return false;
            }
        }
        true
    }
}

/// `area * stddev` of the window; 1 for flat windows.
fn window_norm(ii: &IntegralImage, x: u32, y: u32, w: u32, h: u32) -> f64 {
    let area = (w as f64) * (h as f64);
    let sum = ii.rect_sum(x, y, w, h);
    let sq = ii.rect_sq_sum(x, y, w, h);
    let nf = area * sq - sum * sum;
    if nf > 0.0 {
        nf.sqrt()
    } else {
        1.0
    }
}

/// 8-bit local binary pattern of block sums around the center block.
///
/// Bits, high to low: top-left, top, top-right, right, bottom-right,
/// bottom, bottom-left, left. A bit is set when the neighbour block sum is
/// at least the center block sum.
fn lbp_code(ii: &IntegralImage, x: u32, y: u32, bw: u32, bh: u32) -> u32 {
    let block = |col: u32, row: u32| ii.rect_sum(x + col * bw, y + row * bh, bw, bh);
    let center = block(1, 1);
    const NEIGHBOURS: [(u32, u32, u32); 8] = [
        (0, 0, 128),
        (1, 0, 64),
        (2, 0, 32),
        (2, 1, 16),
        (2, 2, 8),
        (1, 2, 4),
        (0, 2, 2),
        (0, 1, 1),
    ];
    NEIGHBOURS
        .iter()
        .filter(|(c, r, _)| block(*c, *r) >= center)
        .map(|(_, _, bit)| bit)
        .sum()
}

fn scale_feature(feature: &Feature, scale: f64, win_w: u32, win_h: u32) -> ScaledFeature {
    let sc = |v: u32| (v as f64 * scale).round() as u32;
    match feature {
        Feature::Haar { rects } => {
            let mut scaled: Vec<ScaledRect> = rects
                .iter()
                .map(|r| {
                    let x = sc(r.x).min(win_w - 1);
                    let y = sc(r.y).min(win_h - 1);
                    ScaledRect {
                        x,
                        y,
                        w: sc(r.width).clamp(1, win_w - x),
                        h: sc(r.height).clamp(1, win_h - y),
                        weight: r.weight,
                    }
                })
                .collect();
            rebalance(rects, &mut scaled);
            ScaledFeature::Haar(scaled)
        }
        Feature::Lbp {
            x,
            y,
            block_width,
            block_height,
            subset,
        } => {
            let fx = sc(*x).min(win_w - 1);
            let fy = sc(*y).min(win_h - 1);
            let bw = sc(*block_width).clamp(1, ((win_w - fx) / 3).max(1));
            let bh = sc(*block_height).clamp(1, ((win_h - fy) / 3).max(1));
            ScaledFeature::Lbp {
                x: fx,
                y: fy,
                bw,
                bh,
                subset: *subset,
            }
        }
    }
}

/// Keeps zero-sum Haar features zero-sum after rounding by recomputing the
/// first rectangle's weight from the scaled areas of the others.
fn rebalance(original: &[WeightedRect], scaled: &mut [ScaledRect]) {
    if scaled.len() < 2 {
        return;
    }
    let area = |w: u32, h: u32| w as f64 * h as f64;
    let balance: f64 = original.iter().map(|r| r.weight * area(r.width, r.height)).sum();
    let magnitude: f64 = original
        .iter()
        .map(|r| r.weight.abs() * area(r.width, r.height))
        .sum();
    if balance.abs() > 1e-6 * magnitude {
        return;
    }
    let rest: f64 = scaled[1..].iter().map(|r| r.weight * area(r.w, r.h)).sum();
    scaled[0].weight = -rest / area(scaled[0].w, scaled[0].h);
}

fn validate(model: &CascadeModel) -> Result<(), ModelLoadError> {
    let (ww, wh) = (model.window_width, model.window_height);
    if ww == 0 || wh == 0 {
        return Err(ModelLoadError::Invalid("cascade window must be non-empty".into()));
    }
    if model.stages.is_empty() {
        return Err(ModelLoadError::Invalid("cascade has no stages".into()));
    }
    for (si, stage) in model.stages.iter().enumerate() {
        if stage.stumps.is_empty() {
            return Err(ModelLoadError::Invalid(format!("stage {si} has no stumps")));
        }
        for stump in &stage.stumps {
            match &stump.feature {
                Feature::Haar { rects } => {
                    if rects.is_empty() {
                        return Err(ModelLoadError::Invalid(format!(
                            "stage {si}: haar feature without rectangles"
                        )));
                    }
                    for r in rects {
                        if r.width == 0 || r.height == 0 || r.x + r.width > ww || r.y + r.height > wh
                        {
                            return Err(ModelLoadError::Invalid(format!(
                                "stage {si}: haar rectangle outside the {ww}x{wh} window"
                            )));
                        }
                    }
                }
                Feature::Lbp {
                    x,
                    y,
                    block_width,
                    block_height,
                    ..
                } => {
                    if *block_width == 0
                        || *block_height == 0
                        || x + 3 * block_width > ww
                        || y + 3 * block_height > wh
                    {
                        return Err(ModelLoadError::Invalid(format!(
                            "stage {si}: lbp feature outside the {ww}x{wh} window"
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}
