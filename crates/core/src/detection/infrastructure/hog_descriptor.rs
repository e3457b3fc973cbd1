//! Histogram of oriented gradients (Dalal & Triggs).
//!
//! Cell histograms and normalized blocks are computed once per image, so
//! every window descriptor is a gather over the shared block grid.

use std::f32::consts::PI;

use ndarray::{s, Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::detection::infrastructure::model_error::ModelLoadError;
use crate::shared::image_view::ImageView;

/// L2-Hys clipping threshold.
const L2_HYS_CLIP: f32 = 0.2;

/// Window, cell and block geometry. All sizes are in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HogGeometry {
    pub win_width: u32,
    pub win_height: u32,
    pub cell_size: u32,
    pub block_size: u32,
    pub block_stride: u32,
    pub nbins: usize,
    /// Square-root gamma compression of pixel values before differentiation.
    pub gamma_correction: bool,
}

impl Default for HogGeometry {
    fn default() -> Self {
        Self {
            win_width: 64,
            win_height: 128,
            cell_size: 8,
            block_size: 16,
            block_stride: 8,
            nbins: 9,
            gamma_correction: true,
        }
    }
}

impl HogGeometry {
    pub fn validate(&self) -> Result<(), ModelLoadError> {
        let invalid = |msg: &str| Err(ModelLoadError::Invalid(format!("hog geometry: {msg}")));
        if self.cell_size == 0 || self.block_stride == 0 || self.nbins == 0 {
            return invalid("cell size, block stride and bin count must be positive");
        }
        if self.block_size == 0 || self.block_size % self.cell_size != 0 {
            return invalid("block size must be a positive multiple of the cell size");
        }
        if self.block_stride % self.cell_size != 0 {
            return invalid("block stride must be a multiple of the cell size");
        }
        if self.win_width < self.block_size || self.win_height < self.block_size {
            return invalid("window smaller than one block");
        }
        if (self.win_width - self.block_size) % self.block_stride != 0
            || (self.win_height - self.block_size) % self.block_stride != 0
        {
            return invalid("blocks do not tile the window");
        }
        Ok(())
    }

    fn cells_per_block(&self) -> usize {
        (self.block_size / self.cell_size) as usize
    }

    fn block_len(&self) -> usize {
        self.cells_per_block().pow(2) * self.nbins
    }

    /// Blocks per window `(x, y)`.
    fn window_blocks(&self) -> (usize, usize) {
        (
            ((self.win_width - self.block_size) / self.block_stride + 1) as usize,
            ((self.win_height - self.block_size) / self.block_stride + 1) as usize,
        )
    }

    pub fn descriptor_len(&self) -> usize {
        let (bx, by) = self.window_blocks();
        bx * by * self.block_len()
    }
}

pub struct HogDescriptor {
    geometry: HogGeometry,
}

impl HogDescriptor {
    pub fn new(geometry: HogGeometry) -> Result<Self, ModelLoadError> {
        geometry.validate()?;
        Ok(Self { geometry })
    }

    pub fn geometry(&self) -> &HogGeometry {
        &self.geometry
    }

    /// Normalized blocks for every block position on the image.
    pub fn block_grid(&self, image: &ImageView<'_>) -> BlockGrid {
        let g = &self.geometry;
        let cells = cell_histograms(image, g);
        let cpb = g.cells_per_block();
        let stride_cells = (g.block_stride / g.cell_size) as usize;
        let (cells_y, cells_x, _) = cells.dim();

        let count = |n: usize| {
            if n < cpb {
                0
            } else {
                (n - cpb) / stride_cells + 1
            }
        };
        let (blocks_y, blocks_x) = (count(cells_y), count(cells_x));

        let mut blocks = Array3::<f32>::zeros((blocks_y, blocks_x, g.block_len()));
        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                let (cy, cx) = (by * stride_cells, bx * stride_cells);
                let mut block = blocks.slice_mut(s![by, bx, ..]);
                let mut k = 0;
                for row in cy..cy + cpb {
                    for col in cx..cx + cpb {
                        for bin in 0..g.nbins {
                            block[k] = cells[[row, col, bin]];
                            k += 1;
                        }
                    }
                }
                if let Some(slice) = block.as_slice_mut() {
                    normalize_l2_hys(slice);
                }
            }
        }

        let window_blocks = g.window_blocks();
        BlockGrid {
            blocks,
            block_stride: g.block_stride,
            window_blocks,
        }
    }
}

/// Normalized block descriptors of one image, indexed by block position.
pub struct BlockGrid {
    blocks: Array3<f32>,
    block_stride: u32,
    window_blocks: (usize, usize),
}

impl BlockGrid {
    pub fn block_stride(&self) -> u32 {
        self.block_stride
    }

    /// Window positions `(x, y)` in block units.
    pub fn window_positions(&self) -> (usize, usize) {
        let (blocks_y, blocks_x, _) = self.blocks.dim();
        let (wx, wy) = self.window_blocks;
        (
            (blocks_x + 1).saturating_sub(wx),
            (blocks_y + 1).saturating_sub(wy),
        )
    }

    /// Visits the window's blocks row-major starting at block `(bx, by)`.
    fn for_each_window_block(&self, bx: usize, by: usize, mut f: impl FnMut(&[f32])) {
        let (wx, wy) = self.window_blocks;
        for row in by..by + wy {
            for col in bx..bx + wx {
                let block = self.blocks.slice(s![row, col, ..]);
                if let Some(slice) = block.to_slice() {
                    f(slice);
                }
            }
        }
    }

    /// `weights · descriptor` for the window at block `(bx, by)`.
    pub fn window_dot(&self, bx: usize, by: usize, weights: &[f32]) -> f32 {
        let mut offset = 0;
        let mut acc = 0.0f32;
        self.for_each_window_block(bx, by, |block| {
            let w = &weights[offset..offset + block.len()];
            acc += block.iter().zip(w).map(|(a, b)| a * b).sum::<f32>();
            offset += block.len();
        });
        acc
    }
}

/// Per-cell orientation histograms, shape `(cells_y, cells_x, nbins)`.
fn cell_histograms(image: &ImageView<'_>, g: &HogGeometry) -> Array3<f32> {
    let cell = g.cell_size as usize;
    let (w, h) = (image.width() as usize, image.height() as usize);
    let (cells_x, cells_y) = (w / cell, h / cell);
    let mut hist = Array3::<f32>::zeros((cells_y, cells_x, g.nbins));
    if cells_x == 0 || cells_y == 0 {
        return hist;
    }

    let (mag, angle) = gradients(image, g.gamma_correction, cells_x * cell, cells_y * cell);
    let bin_width = PI / g.nbins as f32;
    for y in 0..cells_y * cell {
        for x in 0..cells_x * cell {
            let m = mag[[y, x]];
            if m == 0.0 {
                continue;
            }
            let pos = angle[[y, x]] / bin_width - 0.5;
            let b0 = pos.floor();
            let frac = pos - b0;
            let lo = (b0 as i64).rem_euclid(g.nbins as i64) as usize;
            let hi = (lo + 1) % g.nbins;
            hist[[y / cell, x / cell, lo]] += m * (1.0 - frac);
            hist[[y / cell, x / cell, hi]] += m * frac;
        }
    }
    hist
}

/// Centered-difference gradient magnitude and unsigned orientation in
/// `[0, pi)` over the top-left `w x h` region. Multi-channel images use the
/// channel with the largest magnitude at each pixel. Borders replicate.
fn gradients(image: &ImageView<'_>, gamma: bool, w: usize, h: usize) -> (Array2<f32>, Array2<f32>) {
    let (iw, ih) = (image.width() as usize, image.height() as usize);
    let value = |x: usize, y: usize, c: u8| {
        let v = image.sample(x as u32, y as u32, c) as f32;
        if gamma {
            v.sqrt()
        } else {
            v
        }
    };

    let mut mag = Array2::<f32>::zeros((h, w));
    let mut angle = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        let (up, down) = (y.saturating_sub(1), (y + 1).min(ih - 1));
        for x in 0..w {
            let (left, right) = (x.saturating_sub(1), (x + 1).min(iw - 1));
            let mut best = (0.0f32, 0.0f32, 0.0f32);
            for c in 0..image.channels() {
                let dx = value(right, y, c) - value(left, y, c);
                let dy = value(x, down, c) - value(x, up, c);
                let m2 = dx * dx + dy * dy;
                if m2 > best.0 {
                    best = (m2, dx, dy);
                }
            }
            let (m2, dx, dy) = best;
            if m2 == 0.0 {
                continue;
            }
            let mut a = dy.atan2(dx);
            if a < 0.0 {
                a += PI;
            }
            if a >= PI {
                a -= PI;
            }
            mag[[y, x]] = m2.sqrt();
            angle[[y, x]] = a;
        }
    }
    (mag, angle)
}

/// L2 normalize, clip, renormalize.
fn normalize_l2_hys(v: &mut [f32]) {
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let scale = 1.0 / (norm(v) + v.len() as f32 * 0.1);
    for x in v.iter_mut() {
        *x = (*x * scale).min(L2_HYS_CLIP);
    }
    let scale = 1.0 / (norm(v) + 1e-3);
    for x in v.iter_mut() {
        *x *= scale;
    }
}
