use ndarray::Array2;

use crate::shared::image_view::ImageView;

/// Summed-area tables of a single-channel image (values and squared values).
///
/// Both tables are `(height + 1) x (width + 1)` with a zero first row and
/// column, so any rectangle sum is four lookups.
pub struct IntegralImage {
    sum: Array2<f64>,
    sq_sum: Array2<f64>,
}

impl IntegralImage {
    /// Builds the tables from channel 0 of `image`.
    pub fn new(image: &ImageView<'_>) -> Self {
        let w = image.width() as usize;
        let h = image.height() as usize;
        let mut sum = Array2::<f64>::zeros((h + 1, w + 1));
        let mut sq_sum = Array2::<f64>::zeros((h + 1, w + 1));

        for y in 0..h {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = image.sample(x as u32, y as u32, 0) as f64;
                row += v;
                row_sq += v * v;
                sum[[y + 1, x + 1]] = sum[[y, x + 1]] + row;
                sq_sum[[y + 1, x + 1]] = sq_sum[[y, x + 1]] + row_sq;
            }
        }

        Self { sum, sq_sum }
    }

    /// Sum of pixels in `[x, x + w) x [y, y + h)`. Caller guarantees bounds.
    #[inline]
    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        table_sum(&self.sum, x, y, w, h)
    }

    #[inline]
    pub fn rect_sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        table_sum(&self.sq_sum, x, y, w, h)
    }
}

#[inline]
fn table_sum(t: &Array2<f64>, x: u32, y: u32, w: u32, h: u32) -> f64 {
    let (x0, y0) = (x as usize, y as usize);
    let (x1, y1) = ((x + w) as usize, (y + h) as usize);
    t[[y1, x1]] - t[[y0, x1]] - t[[y1, x0]] + t[[y0, x0]]
}
