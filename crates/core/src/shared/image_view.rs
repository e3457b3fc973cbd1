use image::{GrayImage, RgbImage};

/// A borrowed image: interleaved `u8` samples in row-major order.
///
/// The detector never keeps a view past the call it was handed to, so raw
/// caller buffers can be passed without copying.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    channels: u8,
}

impl<'a> ImageView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, channels: u8) -> Self {
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn gray(image: &'a GrayImage) -> Self {
        Self::new(image.as_raw(), image.width(), image.height(), 1)
    }

    pub fn rgb(image: &'a RgbImage) -> Self {
        Self::new(image.as_raw(), image.width(), image.height(), 3)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.channels == 0 || self.data.is_empty()
    }

    /// True when the buffer length matches `width * height * channels`.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    /// Sample at column `x`, row `y`, channel `c`. Caller guarantees bounds.
    #[inline]
    pub fn sample(&self, x: u32, y: u32, c: u8) -> u8 {
        let idx = ((y as usize * self.width as usize) + x as usize) * self.channels as usize
            + c as usize;
        self.data[idx]
    }

    /// Copies a single-channel view into an owned `GrayImage`.
    pub fn to_gray_image(&self) -> Option<GrayImage> {
        if self.channels != 1 || !self.is_consistent() {
            return None;
        }
        GrayImage::from_raw(self.width, self.height, self.data.to_vec())
    }

    /// Copies a three-channel view into an owned `RgbImage`.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.channels != 3 || !self.is_consistent() {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data.to_vec())
    }

    fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }
}
