use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::shared::image_view::ImageView;

/// Channel layout a detector pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgb,
}

impl PixelLayout {
    pub fn channels(self) -> u8 {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Rgb => 3,
        }
    }
}

/// A decoded image file, owned, in one of the supported layouts.
pub enum LoadedImage {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl LoadedImage {
    pub fn view(&self) -> ImageView<'_> {
        match self {
            LoadedImage::Gray(img) => ImageView::gray(img),
            LoadedImage::Rgb(img) => ImageView::rgb(img),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            LoadedImage::Gray(img) => img.dimensions(),
            LoadedImage::Rgb(img) => img.dimensions(),
        }
    }
}

/// Decodes an image file with the `image` crate and converts it to `layout`.
pub fn load_image(path: &Path, layout: PixelLayout) -> Result<LoadedImage, Box<dyn std::error::Error>> {
    let decoded = image::open(path)?;
    Ok(match layout {
        PixelLayout::Gray => LoadedImage::Gray(decoded.to_luma8()),
        PixelLayout::Rgb => LoadedImage::Rgb(decoded.to_rgb8()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join("test.png");
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_load_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 30, 20);
        let loaded = load_image(&path, PixelLayout::Rgb).unwrap();
        let view = loaded.view();
        assert_eq!((view.width(), view.height(), view.channels()), (30, 20, 3));
        assert_eq!(view.sample(0, 0, 2), 200);
    }

    #[test]
    fn test_load_as_gray() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 30, 20);
        let loaded = load_image(&path, PixelLayout::Gray).unwrap();
        assert_eq!(loaded.dimensions(), (30, 20));
        assert_eq!(loaded.view().channels(), PixelLayout::Gray.channels());
        assert!(loaded.view().is_consistent());
    }

    #[test]
    fn test_load_nonexistent_fails() {
        assert!(load_image(Path::new("/nonexistent/test.png"), PixelLayout::Gray).is_err());
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(load_image(&path, PixelLayout::Rgb).is_err());
    }
}
