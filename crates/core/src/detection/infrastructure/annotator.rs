use std::path::Path;

use image::{Rgb, RgbImage};

use crate::detection::domain::detection::Detection;
use crate::shared::rect::Rectangle;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const FEATURE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Draws detection boxes, landmark dots and optional extra boxes
/// (e.g. facial feature bounds) onto a copy of `image`.
pub fn annotate(image: &RgbImage, detections: &[Detection], extra: &[Rectangle]) -> RgbImage {
    let mut out = image.clone();
    for detection in detections {
        draw_rect_outline(&mut out, &detection.rect, BOX_COLOR);
        for p in detection.landmarks() {
            draw_dot(&mut out, p.x, p.y, LANDMARK_COLOR);
        }
    }
    for rect in extra {
        draw_rect_outline(&mut out, rect, FEATURE_COLOR);
    }
    out
}

/// Writes an annotated copy of `image` to `path`.
pub fn write_annotated(
    path: &Path,
    image: &RgbImage,
    detections: &[Detection],
    extra: &[Rectangle],
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    annotate(image, detections, extra).save(path)?;
    Ok(())
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// One-pixel outline along the rectangle's inner border.
fn draw_rect_outline(img: &mut RgbImage, rect: &Rectangle, color: Rgb<u8>) {
    if rect.is_empty() {
        return;
    }
    let (left, top, right, bottom) = rect.edges();
    for x in left..right {
        put(img, x, top, color);
        put(img, x, bottom - 1, color);
    }
    for y in top..bottom {
        put(img, left, y, color);
        put(img, right - 1, y, color);
    }
}

/// 3x3 dot centred on `(x, y)`.
fn draw_dot(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            put(img, x + dx, y + dy, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::shape::{LandmarkPoint, Shape};
    use crate::shared::constants::FACE_LABEL;

    #[test]
    fn test_outline_drawn_inside_edges() {
        let img = RgbImage::new(20, 20);
        let detection = Detection::new(Rectangle::new(2, 2, 10, 10), FACE_LABEL, None);
        let out = annotate(&img, &[detection], &[]);
        assert_eq!(*out.get_pixel(2, 2), BOX_COLOR);
        assert_eq!(*out.get_pixel(11, 11), BOX_COLOR);
        assert_eq!(*out.get_pixel(12, 12), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(6, 6), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_landmarks_drawn_as_dots() {
        let img = RgbImage::new(20, 20);
        let shape = Shape::new(vec![LandmarkPoint::new(6, 6)]);
        let detection = Detection::new(Rectangle::new(2, 2, 10, 10), FACE_LABEL, Some(shape));
        let out = annotate(&img, &[detection], &[]);
        assert_eq!(*out.get_pixel(6, 6), LANDMARK_COLOR);
        assert_eq!(*out.get_pixel(7, 5), LANDMARK_COLOR);
    }

    #[test]
    fn test_out_of_bounds_drawing_is_clipped() {
        let img = RgbImage::new(10, 10);
        let detection = Detection::new(Rectangle::new(-5, -5, 30, 30), FACE_LABEL, None);
        let out = annotate(&img, &[detection], &[Rectangle::new(8, 8, 10, 10)]);
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(*out.get_pixel(8, 9), FEATURE_COLOR);
    }

    #[test]
    fn test_write_annotated_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        write_annotated(&path, &RgbImage::new(8, 8), &[], &[]).unwrap();
        assert!(path.exists());
    }
}
