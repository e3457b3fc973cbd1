//! Per-feature colour adjustment on detected faces.
//!
//! A feature's landmarks span a convex hull; the hull is rasterized inside
//! the feature's padded box and feathered with a Gaussian so edits fade out
//! at the border instead of leaving a hard seam.

use std::path::Path;

use image::imageops;
use image::{ImageBuffer, Luma, Rgb, RgbImage};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_features::{feature_bounds, feature_kernel_size, FacialFeature};
use crate::detection::domain::shape::LandmarkPoint;
use crate::shared::rect::Rectangle;

type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Kernel size of the pass that smooths a saturation change.
const SMOOTHING_KERNEL: u32 = 3;

/// Soft mask over one facial feature, in image coordinates.
pub struct FeatureMask {
    bounds: Rectangle,
    weights: Plane,
}

impl FeatureMask {
    /// Mask of the hull of `points`, `None` when the feature box is empty.
    pub fn new(points: &[LandmarkPoint], image_w: u32, image_h: u32) -> Option<Self> {
        let bounds = feature_bounds(points, image_w, image_h)?;
        let kernel = feature_kernel_size(points)?;

        let local: Vec<(f32, f32)> = points
            .iter()
            .map(|p| ((p.x - bounds.x) as f32, (p.y - bounds.y) as f32))
            .collect();
        let hull = convex_hull(&local);

        let (w, h) = (bounds.width as u32, bounds.height as u32);
        let hard = Plane::from_fn(w, h, |x, y| {
            Luma([if covers(&hull, (x as f32, y as f32)) { 1.0 } else { 0.0 }])
        });

        // Feather, grow to everything the blur touched, feather again.
        let feathered = gaussian(&hard, kernel);
        let grown = Plane::from_fn(w, h, |x, y| {
            Luma([if feathered.get_pixel(x, y).0[0] > 0.0 { 1.0 } else { 0.0 }])
        });
        Some(Self {
            bounds,
            weights: gaussian(&grown, kernel),
        })
    }

    pub fn bounds(&self) -> Rectangle {
        self.bounds
    }

    /// Mask weight in `[0, 1]` at image pixel `(x, y)`; 0 outside the box.
    pub fn weight(&self, x: i32, y: i32) -> f32 {
        let (lx, ly) = (x - self.bounds.x, y - self.bounds.y);
        if lx < 0 || ly < 0 || lx >= self.bounds.width || ly >= self.bounds.height {
            return 0.0;
        }
        self.weights.get_pixel(lx as u32, ly as u32).0[0]
    }
}

/// Raises saturation inside the mask by `rate` times its own value
/// (negative rates wash the colour out). Hue and value are kept.
pub fn brighten(image: &mut RgbImage, mask: &FeatureMask, rate: f32) {
    let b = mask.bounds();
    if rate == 0.0 || b.is_empty() || !b.is_within(image.width(), image.height()) {
        return;
    }
    let (w, h) = (b.width as u32, b.height as u32);

    // Saturation times weight, kept in [0, 1] through the blur.
    let scaled = Plane::from_fn(w, h, |x, y| {
        let (ix, iy) = (b.x as u32 + x, b.y as u32 + y);
        let (_, s, _) = rgb_to_hsv(*image.get_pixel(ix, iy));
        Luma([s * mask.weight(ix as i32, iy as i32)])
    });
    let delta = gaussian(&scaled, SMOOTHING_KERNEL);

    for y in 0..h {
        for x in 0..w {
            let d = delta.get_pixel(x, y).0[0] * rate;
            if d == 0.0 {
                continue;
            }
            let (ix, iy) = (b.x as u32 + x, b.y as u32 + y);
            let (hue, s, v) = rgb_to_hsv(*image.get_pixel(ix, iy));
            image.put_pixel(ix, iy, hsv_to_rgb(hue, (s + d).clamp(0.0, 1.0), v));
        }
    }
}

/// Applies every `(feature, rate)` adjustment to each detection that has a
/// 68-point shape. Returns the number of features changed.
pub fn retouch(
    image: &mut RgbImage,
    detections: &[Detection],
    adjustments: &[(FacialFeature, f32)],
) -> usize {
    let (w, h) = image.dimensions();
    let mut changed = 0;
    for shape in detections.iter().filter_map(|d| d.shape.as_ref()) {
        for &(feature, rate) in adjustments {
            let Some(points) = shape.feature_points(feature) else {
                continue;
            };
            if let Some(mask) = FeatureMask::new(points, w, h) {
                brighten(image, &mask, rate);
                changed += 1;
            }
        }
    }
    log::debug!("Retouched {changed} feature(s)");
    changed
}

/// Writes a retouched copy of `image` to `path`, creating its directory.
pub fn write_retouched(
    path: &Path,
    image: &RgbImage,
    detections: &[Detection],
    adjustments: &[(FacialFeature, f32)],
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut out = image.clone();
    let changed = retouch(&mut out, detections, adjustments);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    out.save(path)?;
    Ok(changed)
}

/// Gaussian blur with the sigma OpenCV derives from an odd kernel size.
/// A size-1 kernel is the identity.
fn gaussian(plane: &Plane, kernel: u32) -> Plane {
    if kernel <= 1 {
        return plane.clone();
    }
    let sigma = 0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    imageops::blur(plane, sigma)
}

fn cross(o: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Monotone chain hull, positively oriented. Collinear input collapses to
/// its two end points.
fn convex_hull(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<(f32, f32)> = Vec::with_capacity(pts.len() * 2);
    for pass in [pts.clone(), pts.iter().rev().copied().collect()] {
        let start = hull.len();
        for p in pass {
            while hull.len() >= start + 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
    }
    hull
}

/// True when `p` is inside the hull or within half a pixel of its outline.
fn covers(hull: &[(f32, f32)], p: (f32, f32)) -> bool {
    match hull.len() {
        0 => false,
        1 => distance_to_segment(p, hull[0], hull[0]) <= 0.5,
        n => {
            let edges = (0..n).map(|i| (hull[i], hull[(i + 1) % n]));
            if n >= 3 && edges.clone().all(|(a, b)| cross(a, b, p) >= 0.0) {
                return true;
            }
            edges.into_iter().any(|(a, b)| distance_to_segment(p, a, b) <= 0.5)
        }
    }
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Hue in degrees, saturation and value in `[0, 1]`.
fn rgb_to_hsv(px: Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = px.0.map(|c| c as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;
    let hue = if chroma == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / chroma).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / chroma + 2.0)
    } else {
        60.0 * ((r - g) / chroma + 4.0)
    };
    let sat = if max == 0.0 { 0.0 } else { chroma / max };
    (hue, sat, max)
}

fn hsv_to_rgb(hue: f32, sat: f32, val: f32) -> Rgb<u8> {
    let chroma = val * sat;
    let h = hue / 60.0;
    let x = chroma * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = val - chroma;
    let to_u8 = |c: f32| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::shape::Shape;
    use crate::shared::constants::FACE_LABEL;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn triangle() -> Vec<LandmarkPoint> {
        vec![
            LandmarkPoint::new(40, 40),
            LandmarkPoint::new(120, 40),
            LandmarkPoint::new(80, 120),
        ]
    }

    #[test]
    fn test_hull_drops_interior_points() {
        let points = [(0.0, 0.0), (10.0, 0.0), (5.0, 5.0), (10.0, 10.0), (0.0, 10.0)];
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&(5.0, 5.0)));
    }

    #[test]
    fn test_collinear_hull_covers_the_segment() {
        let hull = convex_hull(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);
        assert_eq!(hull, vec![(0.0, 0.0), (10.0, 0.0)]);
        assert!(covers(&hull, (7.0, 0.0)));
        assert!(!covers(&hull, (7.0, 2.0)));
    }

    #[test]
    fn test_mask_is_solid_inside_and_empty_far_outside() {
        let mask = FeatureMask::new(&triangle(), 200, 200).unwrap();
        // 96 x 80 widened box, pad 4
        assert_eq!(mask.bounds().edges(), (28, 36, 132, 124));
        assert_relative_eq!(mask.weight(80, 66), 1.0, epsilon = 1e-3);
        assert_eq!(mask.weight(29, 123), 0.0);
        assert_eq!(mask.weight(10, 10), 0.0);
    }

    #[test]
    fn test_mask_fades_outside_the_outline() {
        let mask = FeatureMask::new(&triangle(), 200, 200).unwrap();
        // (60, 80) lies on the left edge; walk left, away from the hull
        let row: Vec<f32> = (40..=60).rev().map(|x| mask.weight(x, 80)).collect();
        assert_relative_eq!(row[0], 1.0, epsilon = 1e-3);
        assert_eq!(row[row.len() - 1], 0.0);
        assert!(row.windows(2).all(|w| w[1] <= w[0] + 1e-6));
        assert!(row.iter().any(|&v| v > 0.05 && v < 0.95));
    }

    #[rstest]
    #[case(Rgb([200, 100, 100]))]
    #[case(Rgb([10, 200, 90]))]
    #[case(Rgb([30, 60, 250]))]
    #[case(Rgb([128, 128, 128]))]
    fn test_hsv_round_trip(#[case] px: Rgb<u8>) {
        let (h, s, v) = rgb_to_hsv(px);
        assert_eq!(hsv_to_rgb(h, s, v), px);
    }

    #[test]
    fn test_brighten_saturates_inside_only() {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([200, 100, 100]));
        let mask = FeatureMask::new(&triangle(), 200, 200).unwrap();
        brighten(&mut img, &mask, 1.0);

        // saturation 0.5 doubled to 1.0 at full weight
        let inside = img.get_pixel(80, 66);
        assert_eq!(inside.0[0], 200);
        assert!(inside.0[1] < 5 && inside.0[2] < 5);
        assert_eq!(*img.get_pixel(10, 10), Rgb([200, 100, 100]));
        assert_eq!(*img.get_pixel(29, 123), Rgb([200, 100, 100]));
    }

    #[test]
    fn test_brighten_leaves_gray_and_zero_rate_untouched() {
        let mask = FeatureMask::new(&triangle(), 200, 200).unwrap();

        let gray = RgbImage::from_pixel(200, 200, Rgb([90, 90, 90]));
        let mut out = gray.clone();
        brighten(&mut out, &mask, 1.8);
        assert_eq!(out, gray);

        let color = RgbImage::from_pixel(200, 200, Rgb([200, 100, 100]));
        let mut out = color.clone();
        brighten(&mut out, &mask, 0.0);
        assert_eq!(out, color);
    }

    #[test]
    fn test_retouch_only_touches_full_shapes() {
        let mut points: Vec<LandmarkPoint> =
            (0..68).map(|i| LandmarkPoint::new(50 + i % 10, 50 + i)).collect();
        let corners = triangle();
        for i in FacialFeature::Mouth.range() {
            points[i] = corners[i % 3];
        }
        let full = Detection::new(
            Rectangle::new(0, 0, 200, 200),
            FACE_LABEL,
            Some(Shape::new(points)),
        );
        let partial = Detection::new(
            Rectangle::new(0, 0, 50, 50),
            FACE_LABEL,
            Some(Shape::new(vec![LandmarkPoint::new(5, 5); 5])),
        );
        let bare = Detection::new(Rectangle::new(0, 0, 50, 50), FACE_LABEL, None);

        let mut img = RgbImage::from_pixel(200, 200, Rgb([200, 100, 100]));
        let changed = retouch(
            &mut img,
            &[full, partial, bare],
            &[(FacialFeature::Mouth, 1.0)],
        );
        assert_eq!(changed, 1);
        assert_ne!(*img.get_pixel(80, 66), Rgb([200, 100, 100]));
    }

    #[test]
    fn test_write_retouched_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        let changed = write_retouched(
            &path,
            &RgbImage::new(8, 8),
            &[],
            &[(FacialFeature::Mouth, 0.5)],
        )
        .unwrap();
        assert_eq!(changed, 0);
        assert!(path.exists());
    }
}
