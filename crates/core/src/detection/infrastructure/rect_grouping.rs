use crate::detection::infrastructure::math::partition;
use crate::shared::rect::Rectangle;

/// Relative edge tolerance for two raw hits to count as the same object.
pub const DEFAULT_GROUP_EPS: f64 = 0.2;

/// Clusters overlapping raw window hits into averaged detections.
///
/// Hits whose four edges all lie within `eps * mean(min side)` of each other
/// fall in one cluster. A cluster survives when it has more than
/// `group_threshold` members and is not nested inside a stronger cluster.
/// `group_threshold == 0` returns the raw hits unchanged.
///
/// Output follows the order in which clusters first appear in `rects`.
pub fn group_rectangles(rects: &[Rectangle], group_threshold: u32, eps: f64) -> Vec<Rectangle> {
    if group_threshold == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let (labels, classes) = partition(rects, |a, b| similar(a, b, eps));

    let mut sums = vec![[0i64; 4]; classes];
    let mut counts = vec![0u32; classes];
    for (r, &label) in rects.iter().zip(labels.iter()) {
        let s = &mut sums[label];
        s[0] += r.x as i64;
        s[1] += r.y as i64;
        s[2] += r.width as i64;
        s[3] += r.height as i64;
        counts[label] += 1;
    }

    let averaged: Vec<Rectangle> = sums
        .iter()
        .zip(counts.iter())
        .map(|(s, &n)| {
            let inv = 1.0 / n as f64;
            Rectangle::new(
                (s[0] as f64 * inv).round() as i32,
                (s[1] as f64 * inv).round() as i32,
                (s[2] as f64 * inv).round() as i32,
                (s[3] as f64 * inv).round() as i32,
            )
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= group_threshold {
            continue;
        }
        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            j != i && n2 > group_threshold && nested_in(r1, r2, eps) && (n2 > n1.max(3) || n1 < 3)
        });
        if !nested {
            grouped.push(*r1);
        }
    }
    grouped
}

fn similar(a: &Rectangle, b: &Rectangle, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    (a.x - b.x).abs() as f64 <= delta
        && (a.y - b.y).abs() as f64 <= delta
        && (a.right() - b.right()).abs() as f64 <= delta
        && (a.bottom() - b.bottom()).abs() as f64 <= delta
}

/// `inner` fits in `outer` grown by `eps` of its size on every side.
fn nested_in(inner: &Rectangle, outer: &Rectangle, eps: f64) -> bool {
    let dx = (outer.width as f64 * eps).round() as i32;
    let dy = (outer.height as f64 * eps).round() as i32;
    inner.x >= outer.x - dx
        && inner.y >= outer.y - dy
        && inner.right() <= outer.right() + dx
        && inner.bottom() <= outer.bottom() + dy
}
