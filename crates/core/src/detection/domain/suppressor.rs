use crate::shared::rect::Rectangle;

/// Horizontal inset applied to each side, as a fraction of width.
const SHRINK_X: f64 = 0.1;
const SHRINK_WIDTH: f64 = 0.8;
/// Top inset as a fraction of height.
const SHRINK_Y: f64 = 0.06;
const SHRINK_HEIGHT: f64 = 0.9;

/// Post-processing for pedestrian candidates.
///
/// The HOG people detector reports nested boxes for the same subject and
/// boxes noticeably wider than the person. Candidates contained in another
/// candidate are dropped, then survivors are tightened by fixed margins.
pub struct Suppressor;

impl Suppressor {
    pub fn new() -> Self {
        Self
    }

    pub fn suppress(&self, rects: &[Rectangle]) -> Vec<Rectangle> {
        remove_contained(rects).iter().map(shrink).collect()
    }
}

impl Default for Suppressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops every rectangle that lies inside some other entry (by index).
///
/// Pairwise O(n²); two identical rectangles therefore remove each other.
fn remove_contained(rects: &[Rectangle]) -> Vec<Rectangle> {
    rects
        .iter()
        .enumerate()
        .filter(|(i, r)| {
            !rects
                .iter()
                .enumerate()
                .any(|(j, s)| j != *i && r.intersect(s) == **r)
        })
        .map(|(_, r)| *r)
        .collect()
}

fn shrink(r: &Rectangle) -> Rectangle {
    let w = r.width as f64;
    let h = r.height as f64;
    Rectangle::new(
        r.x + round_half_even(w * SHRINK_X),
        r.y + round_half_even(h * SHRINK_Y),
        round_half_even(w * SHRINK_WIDTH),
        round_half_even(h * SHRINK_HEIGHT),
    )
}

/// Nearest integer, halves to even (8.5 -> 8, 1.5 -> 2).
fn round_half_even(v: f64) -> i32 {
    v.round_ties_even() as i32
}
