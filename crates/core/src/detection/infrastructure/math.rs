//! Shared math utilities for detection infrastructure.
//!
//! Union-find clustering and a least-squares similarity fit used by the
//! proposers and the shape predictor.

/// Find root of element `i` with path halving for amortized near-O(1).
pub fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
pub fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Partitions `items` into equivalence classes of the `same` predicate.
///
/// Returns `(labels, class_count)`. Class labels are numbered in order of
/// first appearance, so label 0 is the class of `items[0]`.
pub fn partition<T>(items: &[T], same: impl Fn(&T, &T) -> bool) -> (Vec<usize>, usize) {
    let n = items.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if same(&items[i], &items[j]) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut root_label: Vec<Option<usize>> = vec![None; n];
    let mut labels = Vec::with_capacity(n);
    let mut classes = 0;
    for i in 0..n {
        let root = find(&mut parent, i);
        let label = *root_label[root].get_or_insert_with(|| {
            classes += 1;
            classes - 1
        });
        labels.push(label);
    }
    (labels, classes)
}

/// Linear part of the least-squares similarity transform mapping `from` onto `to`.
///
/// Returns `[[a, -b], [b, a]]` (rotation + uniform scale, no translation).
/// Degenerate inputs yield the identity.
pub fn similarity_matrix(from: &[(f32, f32)], to: &[(f32, f32)]) -> [[f32; 2]; 2] {
    let n = from.len().min(to.len());
    if n == 0 {
        return [[1.0, 0.0], [0.0, 1.0]];
    }
    let mean = |pts: &[(f32, f32)]| {
        let (sx, sy) = pts[..n]
            .iter()
            .fold((0.0f64, 0.0f64), |(ax, ay), p| (ax + p.0 as f64, ay + p.1 as f64));
        (sx / n as f64, sy / n as f64)
    };
    let (fx, fy) = mean(from);
    let (tx, ty) = mean(to);

    let mut dot = 0.0f64;
    let mut cross = 0.0f64;
    let mut norm = 0.0f64;
    for (f, t) in from.iter().zip(to.iter()).take(n) {
        let (ax, ay) = (f.0 as f64 - fx, f.1 as f64 - fy);
        let (bx, by) = (t.0 as f64 - tx, t.1 as f64 - ty);
        dot += ax * bx + ay * by;
        cross += ax * by - ay * bx;
        norm += ax * ax + ay * ay;
    }
    if norm <= f64::EPSILON {
        return [[1.0, 0.0], [0.0, 1.0]];
    }
    let a = (dot / norm) as f32;
    let b = (cross / norm) as f32;
    [[a, -b], [b, a]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_union_find_transitive() {
        let mut parent = vec![0, 1, 2];
        union(&mut parent, 0, 1);
        union(&mut parent, 1, 2);
        assert_eq!(find(&mut parent, 0), find(&mut parent, 2));
    }

    #[test]
    fn test_union_find_separate() {
        let mut parent = vec![0, 1, 2, 3];
        union(&mut parent, 0, 1);
        union(&mut parent, 2, 3);
        assert_ne!(find(&mut parent, 0), find(&mut parent, 2));
    }

    #[test]
    fn test_partition_labels_in_first_appearance_order() {
        let items: [i32; 5] = [10, 50, 11, 51, 90];
        let (labels, classes) = partition(&items, |a, b| (a - b).abs() <= 2);
        assert_eq!(classes, 3);
        assert_eq!(labels, vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn test_partition_empty() {
        let items: [i32; 0] = [];
        let (labels, classes) = partition(&items, |_, _| true);
        assert!(labels.is_empty());
        assert_eq!(classes, 0);
    }

    #[test]
    fn test_similarity_identity() {
        let pts = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
        let m = similarity_matrix(&pts, &pts);
        assert_relative_eq!(m[0][0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(m[1][0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_similarity_scale_and_translation() {
        let from = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
        let to = [(5.0, 5.0), (7.0, 5.0), (5.0, 7.0)];
        let m = similarity_matrix(&from, &to);
        assert_relative_eq!(m[0][0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(m[0][1], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_similarity_rotation_90() {
        // (x, y) -> (-y, x)
        let from = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];
        let to = [(0.0, 1.0), (-1.0, 0.0), (0.0, -1.0), (1.0, 0.0)];
        let m = similarity_matrix(&from, &to);
        assert_relative_eq!(m[0][0], 0.0, epsilon = 1e-5);
        assert_relative_eq!(m[1][0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(m[0][1], -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_similarity_degenerate_is_identity() {
        let from = [(3.0, 3.0), (3.0, 3.0)];
        let to = [(1.0, 2.0), (4.0, 5.0)];
        assert_eq!(similarity_matrix(&from, &to), [[1.0, 0.0], [0.0, 1.0]]);
    }
}
