use std::ops::Range;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Objects kept in one row: first-frame midpoints of trenches whose
/// kymograph window stays inside the frame for the whole series.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrenchSet {
    pub midpoints: Vec<usize>,
    pub width: usize,
}

/// One past the last column of the `width`-wide window around `midpoint`
/// shifted by `drift`. The window is `[end - width, end)`.
fn window_end(midpoint: usize, drift: i64, width: usize) -> i64 {
    midpoint as i64 + drift + (width / 2) as i64 + 1
}

/// Whether the window around `midpoint` stays inside `[0, x_dim)` at `drift`,
/// with `midpoint - width / 2` as the lower bound for any width.
fn in_frame(midpoint: usize, drift: i64, width: usize, x_dim: usize) -> bool {
    midpoint as i64 + drift - (width / 2) as i64 >= 0
        && window_end(midpoint, drift, width) <= x_dim as i64
}

impl TrenchSet {
    /// Keep the candidates of `first_frame` (ascending) whose window is in
    /// `[0, x_dim)` at every timepoint and that sit at least `width + 1`
    /// past the previously kept one.
    pub fn select(first_frame: &[usize], drift: &[i64], width: usize, x_dim: usize) -> Self {
        let mut midpoints: Vec<usize> = Vec::new();
        for &m in first_frame {
            if !drift.iter().all(|&d| in_frame(m, d, width, x_dim)) {
                continue;
            }
            let spaced = midpoints
                .last()
                .map_or(true, |&prev| m >= prev + width + 1);
            if spaced {
                midpoints.push(m);
            }
        }
        Self { midpoints, width }
    }

    pub fn len(&self) -> usize {
        self.midpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.midpoints.is_empty()
    }

    /// Columns of object `k` at a timepoint with the given cumulative drift.
    /// Only meaningful for drifts the set was selected with.
    pub fn window(&self, k: usize, drift: i64) -> Range<usize> {
        let end = window_end(self.midpoints[k], drift, self.width);
        let start = (end - self.width as i64).max(0) as usize;
        start..start + self.width
    }

    /// Boolean (x, t) mask of the columns covered by any object.
    pub fn mask(&self, drift: &[i64], x_dim: usize) -> TrenchMask {
        let mut mask = Array2::from_elem((x_dim, drift.len()), false);
        for (t, &d) in drift.iter().enumerate() {
            for k in 0..self.len() {
                for x in self.window(k, d) {
                    if x < x_dim {
                        mask[[x, t]] = true;
                    }
                }
            }
        }
        TrenchMask {
            mask,
            objects: self.len(),
            width: self.width,
        }
    }
}

/// Columns to gather for one row, over x and t.
#[derive(Clone, Debug)]
pub struct TrenchMask {
    mask: Array2<bool>,
    objects: usize,
    width: usize,
}

impl TrenchMask {
    pub fn objects(&self) -> usize {
        self.objects
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn timepoints(&self) -> usize {
        self.mask.len_of(Axis(1))
    }

    /// The (x, t) mask.
    pub fn view(&self) -> ArrayView2<'_, bool> {
        self.mask.view()
    }

    /// Mask column of timepoint `t`.
    pub fn at(&self, t: usize) -> ArrayView1<'_, bool> {
        self.mask.column(t)
    }

    /// Ascending x positions selected at timepoint `t`.
    pub fn selected(&self, t: usize) -> Vec<usize> {
        self.at(t)
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .map(|(x, _)| x)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_frame_object_excluded() {
        // Object at 10 starts at 10 - 6 - 5 < 0 when the row drifts left.
        let set = TrenchSet::select(&[10, 50, 90], &[0, 0, -6, 0], 10, 100);
        assert_eq!(set.midpoints, vec![50, 90]);
    }

    #[test]
    fn test_right_border_exclusion() {
        // 94 + 5 + 1 = 100 is the last valid end; a +1 drift pushes it out.
        let set = TrenchSet::select(&[50, 94], &[0, 1], 10, 100);
        assert_eq!(set.midpoints, vec![50]);
        let set = TrenchSet::select(&[50, 94], &[0, 0], 10, 100);
        assert_eq!(set.midpoints, vec![50, 94]);
        let set = TrenchSet::select(&[50, 95], &[0, 0], 10, 100);
        assert_eq!(set.midpoints, vec![50]);
    }

    #[test]
    fn test_object_touching_right_border_excluded() {
        // Window of 85 with width 30 would end at 101.
        let set = TrenchSet::select(&[85], &[0, 0], 30, 100);
        assert!(set.is_empty());
        let set = TrenchSet::select(&[84], &[0, 0], 30, 100);
        assert_eq!(set.midpoints, vec![84]);
        assert_eq!(set.window(0, 0), 70..100);
    }

    #[test]
    fn test_window_has_width_columns() {
        let even = TrenchSet::select(&[50], &[0], 10, 100);
        assert_eq!(even.window(0, 0), 46..56);
        assert_eq!(even.window(0, -3), 43..53);
        let odd = TrenchSet::select(&[50], &[0], 11, 100);
        assert_eq!(odd.window(0, 0), 45..56);
    }

    #[test]
    fn test_spacing_against_previous_kept() {
        // 60 is too close to 50 and dropped; 65 is measured against 50 too.
        let set = TrenchSet::select(&[50, 60, 65], &[0], 10, 200);
        assert_eq!(set.midpoints, vec![50, 65]);
    }

    #[test]
    fn test_mask_selects_k_times_width() {
        let drift = [0, 3, -2];
        let set = TrenchSet::select(&[20, 50, 80], &drift, 10, 100);
        let mask = set.mask(&drift, 100);
        for t in 0..drift.len() {
            assert_eq!(mask.selected(t).len(), set.len() * 10);
        }
        assert_eq!(mask.selected(1)[0], 20 + 3 - 5 + 1);
    }
}
