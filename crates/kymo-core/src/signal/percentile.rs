use ndarray::{Array, ArrayBase, Axis, Data, RemoveAxis};

use crate::store::Element;

/// Percentile `q` (0..=100) with linear interpolation between the two
/// nearest ranks. Reorders `values`. Returns NaN for an empty slice.
pub fn percentile(values: &mut [f64], q: f64) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let pos = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let frac = pos - lo as f64;

    let (_, lo_val, upper) = values.select_nth_unstable_by(lo, |a, b| a.total_cmp(b));
    let lo_val = *lo_val;
    if frac == 0.0 || upper.is_empty() {
        return lo_val;
    }
    let hi_val = upper.iter().copied().fold(f64::INFINITY, f64::min);
    lo_val + (hi_val - lo_val) * frac
}

/// Collapse `axis` of `data` to its `q`-th percentile.
pub fn percentile_along<S, T, D>(data: &ArrayBase<S, D>, axis: usize, q: f64) -> Array<f64, D::Smaller>
where
    S: Data<Elem = T>,
    T: Element,
    D: RemoveAxis,
{
    let mut scratch = Vec::with_capacity(data.len_of(Axis(axis)));
    data.map_axis(Axis(axis), |lane| {
        scratch.clear();
        scratch.extend(lane.iter().map(|&v| v.as_()));
        percentile(&mut scratch, q)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_percentile_interpolates() {
        let mut v = vec![4.0, 1.0, 3.0, 2.0];
        // pos = 0.5 * 3 = 1.5 -> halfway between 2 and 3
        assert!((percentile(&mut v, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_extremes() {
        let mut v = vec![5.0, -1.0, 7.0];
        assert_eq!(percentile(&mut v, 0.0), -1.0);
        assert_eq!(percentile(&mut v, 100.0), 7.0);
    }

    #[test]
    fn test_percentile_along_axis() {
        let data = array![[1u16, 2, 3], [10, 20, 30]];
        let rows = percentile_along(&data, 1, 100.0);
        assert_eq!(rows.to_vec(), vec![3.0, 30.0]);
        let cols = percentile_along(&data, 0, 0.0);
        assert_eq!(cols.to_vec(), vec![1.0, 2.0, 3.0]);
    }
}
