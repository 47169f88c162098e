/// Value histogram over `[min, max]` of its samples, with bin centres.
struct Histogram {
    counts: Vec<u64>,
    centers: Vec<f64>,
}

impl Histogram {
    /// `None` when there are no finite samples or they are all equal.
    fn build(values: &[f64], nbins: usize) -> Option<Self> {
        let (min, max) = finite_range(values)?;
        if min == max || nbins == 0 {
            return None;
        }

        let span = max - min;
        let mut counts = vec![0u64; nbins];
        for &v in values.iter().filter(|v| v.is_finite()) {
            let bin = (((v - min) / span) * nbins as f64) as usize;
            counts[bin.min(nbins - 1)] += 1;
        }
        let width = span / nbins as f64;
        let centers = (0..nbins)
            .map(|i| min + (i as f64 + 0.5) * width)
            .collect();

        Some(Self { counts, centers })
    }
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Index of the first maximum.
fn argmax<I: IntoIterator<Item = f64>>(values: I) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, v) in values.into_iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Triangle threshold: the bin farthest below the line joining the histogram
/// peak to the end of its longer tail.
///
/// A constant (or empty) input returns its value (or 0).
pub fn triangle_threshold(values: &[f64], nbins: usize) -> f64 {
    let Some(hist) = Histogram::build(values, nbins) else {
        return finite_range(values).map_or(0.0, |(lo, _)| lo);
    };
    let nbins = hist.counts.len();

    let mut arg_peak = argmax(hist.counts.iter().map(|&c| c as f64));
    let peak_height = hist.counts[arg_peak] as f64;
    let mut arg_low = hist.counts.iter().position(|&c| c > 0).unwrap_or(0);
    let arg_high = hist.counts.iter().rposition(|&c| c > 0).unwrap_or(nbins - 1);
    if arg_low == arg_high {
        return hist.centers[arg_low];
    }

    // Walk the longer tail; mirror the histogram when it lies above the peak.
    let flip = arg_peak - arg_low < arg_high - arg_peak;
    let mut counts = hist.counts.clone();
    if flip {
        counts.reverse();
        arg_low = nbins - arg_high - 1;
        arg_peak = nbins - arg_peak - 1;
    }

    let width = (arg_peak - arg_low) as f64;
    let norm = (peak_height * peak_height + width * width).sqrt();
    let (peak_n, width_n) = (peak_height / norm, width / norm);

    let offset = argmax(
        (0..arg_peak - arg_low).map(|x| peak_n * x as f64 - width_n * counts[x + arg_low] as f64),
    );
    let mut level = offset + arg_low;
    if flip {
        level = nbins - level - 1;
    }
    hist.centers[level]
}

/// Otsu's threshold: the bin centre maximizing between-class variance.
///
/// A constant (or empty) input returns its value (or 0).
pub fn otsu_threshold(values: &[f64], nbins: usize) -> f64 {
    let Some(hist) = Histogram::build(values, nbins) else {
        return finite_range(values).map_or(0.0, |(lo, _)| lo);
    };
    let n = hist.counts.len();
    let counts: Vec<f64> = hist.counts.iter().map(|&c| c as f64).collect();

    // Class weights and means from below (1) and from above (2) each bin.
    let mut weight1 = vec![0.0; n];
    let mut mean1 = vec![0.0; n];
    let (mut w, mut s) = (0.0, 0.0);
    for i in 0..n {
        w += counts[i];
        s += counts[i] * hist.centers[i];
        weight1[i] = w;
        mean1[i] = if w > 0.0 { s / w } else { 0.0 };
    }
    let mut weight2 = vec![0.0; n];
    let mut mean2 = vec![0.0; n];
    let (mut w, mut s) = (0.0, 0.0);
    for i in (0..n).rev() {
        w += counts[i];
        s += counts[i] * hist.centers[i];
        weight2[i] = w;
        mean2[i] = if w > 0.0 { s / w } else { 0.0 };
    }

    let idx = argmax((0..n - 1).map(|i| {
        let diff = mean1[i] - mean2[i + 1];
        weight1[i] * weight2[i + 1] * diff * diff
    }));
    hist.centers[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bimodal() -> Vec<f64> {
        let mut v = vec![10.0; 80];
        v.extend(std::iter::repeat(100.0).take(20));
        v
    }

    #[test]
    fn test_otsu_separates_modes() {
        let t = otsu_threshold(&bimodal(), 50);
        assert!(t > 10.0 && t < 100.0, "threshold {t}");
    }

    #[test]
    fn test_triangle_separates_modes() {
        let t = triangle_threshold(&bimodal(), 50);
        assert!(t > 10.0 && t < 100.0, "threshold {t}");
    }

    #[test]
    fn test_triangle_peak_above_tail() {
        // Dominant peak at the top of the range, tail towards low values.
        let mut v = vec![100.0; 80];
        v.extend((0..20).map(|i| i as f64 * 4.0));
        let t = triangle_threshold(&v, 25);
        assert!(t < 100.0, "threshold {t}");
    }

    #[test]
    fn test_constant_input() {
        let v = vec![7.0; 10];
        assert_eq!(otsu_threshold(&v, 50), 7.0);
        assert_eq!(triangle_threshold(&v, 50), 7.0);
        assert_eq!(otsu_threshold(&[], 50), 0.0);
    }

    #[test]
    fn test_histogram_places_max_in_last_bin() {
        let hist = Histogram::build(&[0.0, 1.0, 2.0], 4).unwrap();
        assert_eq!(hist.counts, vec![1, 0, 1, 1]);
        assert!((hist.centers[0] - 0.25).abs() < 1e-12);
    }
}
