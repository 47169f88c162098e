use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Median filter with a window of `kernel` samples centred on each sample.
/// Samples beyond either end count as zero.
pub fn median_filter(signal: ArrayView1<f64>, kernel: usize) -> Array1<f64> {
    let n = signal.len();
    let half = kernel / 2;
    let mut window = vec![0.0f64; kernel.max(1)];
    let mut out = Array1::<f64>::zeros(n);

    for (i, value) in out.iter_mut().enumerate() {
        for (k, slot) in window.iter_mut().enumerate() {
            *slot = (i + k)
                .checked_sub(half)
                .and_then(|j| signal.get(j).copied())
                .unwrap_or(0.0);
        }
        *value = compute_median(&mut window);
    }
    out
}

/// [`median_filter`] followed by an edge correction: the first and last
/// `kernel / 2 + 1` samples, which the zero padding drags down, are replaced
/// with the mean of the nearest fully-supported samples.
///
/// Kernels below 3 and signals shorter than the kernel are left uncorrected.
pub fn median_filter_edges(signal: ArrayView1<f64>, kernel: usize) -> Array1<f64> {
    let mut out = median_filter(signal, kernel);
    let n = out.len();
    if kernel < 3 || n < kernel {
        return out;
    }

    let pad = kernel / 2 + 1;
    let start = out.slice(s![pad..kernel]).mean().unwrap_or(0.0);
    let end = out.slice(s![n - kernel..n - pad]).mean().unwrap_or(0.0);
    out.slice_mut(s![..pad]).fill(start);
    out.slice_mut(s![n - pad..]).fill(end);
    out
}

/// Apply [`median_filter_edges`] to every column (axis 0 lane) of `data`.
pub fn median_filter_columns(data: ArrayView2<f64>, kernel: usize) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros(data.raw_dim());
    for (mut dst, src) in out.axis_iter_mut(Axis(1)).zip(data.axis_iter(Axis(1))) {
        dst.assign(&median_filter_edges(src, kernel));
    }
    out
}

fn compute_median(values: &mut [f64]) -> f64 {
    let n = values.len();
    let mid = n / 2;
    if n % 2 == 1 {
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + values[mid]) / 2.0
    }
}
