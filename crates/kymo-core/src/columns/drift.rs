/// Integer x shift between two consecutive midpoint sets.
///
/// Every midpoint of `next` is matched to its nearest midpoint in `prev`
/// (the first one on ties); the step is the median signed difference,
/// truncated toward zero. Either set being empty gives no shift.
pub fn step_drift(prev: &[usize], next: &[usize]) -> i64 {
    if prev.is_empty() || next.is_empty() {
        return 0;
    }

    let mut diffs: Vec<i64> = next
        .iter()
        .map(|&m| {
            let m = m as i64;
            let nearest = prev
                .iter()
                .map(|&p| p as i64)
                .min_by_key(|&p| (m - p).abs())
                .unwrap_or(m);
            m - nearest
        })
        .collect();
    diffs.sort_unstable();

    let n = diffs.len();
    if n % 2 == 1 {
        diffs[n / 2]
    } else {
        // Integer division truncates toward zero.
        (diffs[n / 2 - 1] + diffs[n / 2]) / 2
    }
}

/// Cumulative drift of a row's midpoint series; `[0]` is always 0.
pub fn drift_series(midpoints: &[Vec<usize>]) -> Vec<i64> {
    let mut series = Vec::with_capacity(midpoints.len().max(1));
    series.push(0);
    let mut total = 0i64;
    for pair in midpoints.windows(2) {
        total += step_drift(&pair[0], &pair[1]);
        series.push(total);
    }
    series.truncate(midpoints.len().max(1));
    series
}
