/// Weighted mean over the available (non-missing) entries, with the
/// weights renormalized to that subset. This is the single drop-missing
/// rule used at both the sub-pillar and the pillar level: the weight of
/// an unavailable member is redistributed pro rata, so a lone available
/// member passes through exactly regardless of its configured weight.
///
/// `None` when nothing is available or the available weight mass is zero.
pub fn weighted_mean_available(values: &[Option<f64>], weights: &[f64]) -> Option<f64> {
    debug_assert_eq!(values.len(), weights.len());
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut available = 0usize;
    let mut last = 0.0;
    for (value, weight) in values.iter().zip(weights) {
        if let Some(v) = value {
            weighted_sum += weight * v;
            total_weight += weight;
            if *weight > 0.0 {
                available += 1;
                last = *v;
            }
        }
    }
    if total_weight <= 0.0 {
        return None;
    }
    // A lone carrier passes through bit-exactly; its weight cancels in
    // the ratio.
    if available == 1 {
        return Some(last);
    }
    Some(weighted_sum / total_weight)
}

/// Combine sub-series rows into one pillar score per date.
/// `columns` are grid-aligned normalized sub-series of equal length.
pub fn aggregate_rows(columns: &[&[Option<f64>]], weights: &[f64], len: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(len);
    let mut row = vec![None; columns.len()];
    for t in 0..len {
        for (slot, col) in row.iter_mut().zip(columns) {
            *slot = col[t];
        }
        out.push(weighted_mean_available(&row, weights));
    }
    out
}

/// Trailing rolling mean over `window` months. A date with fewer than
/// `window` non-missing trailing values (including itself) is missing;
/// no partial-window averaging.
pub fn smooth(series: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; series.len()];
    for t in 0..series.len() {
        if t + 1 < window {
            continue;
        }
        let tail = &series[t + 1 - window..=t];
        if tail.iter().all(|v| v.is_some()) {
            let sum: f64 = tail.iter().flatten().sum();
            out[t] = Some(sum / window as f64);
        }
    }
    out
}
