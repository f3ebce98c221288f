use crate::config::{NormMethod, NormParams};

/// Map an aligned series to its pressure series on the same grid.
///
/// The trailing window at date t is the last `window` non-missing
/// observations strictly before t, so a reporting gap stretches the
/// window over calendar time rather than shrinking it. Until that many
/// observations have accumulated the output is missing, and a missing
/// input month stays missing. An extreme value is damped by the clip at
/// its own date but still shifts the statistics of subsequent windows.
pub fn normalize(values: &[Option<f64>], params: &NormParams) -> Vec<Option<f64>> {
    // Compact the non-missing observations, remembering grid positions.
    let observed: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.map(|x| (idx, x)))
        .collect();

    let mut out: Vec<Option<f64>> = vec![None; values.len()];
    let w = params.window;

    for i in w..observed.len() {
        let (grid_idx, x) = observed[i];
        let window: Vec<f64> = observed[i - w..i].iter().map(|(_, v)| *v).collect();
        out[grid_idx] = match params.method {
            NormMethod::RollingZSigmoid => rolling_z(&window, x)
                .map(|z| logistic_pressure(z.clamp(-params.clip, params.clip), params.steepness)),
            NormMethod::Percentile => Some(percentile_rank(&window, x)),
            NormMethod::Zscore => rolling_z(&window, x),
        };
    }

    out
}

/// z-score of `x` against the window's mean and sample standard deviation.
/// `None` when the window has zero variance.
fn rolling_z(window: &[f64], x: f64) -> Option<f64> {
    let n = window.len();
    if n < 2 {
        return None;
    }
    let mean = window.iter().sum::<f64>() / n as f64;
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if !(std > 0.0) || !std.is_finite() {
        return None;
    }
    Some((x - mean) / std)
}

/// Logistic squash of a (clipped) z-score onto 0-100. z=0 lands on 50.
fn logistic_pressure(z: f64, steepness: f64) -> f64 {
    100.0 / (1.0 + (-steepness * z).exp())
}

/// Percentile rank of `x` within the trailing window, 0-100, ties counted
/// at their midpoint so a value equal to the whole window scores 50.
fn percentile_rank(window: &[f64], x: f64) -> f64 {
    let below = window.iter().filter(|v| **v < x).count() as f64;
    let ties = window.iter().filter(|v| **v == x).count() as f64;
    (below + 0.5 * ties) / window.len() as f64 * 100.0
}
