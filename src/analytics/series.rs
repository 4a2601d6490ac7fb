// src/analytics/series.rs
//
// Time-series primitives over daily TVL values.
// Undefined observations are `None` rather than NaN so they cannot leak into means.

use crate::models::{SeriesPoint, TvlHistory};

/// Period-over-period fractional change.
///
/// The first element is always `None`. A change is undefined when the previous
/// value is zero or either value is non-finite.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    for pair in values.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if prev == 0.0 || !prev.is_finite() || !curr.is_finite() {
            out.push(None);
        } else {
            out.push(Some(curr / prev - 1.0));
        }
    }
    out
}

/// Rolling sample standard deviation (n - 1 denominator).
///
/// Element `i` covers `values[i + 1 - window..=i]` and is `None` until the
/// window is full or when any value in it is undefined.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window < 2 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let defined: Vec<f64> = slice.iter().copied().collect::<Option<Vec<f64>>>()?;
            sample_std(&defined)
        })
        .collect()
}

/// Sample standard deviation; `None` for fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(var.sqrt())
}

/// Mean of the defined values, `None` if there are none.
pub fn mean_defined(values: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

/// Chart rows for a protocol: TVL, daily change and rolling volatility.
pub fn series_points(history: &TvlHistory, window: usize) -> Vec<SeriesPoint> {
    let values = history.values();
    let changes = pct_change(&values);
    let vols = rolling_std(&changes, window);

    history
        .points
        .iter()
        .zip(changes)
        .zip(vols)
        .map(|((point, daily_change), rolling_volatility)| SeriesPoint {
            date: point.date,
            tvl: point.total_liquidity_usd,
            daily_change,
            rolling_volatility,
        })
        .collect()
}
