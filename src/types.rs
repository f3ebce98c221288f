use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Series count above which normalization fans out across the Rayon pool.
pub const PARALLEL_THRESHOLD: usize = 4;

/// Trailing months averaged for the smoothed composite.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 6;

/// Default rolling window (months) when neither config nor CLI set one.
pub const DEFAULT_WINDOW: usize = 24;

/// Default z clip bound.
pub const DEFAULT_CLIP: f64 = 4.0;

/// Default logistic steepness.
pub const DEFAULT_STEEPNESS: f64 = 1.2;

/// Round a float to 6 significant digits
pub fn round_to_6_sig_digits(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().floor();
    let factor = 10.0_f64.powi(5 - magnitude as i32);
    (value * factor).round() / factor
}

/// Engine-level failures. Soft conditions (insufficient history, no
/// available pillars on a date) are never errors; they travel as `None`
/// values through the pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("malformed input series `{series}`: {reason}")]
    MalformedInput { series: String, reason: String },
}

/// The six top-level pillars feeding the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pillar {
    Market,
    Credit,
    Capex,
    Infrastructure,
    Adoption,
    Sentiment,
}

impl Pillar {
    /// Canonical pillar order, used for weights, columns and display.
    pub const ALL: [Pillar; 6] = [
        Pillar::Market,
        Pillar::Credit,
        Pillar::Capex,
        Pillar::Infrastructure,
        Pillar::Adoption,
        Pillar::Sentiment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Pillar::Market => "market",
            Pillar::Credit => "credit",
            Pillar::Capex => "capex",
            Pillar::Infrastructure => "infrastructure",
            Pillar::Adoption => "adoption",
            Pillar::Sentiment => "sentiment",
        }
    }

    pub fn parse(s: &str) -> Result<Pillar, EngineError> {
        match s.to_ascii_lowercase().as_str() {
            "market" => Ok(Pillar::Market),
            "credit" => Ok(Pillar::Credit),
            "capex" => Ok(Pillar::Capex),
            "infrastructure" | "infra" => Ok(Pillar::Infrastructure),
            "adoption" => Ok(Pillar::Adoption),
            "sentiment" => Ok(Pillar::Sentiment),
            other => Err(EngineError::Config(format!("unknown pillar: {other}"))),
        }
    }
}

impl std::fmt::Display for Pillar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One dated observation of a raw series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// A named raw monthly series handed over by a source adapter.
///
/// Dates are month-ends, strictly increasing. Sources snap observation
/// dates to month-end before handing the series over; the engine re-checks
/// ordering and rejects violations by series name.
#[derive(Debug, Clone)]
pub struct RawSeries {
    pub name: String,
    pub pillar: Pillar,
    pub points: Vec<SeriesPoint>,
}

impl RawSeries {
    pub fn new(pillar: Pillar, name: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        Self {
            name: name.into(),
            pillar,
            points,
        }
    }

    /// Latest observation date, if the series has any points.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// A series laid out on the time grid; `None` marks a missing month.
/// Used both for aligned raw values and for normalized 0-100 scores.
#[derive(Debug, Clone)]
pub struct GridSeries {
    pub name: String,
    pub pillar: Pillar,
    pub values: Vec<Option<f64>>,
}

/// Where a sub-series comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// A `(date,value)` CSV file written by an external fetcher.
    Csv(std::path::PathBuf),
    Synthetic(SyntheticModel),
}

/// Synthetic monthly generators, for demo runs and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntheticModel {
    /// Linear drift with Gaussian noise: `base + slope*t + N(0, noise)`.
    Trend { slope: f64, noise: f64, base: f64 },
    /// Mean-reverting AR(1) around `base`.
    Ar1 { phi: f64, sigma: f64, base: f64 },
    /// Deterministic seasonal wave, useful for reproducible tests.
    Sine { period: f64, amplitude: f64, base: f64 },
}

/// Snap a date to the last day of its month.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .expect("in-range date")
}

/// Month-end of the month after `date`.
pub fn next_month_end(date: NaiveDate) -> NaiveDate {
    let first_of_next = month_end(date).succ_opt().expect("in-range date");
    month_end(first_of_next)
}

/// Scale raw weights so they sum to 1.0.
///
/// Rejects negative weights and an all-zero total instead of silently
/// defaulting; partially-weighted output is never produced.
pub fn normalize_weights(weights: &[f64]) -> Result<Vec<f64>, EngineError> {
    if let Some(w) = weights.iter().find(|w| **w < 0.0 || !w.is_finite()) {
        return Err(EngineError::Config(format!(
            "weights must be non-negative and finite, got {w}"
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(EngineError::Config(
            "weights must sum to a positive total".to_string(),
        ));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_end_snaps_mid_month() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        assert_eq!(month_end(d), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let dec = NaiveDate::from_ymd_opt(1999, 12, 1).unwrap();
        assert_eq!(month_end(dec), NaiveDate::from_ymd_opt(1999, 12, 31).unwrap());
    }

    #[test]
    fn next_month_end_rolls_over_year() {
        let d = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        assert_eq!(
            next_month_end(d),
            NaiveDate::from_ymd_opt(2021, 1, 31).unwrap()
        );
    }

    #[test]
    fn normalize_weights_scales_to_one() {
        let w = normalize_weights(&[2.0, 1.0, 1.0]).unwrap();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((w[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn normalize_weights_rejects_zero_total() {
        assert!(normalize_weights(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn normalize_weights_rejects_negative() {
        assert!(normalize_weights(&[1.0, -0.5]).is_err());
    }
}
