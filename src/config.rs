use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{
    normalize_weights, EngineError, Pillar, SourceKind, DEFAULT_CLIP, DEFAULT_SMOOTHING_WINDOW,
    DEFAULT_STEEPNESS, DEFAULT_WINDOW,
};

/// Per-series normalization method.
///
/// `Zscore` is a debug method: its output is unbounded and the pillar
/// aggregator excludes such series from the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMethod {
    RollingZSigmoid,
    Percentile,
    Zscore,
}

impl NormMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            NormMethod::RollingZSigmoid => "rolling_z_sigmoid",
            NormMethod::Percentile => "percentile",
            NormMethod::Zscore => "zscore",
        }
    }
}

impl std::fmt::Display for NormMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NormMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rolling_z_sigmoid" => Ok(NormMethod::RollingZSigmoid),
            "percentile" => Ok(NormMethod::Percentile),
            "zscore" => Ok(NormMethod::Zscore),
            other => Err(EngineError::Config(format!(
                "unknown normalization method: {other}"
            ))),
        }
    }
}

/// Normalization parameters for one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormParams {
    pub method: NormMethod,
    /// Rolling window, in months of non-missing history.
    pub window: usize,
    /// Symmetric z clip bound.
    pub clip: f64,
    /// Logistic steepness k.
    pub steepness: f64,
    /// Carry the last value over at most this many missing months.
    pub forward_fill_limit: Option<usize>,
}

impl Default for NormParams {
    fn default() -> Self {
        Self {
            method: NormMethod::RollingZSigmoid,
            window: DEFAULT_WINDOW,
            clip: DEFAULT_CLIP,
            steepness: DEFAULT_STEEPNESS,
            forward_fill_limit: None,
        }
    }
}

impl NormParams {
    pub fn validate(&self, context: &str) -> Result<(), EngineError> {
        if self.window == 0 {
            return Err(EngineError::Config(format!(
                "{context}: normalization window must be positive"
            )));
        }
        if !(self.clip > 0.0) {
            return Err(EngineError::Config(format!(
                "{context}: clip bound must be positive, got {}",
                self.clip
            )));
        }
        if !(self.steepness > 0.0) {
            return Err(EngineError::Config(format!(
                "{context}: steepness must be positive, got {}",
                self.steepness
            )));
        }
        Ok(())
    }
}

/// Partial normalization settings from a config file layer.
/// Precedence: series > pillar > file defaults > built-ins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormOverrides {
    pub method: Option<NormMethod>,
    pub window: Option<usize>,
    pub clip: Option<f64>,
    pub steepness: Option<f64>,
    pub forward_fill_limit: Option<usize>,
}

impl NormOverrides {
    pub fn apply(&self, base: NormParams) -> NormParams {
        NormParams {
            method: self.method.unwrap_or(base.method),
            window: self.window.unwrap_or(base.window),
            clip: self.clip.unwrap_or(base.clip),
            steepness: self.steepness.unwrap_or(base.steepness),
            forward_fill_limit: self.forward_fill_limit.or(base.forward_fill_limit),
        }
    }
}

/// One fully-resolved sub-series: where it comes from, how it normalizes,
/// and its weight inside the pillar aggregate.
#[derive(Debug, Clone)]
pub struct SeriesConfig {
    pub pillar: Pillar,
    pub name: String,
    pub source: SourceKind,
    pub weight: f64,
    pub params: NormParams,
}

impl SeriesConfig {
    /// Column label in the output table.
    pub fn column(&self) -> String {
        format!("{}_{}", self.pillar, self.name)
    }
}

/// A whole run's configuration, immutable once built.
///
/// Every run is a pure function of (raw inputs, this struct); the engine
/// never retains or mutates configuration between runs.
#[derive(Debug, Clone)]
pub struct Config {
    /// First grid month (month-end).
    pub start: NaiveDate,
    /// Last grid month considered for synthetic sources; real series may
    /// extend the grid up to their latest observation.
    pub end: NaiveDate,
    /// Raw pillar weights, index-aligned with `Pillar::ALL`. Validated and
    /// scaled to sum 1 by the engine before any series processing.
    pub pillar_weights: Vec<f64>,
    pub smoothing_window: usize,
    pub series: Vec<SeriesConfig>,
    pub out_format: String,
    pub output_dir: PathBuf,
}

impl Config {
    /// Reject structural errors before any series is touched.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.series.is_empty() {
            return Err(EngineError::Config("no series configured".to_string()));
        }
        if self.pillar_weights.len() != Pillar::ALL.len() {
            return Err(EngineError::Config(format!(
                "expected {} pillar weights, got {}",
                Pillar::ALL.len(),
                self.pillar_weights.len()
            )));
        }
        normalize_weights(&self.pillar_weights)?;
        if self.smoothing_window == 0 {
            return Err(EngineError::Config(
                "smoothing window must be positive".to_string(),
            ));
        }
        if self.start > self.end {
            return Err(EngineError::Config(format!(
                "grid start {} is after end {}",
                self.start, self.end
            )));
        }
        for s in &self.series {
            s.params.validate(&s.column())?;
            if s.weight < 0.0 || !s.weight.is_finite() {
                return Err(EngineError::Config(format!(
                    "{}: sub-pillar weight must be non-negative, got {}",
                    s.column(),
                    s.weight
                )));
            }
        }
        match self.out_format.as_str() {
            "parquet" | "csv" => {}
            other => {
                return Err(EngineError::Config(format!(
                    "unknown output format: {other}"
                )))
            }
        }
        Ok(())
    }

    /// Pillar weights validated and scaled to sum 1.
    pub fn weight_config(&self) -> Result<WeightConfig, EngineError> {
        WeightConfig::new(&self.pillar_weights)
    }
}

/// Immutable normalized pillar weights for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightConfig {
    shares: Vec<f64>,
}

impl WeightConfig {
    pub fn new(raw: &[f64]) -> Result<Self, EngineError> {
        if raw.len() != Pillar::ALL.len() {
            return Err(EngineError::Config(format!(
                "expected {} pillar weights, got {}",
                Pillar::ALL.len(),
                raw.len()
            )));
        }
        Ok(Self {
            shares: normalize_weights(raw)?,
        })
    }

    pub fn share(&self, pillar: Pillar) -> f64 {
        let idx = Pillar::ALL.iter().position(|p| *p == pillar).expect("canonical pillar");
        self.shares[idx]
    }

    pub fn shares(&self) -> &[f64] {
        &self.shares
    }
}

// ---- config file (JSON) ----

/// On-disk configuration: file-wide normalization defaults plus
/// per-pillar and per-series overrides, pillar weights, and grid bounds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// First grid month, `YYYY-MM`.
    pub start: Option<String>,
    pub smoothing_window: Option<usize>,
    #[serde(default)]
    pub defaults: NormOverrides,
    /// Pillar name -> weight. Missing pillars keep the equal default.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub pillars: BTreeMap<String, PillarFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PillarFile {
    /// Shorthand for a single-series pillar.
    pub source: Option<String>,
    #[serde(flatten)]
    pub norm: NormOverrides,
    #[serde(default)]
    pub series: Vec<SeriesFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesFile {
    pub name: Option<String>,
    pub source: String,
    pub weight: Option<f64>,
    #[serde(flatten)]
    pub norm: NormOverrides,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            EngineError::Config(format!("failed to parse config {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "loaded configuration file");
        Ok(file)
    }
}
