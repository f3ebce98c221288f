use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use regex::Regex;

use crate::config::{Config, ConfigFile, NormOverrides, NormParams, SeriesConfig, SeriesFile};
use crate::types::{month_end, Pillar, SourceKind, SyntheticModel, DEFAULT_SMOOTHING_WINDOW};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON configuration file (defaults, pillar sections, weights).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Inline series specs, `pillar=source`, pipe-delimited. Overrides the
    /// config file's series for the named pillar.
    #[arg(long, value_delimiter = '|')]
    pub series: Vec<String>,

    /// Pillar weights in canonical order
    /// (market|credit|capex|infrastructure|adoption|sentiment).
    #[arg(long, value_delimiter = '|')]
    pub weights: Option<Vec<f64>>,

    /// First grid month, `YYYY-MM`.
    #[arg(long)]
    pub start: Option<String>,

    /// Last grid month, `YYYY-MM`, or `latest`.
    #[arg(long, default_value = "latest")]
    pub end: String,

    /// Default normalization method (rolling_z_sigmoid|percentile|zscore).
    #[arg(long)]
    pub method: Option<String>,

    /// Default rolling window in months.
    #[arg(long)]
    pub window: Option<usize>,

    /// Default z clip bound.
    #[arg(long)]
    pub clip: Option<f64>,

    /// Default logistic steepness.
    #[arg(long)]
    pub steepness: Option<f64>,

    /// Default forward-fill limit in months.
    #[arg(long)]
    pub ffill_limit: Option<usize>,

    /// Smoothing window for the composite, in months.
    #[arg(long)]
    pub smooth: Option<usize>,

    #[arg(long, default_value = "parquet")]
    pub out_format: String,

    #[arg(long, default_value = "./output")]
    pub output_dir: PathBuf,
}

impl Args {
    pub fn into_config(self) -> Result<Config> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        // Precedence for defaults: CLI > config file > built-ins.
        let mut defaults = file.defaults.apply(NormParams::default());
        if let Some(method) = &self.method {
            defaults.method = method.parse()?;
        }
        if let Some(window) = self.window {
            defaults.window = window;
        }
        if let Some(clip) = self.clip {
            defaults.clip = clip;
        }
        if let Some(steepness) = self.steepness {
            defaults.steepness = steepness;
        }
        if let Some(limit) = self.ffill_limit {
            defaults.forward_fill_limit = Some(limit);
        }

        let start = match self.start.as_deref().or(file.start.as_deref()) {
            Some(s) => parse_month(s)?,
            None => parse_month("1980-01")?,
        };
        let end = match self.end.as_str() {
            "latest" | "now" | "today" => month_end(Utc::now().date_naive()),
            s => parse_month(s)?,
        };

        // Series from the config file first, then CLI overrides by pillar.
        let mut per_pillar: BTreeMap<Pillar, Vec<SeriesConfig>> = BTreeMap::new();
        for (pillar_name, section) in &file.pillars {
            let pillar = Pillar::parse(pillar_name)?;
            let pillar_defaults = section.norm.apply(defaults);
            let mut series = Vec::new();
            if let Some(spec) = &section.source {
                series.push(resolve_series(pillar, None, spec, None, &NormOverrides::default(), pillar_defaults)?);
            }
            for sf in &section.series {
                let SeriesFile {
                    name,
                    source,
                    weight,
                    norm,
                } = sf;
                series.push(resolve_series(
                    pillar,
                    name.as_deref(),
                    source,
                    *weight,
                    norm,
                    pillar_defaults,
                )?);
            }
            if series.is_empty() {
                bail!("pillar `{pillar}` configures no series");
            }
            per_pillar.insert(pillar, series);
        }

        for spec in &self.series {
            let (pillar_name, source) = spec
                .split_once('=')
                .ok_or_else(|| anyhow!("bad --series entry `{spec}`, expected pillar=source"))?;
            let pillar = Pillar::parse(pillar_name)?;
            let series = resolve_series(pillar, None, source, None, &NormOverrides::default(), defaults)?;
            per_pillar.insert(pillar, vec![series]);
        }

        let mut series = Vec::new();
        for pillar in Pillar::ALL {
            if let Some(mut list) = per_pillar.remove(&pillar) {
                series.append(&mut list);
            }
        }

        // Weights: CLI vector > config file map > equal.
        let pillar_weights = if let Some(w) = self.weights {
            if w.len() != Pillar::ALL.len() {
                bail!(
                    "--weights needs {} values in canonical pillar order, got {}",
                    Pillar::ALL.len(),
                    w.len()
                );
            }
            w
        } else if !file.weights.is_empty() {
            let mut w = vec![1.0; Pillar::ALL.len()];
            for (name, weight) in &file.weights {
                let pillar = Pillar::parse(name)?;
                let idx = Pillar::ALL.iter().position(|p| *p == pillar).expect("canonical pillar");
                w[idx] = *weight;
            }
            w
        } else {
            vec![1.0; Pillar::ALL.len()]
        };

        let config = Config {
            start,
            end,
            pillar_weights,
            smoothing_window: self
                .smooth
                .or(file.smoothing_window)
                .unwrap_or(DEFAULT_SMOOTHING_WINDOW),
            series,
            out_format: self.out_format,
            output_dir: self.output_dir,
        };
        config.validate()?;
        Ok(config)
    }
}

fn resolve_series(
    pillar: Pillar,
    name: Option<&str>,
    source_spec: &str,
    weight: Option<f64>,
    overrides: &NormOverrides,
    base: NormParams,
) -> Result<SeriesConfig> {
    let source = parse_source_spec(source_spec)?;
    let name = match name {
        Some(n) => n.to_string(),
        None => default_series_name(&source),
    };
    Ok(SeriesConfig {
        pillar,
        name,
        source,
        weight: weight.unwrap_or(1.0),
        params: overrides.apply(base),
    })
}

fn default_series_name(source: &SourceKind) -> String {
    match source {
        SourceKind::Csv(path) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "csv".to_string()),
        SourceKind::Synthetic(SyntheticModel::Trend { .. }) => "trend".to_string(),
        SourceKind::Synthetic(SyntheticModel::Ar1 { .. }) => "ar1".to_string(),
        SourceKind::Synthetic(SyntheticModel::Sine { .. }) => "sine".to_string(),
    }
}

/// Parse a source spec: `csv(path)`, a bare `*.csv` path, or a synthetic
/// model like `trend(slope,noise,base)`, `ar1(phi,sigma,base)`,
/// `sine(period,amplitude,base)`.
pub fn parse_source_spec(spec: &str) -> Result<SourceKind> {
    let csv_re = Regex::new(r"^csv\(([^)]+)\)$")?;
    let trend_re = Regex::new(r"^trend\(([^,]+),([^,]+),([^)]+)\)$")?;
    let ar1_re = Regex::new(r"^ar1\(([^,]+),([^,]+),([^)]+)\)$")?;
    let sine_re = Regex::new(r"^sine\(([^,]+),([^,]+),([^)]+)\)$")?;

    if let Some(caps) = csv_re.captures(spec) {
        Ok(SourceKind::Csv(caps[1].trim().into()))
    } else if let Some(caps) = trend_re.captures(spec) {
        Ok(SourceKind::Synthetic(SyntheticModel::Trend {
            slope: caps[1].trim().parse()?,
            noise: caps[2].trim().parse()?,
            base: caps[3].trim().parse()?,
        }))
    } else if let Some(caps) = ar1_re.captures(spec) {
        Ok(SourceKind::Synthetic(SyntheticModel::Ar1 {
            phi: caps[1].trim().parse()?,
            sigma: caps[2].trim().parse()?,
            base: caps[3].trim().parse()?,
        }))
    } else if let Some(caps) = sine_re.captures(spec) {
        Ok(SourceKind::Synthetic(SyntheticModel::Sine {
            period: caps[1].trim().parse()?,
            amplitude: caps[2].trim().parse()?,
            base: caps[3].trim().parse()?,
        }))
    } else if spec.ends_with(".csv") {
        Ok(SourceKind::Csv(spec.into()))
    } else {
        bail!("unknown source spec: {spec}");
    }
}

fn parse_month(s: &str) -> Result<NaiveDate> {
    let mut parts = s.splitn(2, '-');
    let year: i32 = parts
        .next()
        .unwrap_or("")
        .parse()
        .map_err(|_| anyhow!("bad month `{s}`, expected YYYY-MM"))?;
    let month: u32 = parts
        .next()
        .unwrap_or("")
        .parse()
        .map_err(|_| anyhow!("bad month `{s}`, expected YYYY-MM"))?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow!("bad month `{s}`, expected YYYY-MM"))?;
    Ok(month_end(first))
}
