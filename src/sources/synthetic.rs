use anyhow::Result;
use async_trait::async_trait;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::sources::SeriesSource;
use crate::types::{month_end, next_month_end, Pillar, RawSeries, SeriesPoint, SyntheticModel};

/// Generates a synthetic monthly series over the configured date range.
/// Stands in for an external fetcher in demos and tests.
pub struct SyntheticSource {
    pillar: Pillar,
    name: String,
    model: SyntheticModel,
}

impl SyntheticSource {
    pub fn new(pillar: Pillar, name: &str, model: SyntheticModel) -> Self {
        Self {
            pillar,
            name: name.to_string(),
            model,
        }
    }

    fn generate(&self, config: &Config) -> Vec<SeriesPoint> {
        let mut rng = StdRng::from_entropy();
        let normal = Normal::new(0.0, 1.0).expect("unit normal");

        let end = month_end(config.end);
        let mut date = month_end(config.start);
        let mut points = Vec::new();
        let mut t = 0usize;
        let mut deviation = 0.0;

        while date <= end {
            let value = match &self.model {
                SyntheticModel::Trend { slope, noise, base } => {
                    base + slope * t as f64 + noise * normal.sample(&mut rng)
                }
                SyntheticModel::Ar1 { phi, sigma, base } => {
                    deviation = phi * deviation + sigma * normal.sample(&mut rng);
                    base + deviation
                }
                SyntheticModel::Sine {
                    period,
                    amplitude,
                    base,
                } => base + amplitude * (2.0 * std::f64::consts::PI * t as f64 / period).sin(),
            };
            points.push(SeriesPoint { date, value });
            date = next_month_end(date);
            t += 1;
        }
        points
    }
}

#[async_trait]
impl SeriesSource for SyntheticSource {
    async fn fetch_series(&self, config: &Config, tx: mpsc::Sender<RawSeries>) -> Result<()> {
        let points = self.generate(config);
        info!(
            series = %self.name,
            model = ?self.model,
            observations = points.len(),
            "generated synthetic series"
        );
        tx.send(RawSeries::new(self.pillar, self.name.clone(), points))
            .await?;
        Ok(())
    }
}
