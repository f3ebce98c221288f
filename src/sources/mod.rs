pub mod csv;
pub mod synthetic;

use crate::config::{Config, SeriesConfig};
use crate::types::{RawSeries, SourceKind};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// An input adapter producing one raw monthly series.
///
/// Sources own all I/O; the engine only ever sees fully-materialized
/// in-memory series. Each source loads independently and streams its
/// result to the collector channel.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn fetch_series(&self, config: &Config, tx: mpsc::Sender<RawSeries>) -> Result<()>;
}

pub fn create_source(series: &SeriesConfig) -> Result<Box<dyn SeriesSource>> {
    match &series.source {
        SourceKind::Csv(path) => Ok(Box::new(csv::CsvSource::new(
            series.pillar,
            &series.name,
            path.clone(),
        ))),
        SourceKind::Synthetic(model) => Ok(Box::new(synthetic::SyntheticSource::new(
            series.pillar,
            &series.name,
            model.clone(),
        ))),
    }
}
