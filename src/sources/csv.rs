use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::sources::SeriesSource;
use crate::types::{month_end, Pillar, RawSeries, SeriesPoint};

/// Reads a `(date,value)` CSV written by an external fetcher.
///
/// Dates snap to month-end. Duplicate or backwards months are rejected
/// here, naming the series, before the engine ever sees them. Empty and
/// `nan` value cells are missing observations, not zeros.
pub struct CsvSource {
    pillar: Pillar,
    name: String,
    path: PathBuf,
}

impl CsvSource {
    pub fn new(pillar: Pillar, name: &str, path: PathBuf) -> Self {
        Self {
            pillar,
            name: name.to_string(),
            path,
        }
    }

    fn parse_rows(&self, content: &str) -> Result<Vec<SeriesPoint>> {
        let mut points: Vec<SeriesPoint> = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(2, ',');
            let date_field = fields.next().unwrap_or("").trim();
            let value_field = fields.next().map(str::trim).unwrap_or("");

            let date = match NaiveDate::parse_from_str(date_field, "%Y-%m-%d") {
                Ok(d) => d,
                // First line may be a header row.
                Err(_) if lineno == 0 => continue,
                Err(e) => bail!(
                    "series `{}`: line {}: bad date `{}`: {}",
                    self.name,
                    lineno + 1,
                    date_field,
                    e
                ),
            };

            if value_field.is_empty() || value_field.eq_ignore_ascii_case("nan") {
                continue;
            }
            let value: f64 = value_field.parse().with_context(|| {
                format!(
                    "series `{}`: line {}: bad value `{}`",
                    self.name,
                    lineno + 1,
                    value_field
                )
            })?;

            let date = month_end(date);
            if let Some(prev) = points.last() {
                if date == prev.date {
                    bail!("series `{}`: duplicate month {}", self.name, date);
                }
                if date < prev.date {
                    bail!(
                        "series `{}`: non-monotonic dates ({} after {})",
                        self.name,
                        date,
                        prev.date
                    );
                }
            }
            points.push(SeriesPoint { date, value });
        }
        Ok(points)
    }
}

#[async_trait]
impl SeriesSource for CsvSource {
    async fn fetch_series(&self, _config: &Config, tx: mpsc::Sender<RawSeries>) -> Result<()> {
        let points = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => self.parse_rows(&content)?,
            Err(e) => {
                // A fetcher that produced no file is an all-missing
                // series, not a failed run.
                warn!(
                    series = %self.name,
                    path = %self.path.display(),
                    error = %e,
                    "input file unavailable; series will be all-missing"
                );
                Vec::new()
            }
        };

        info!(
            series = %self.name,
            path = %self.path.display(),
            observations = points.len(),
            "loaded csv series"
        );
        tx.send(RawSeries::new(self.pillar, self.name.clone(), points))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> CsvSource {
        CsvSource::new(Pillar::Credit, "spread", "/nonexistent.csv".into())
    }

    #[test]
    fn parses_rows_and_snaps_to_month_end() {
        let rows = source()
            .parse_rows("date,value\n2024-01-15,1.5\n2024-02-03,2.5\n")
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(rows[0].value, 1.5);
    }

    #[test]
    fn empty_and_nan_cells_are_missing() {
        let rows = source()
            .parse_rows("2024-01-31,1.0\n2024-02-29,\n2024-03-31,NaN\n2024-04-30,4.0\n")
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].value, 4.0);
    }

    #[test]
    fn duplicate_month_is_rejected_by_name() {
        let err = source()
            .parse_rows("2024-01-31,1.0\n2024-01-15,2.0\n")
            .unwrap_err();
        assert!(err.to_string().contains("spread"));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn backwards_dates_are_rejected() {
        let err = source()
            .parse_rows("2024-03-31,1.0\n2024-01-31,2.0\n")
            .unwrap_err();
        assert!(err.to_string().contains("non-monotonic"));
    }

    #[test]
    fn bad_value_is_an_error_not_a_zero() {
        let err = source().parse_rows("2024-01-31,abc\n").unwrap_err();
        assert!(format!("{err:#}").contains("bad value"));
    }
}
