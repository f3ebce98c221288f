pub mod composite;
pub mod grid;
pub mod normalize;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{Config, NormMethod, SeriesConfig};
use crate::types::{EngineError, GridSeries, Pillar, RawSeries, PARALLEL_THRESHOLD};

use grid::TimeGrid;

/// One pillar's aggregate column.
#[derive(Debug, Clone)]
pub struct PillarColumn {
    pub pillar: Pillar,
    pub values: Vec<Option<f64>>,
}

/// The output table of one run: month-end index, normalized sub-pillar
/// columns, pillar aggregates, composite and its smoothed variant. Any
/// cell may be missing; consumers must treat missing distinctly from zero.
#[derive(Debug, Clone)]
pub struct PressureTable {
    pub grid: TimeGrid,
    pub sub_pillars: Vec<GridSeries>,
    pub pillars: Vec<PillarColumn>,
    pub composite: Vec<Option<f64>>,
    pub smoothed: Vec<Option<f64>>,
}

impl PressureTable {
    /// Column labels in output order (sub-pillars, pillars, composites).
    pub fn column_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .sub_pillars
            .iter()
            .map(|s| format!("{}_{}", s.pillar, s.name))
            .collect();
        labels.extend(self.pillars.iter().map(|p| p.pillar.to_string()));
        labels.push("composite".to_string());
        labels.push("composite_smoothed".to_string());
        labels
    }

    /// Columns in the same order as `column_labels`.
    pub fn columns(&self) -> Vec<&[Option<f64>]> {
        let mut cols: Vec<&[Option<f64>]> =
            self.sub_pillars.iter().map(|s| s.values.as_slice()).collect();
        cols.extend(self.pillars.iter().map(|p| p.values.as_slice()));
        cols.push(self.composite.as_slice());
        cols.push(self.smoothed.as_slice());
        cols
    }
}

/// Run the full batch transform: validate, align, normalize, aggregate,
/// smooth. Pure function of (raw inputs, configuration); recomputed from
/// scratch every run with no cross-run state.
pub fn run(config: &Config, raw: &[RawSeries]) -> Result<PressureTable, EngineError> {
    // Structural checks fail the run before any series is processed.
    config.validate()?;
    let weights = config.weight_config()?;

    for series in raw {
        grid::validate_raw(series)?;
    }

    // The grid runs from the configured start to the latest month any
    // input reaches. No inputs at all still yields a (fully missing) run.
    let end = raw
        .iter()
        .filter_map(|s| s.last_date())
        .max()
        .map(crate::types::month_end)
        .unwrap_or(config.start)
        .max(config.start);
    let grid = TimeGrid::span(config.start, end)?;
    info!(
        months = grid.len(),
        series = config.series.len(),
        "aligning series onto the monthly grid"
    );

    // Align each configured series; a source that delivered nothing in
    // range becomes an all-missing column rather than an error.
    let mut aligned: Vec<(&SeriesConfig, GridSeries)> = Vec::with_capacity(config.series.len());
    for sc in &config.series {
        let found = raw
            .iter()
            .find(|r| r.pillar == sc.pillar && r.name == sc.name);
        let series = match found {
            Some(r) => grid::align(r, &grid, sc.params.forward_fill_limit)?,
            None => {
                warn!(column = %sc.column(), "no raw data delivered; column is all-missing");
                GridSeries {
                    name: sc.name.clone(),
                    pillar: sc.pillar,
                    values: vec![None; grid.len()],
                }
            }
        };
        aligned.push((sc, series));
    }

    // Per-series normalization is independent; fan out when there is
    // enough work to be worth the pool.
    let normalize_one = |(sc, series): &(&SeriesConfig, GridSeries)| GridSeries {
        name: series.name.clone(),
        pillar: series.pillar,
        values: normalize::normalize(&series.values, &sc.params),
    };
    let sub_pillars: Vec<GridSeries> = if aligned.len() >= PARALLEL_THRESHOLD {
        aligned.par_iter().map(normalize_one).collect()
    } else {
        aligned.iter().map(normalize_one).collect()
    };

    // Pillar aggregates: weighted mean over the sub-series available per
    // date. Debug z-score series show up as columns but never feed the
    // composite.
    let mut pillars = Vec::new();
    for pillar in Pillar::ALL {
        let mut columns: Vec<&[Option<f64>]> = Vec::new();
        let mut sub_weights = Vec::new();
        for ((sc, _), normalized) in aligned.iter().zip(&sub_pillars) {
            if sc.pillar != pillar {
                continue;
            }
            if sc.params.method == NormMethod::Zscore {
                warn!(column = %sc.column(), "zscore series excluded from the composite");
                continue;
            }
            columns.push(normalized.values.as_slice());
            sub_weights.push(sc.weight);
        }
        if columns.is_empty() {
            continue;
        }
        pillars.push(PillarColumn {
            pillar,
            values: composite::aggregate_rows(&columns, &sub_weights, grid.len()),
        });
    }

    // Composite: configured weights restricted to the pillars available
    // on each date, renormalized locally. No lookahead anywhere above, so
    // each date depends only on its own trailing history.
    let mut composite_values = Vec::with_capacity(grid.len());
    let mut row = vec![None; Pillar::ALL.len()];
    for t in 0..grid.len() {
        for (slot, pillar) in row.iter_mut().zip(Pillar::ALL) {
            *slot = pillars
                .iter()
                .find(|c| c.pillar == pillar)
                .and_then(|c| c.values[t]);
        }
        composite_values.push(composite::weighted_mean_available(&row, weights.shares()));
    }

    let smoothed = composite::smooth(&composite_values, config.smoothing_window);

    let defined = composite_values.iter().flatten().count();
    info!(
        months = grid.len(),
        defined,
        pillars = pillars.len(),
        "composite computed"
    );

    Ok(PressureTable {
        grid,
        sub_pillars,
        pillars,
        composite: composite_values,
        smoothed,
    })
}
