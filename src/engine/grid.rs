use chrono::NaiveDate;

use crate::types::{month_end, next_month_end, EngineError, GridSeries, RawSeries};

/// The canonical monthly axis: month-end dates, ascending, no gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    dates: Vec<NaiveDate>,
}

impl TimeGrid {
    /// Build the grid covering `start..=end`, both snapped to month-end.
    pub fn span(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        let start = month_end(start);
        let end = month_end(end);
        if start > end {
            return Err(EngineError::Config(format!(
                "grid start {start} is after end {end}"
            )));
        }
        let mut dates = Vec::new();
        let mut current = start;
        while current <= end {
            dates.push(current);
            current = next_month_end(current);
        }
        Ok(Self { dates })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Grid position of a month-end date, if it lies on the axis.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}

/// Reject series the aligner cannot place: duplicate or out-of-order
/// month keys, non-finite values. Runs before any alignment.
pub fn validate_raw(series: &RawSeries) -> Result<(), EngineError> {
    for pair in series.points.windows(2) {
        if pair[1].date == pair[0].date {
            return Err(EngineError::MalformedInput {
                series: series.name.clone(),
                reason: format!("duplicate observation date {}", pair[0].date),
            });
        }
        if pair[1].date < pair[0].date {
            return Err(EngineError::MalformedInput {
                series: series.name.clone(),
                reason: format!(
                    "non-monotonic dates: {} followed by {}",
                    pair[0].date, pair[1].date
                ),
            });
        }
    }
    for p in &series.points {
        if !p.value.is_finite() {
            return Err(EngineError::MalformedInput {
                series: series.name.clone(),
                reason: format!("non-finite value at {}", p.date),
            });
        }
    }
    Ok(())
}

/// Reindex a raw series onto the grid by exact month-end match.
///
/// Observations outside the grid range are dropped; a series with no
/// observations in range aligns to all-missing, which downstream stages
/// must tolerate. With `forward_fill_limit`, the last known value is
/// carried over at most that many consecutive missing months; values are
/// never borrowed from another series.
pub fn align(
    series: &RawSeries,
    grid: &TimeGrid,
    forward_fill_limit: Option<usize>,
) -> Result<GridSeries, EngineError> {
    validate_raw(series)?;

    let mut values: Vec<Option<f64>> = vec![None; grid.len()];
    for p in &series.points {
        if let Some(idx) = grid.index_of(month_end(p.date)) {
            values[idx] = Some(p.value);
        }
    }

    if let Some(limit) = forward_fill_limit {
        forward_fill(&mut values, limit);
    }

    Ok(GridSeries {
        name: series.name.clone(),
        pillar: series.pillar,
        values,
    })
}

/// Carry the last observed value over runs of missing months, bounded by
/// `limit` months per run. Leading missing months stay missing.
fn forward_fill(values: &mut [Option<f64>], limit: usize) {
    let mut last: Option<f64> = None;
    let mut carried = 0usize;
    for slot in values.iter_mut() {
        match slot {
            Some(v) => {
                last = Some(*v);
                carried = 0;
            }
            None => {
                if let Some(v) = last {
                    if carried < limit {
                        *slot = Some(v);
                        carried += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Pillar, SeriesPoint};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn raw(points: Vec<(NaiveDate, f64)>) -> RawSeries {
        RawSeries::new(
            Pillar::Market,
            "semis",
            points
                .into_iter()
                .map(|(date, value)| SeriesPoint { date, value })
                .collect(),
        )
    }

    #[test]
    fn span_has_no_gaps_and_ascends() {
        let grid = TimeGrid::span(d(2023, 11, 5), d(2024, 2, 10)).unwrap();
        assert_eq!(
            grid.dates(),
            &[
                d(2023, 11, 30),
                d(2023, 12, 31),
                d(2024, 1, 31),
                d(2024, 2, 29),
            ]
        );
        for pair in grid.dates().windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn span_rejects_inverted_range() {
        assert!(TimeGrid::span(d(2024, 5, 1), d(2024, 1, 1)).is_err());
    }

    #[test]
    fn align_matches_month_ends_exactly() {
        let grid = TimeGrid::span(d(2024, 1, 1), d(2024, 4, 1)).unwrap();
        let s = raw(vec![(d(2024, 1, 31), 1.0), (d(2024, 3, 31), 3.0)]);
        let aligned = align(&s, &grid, None).unwrap();
        assert_eq!(aligned.values, vec![Some(1.0), None, Some(3.0), None]);
    }

    #[test]
    fn align_tolerates_series_outside_range() {
        let grid = TimeGrid::span(d(2024, 1, 1), d(2024, 3, 1)).unwrap();
        let s = raw(vec![(d(2010, 1, 31), 9.0)]);
        let aligned = align(&s, &grid, None).unwrap();
        assert!(aligned.values.iter().all(|v| v.is_none()));
    }

    #[test]
    fn align_rejects_duplicate_months() {
        let grid = TimeGrid::span(d(2024, 1, 1), d(2024, 3, 1)).unwrap();
        let s = raw(vec![(d(2024, 1, 31), 1.0), (d(2024, 1, 31), 2.0)]);
        let err = align(&s, &grid, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("semis"), "error should name the series: {msg}");
        assert!(msg.contains("duplicate"));
    }

    #[test]
    fn align_rejects_non_monotonic_dates() {
        let grid = TimeGrid::span(d(2024, 1, 1), d(2024, 3, 1)).unwrap();
        let s = raw(vec![(d(2024, 2, 29), 1.0), (d(2024, 1, 31), 2.0)]);
        assert!(matches!(
            align(&s, &grid, None),
            Err(EngineError::MalformedInput { .. })
        ));
    }

    #[test]
    fn forward_fill_is_bounded() {
        let mut values = vec![Some(1.0), None, None, None, Some(5.0), None];
        forward_fill(&mut values, 2);
        assert_eq!(
            values,
            vec![Some(1.0), Some(1.0), Some(1.0), None, Some(5.0), Some(5.0)]
        );
    }

    #[test]
    fn forward_fill_never_invents_leading_values() {
        let mut values = vec![None, None, Some(2.0)];
        forward_fill(&mut values, 3);
        assert_eq!(values, vec![None, None, Some(2.0)]);
    }
}
