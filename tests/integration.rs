use chrono::NaiveDate;
use tokio::sync::mpsc;

use pressure_index::config::{NormMethod, NormParams, SeriesConfig};
use pressure_index::sources::create_source;
use pressure_index::types::{
    month_end, EngineError, Pillar, RawSeries, SourceKind, SyntheticModel,
};
use pressure_index::{engine, Config};

fn d(y: i32, m: u32) -> NaiveDate {
    month_end(NaiveDate::from_ymd_opt(y, m, 1).unwrap())
}

fn sine_series(pillar: Pillar, name: &str, period: f64, base: f64) -> SeriesConfig {
    SeriesConfig {
        pillar,
        name: name.to_string(),
        source: SourceKind::Synthetic(SyntheticModel::Sine {
            period,
            amplitude: 10.0,
            base,
        }),
        weight: 1.0,
        params: NormParams {
            window: 12,
            ..NormParams::default()
        },
    }
}

/// Base test config builder: six deterministic synthetic pillars.
fn test_config() -> Config {
    let series = Pillar::ALL
        .iter()
        .enumerate()
        .map(|(i, p)| sine_series(*p, "model", 9.0 + i as f64, 40.0 + 10.0 * i as f64))
        .collect();
    Config {
        start: d(2015, 1),
        end: d(2024, 12),
        pillar_weights: vec![1.0; 6],
        smoothing_window: 6,
        series,
        out_format: "parquet".to_string(),
        output_dir: "/tmp/test_output".into(),
    }
}

/// Load every configured series through its source, as the binary does.
async fn collect(config: &Config) -> Vec<RawSeries> {
    let (tx, mut rx) = mpsc::channel(16);
    for sc in &config.series {
        let source = create_source(sc).unwrap();
        let config = config.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = source.fetch_series(&config, tx).await;
        });
    }
    drop(tx);

    let mut raw = Vec::new();
    while let Some(series) = rx.recv().await {
        raw.push(series);
    }
    raw
}

#[tokio::test]
async fn end_to_end_composite_is_bounded_and_covered() {
    let config = test_config();
    let raw = collect(&config).await;
    assert_eq!(raw.len(), 6);

    let table = engine::run(&config, &raw).unwrap();
    assert_eq!(table.grid.len(), 120);
    assert_eq!(table.pillars.len(), 6);

    for column in table.columns() {
        for v in column.iter().flatten() {
            assert!(v.is_finite());
        }
    }
    for v in table.composite.iter().flatten() {
        assert!(*v >= 0.0 && *v <= 100.0);
    }

    // Window 12 means the 13th observation is the first scored one.
    assert!(table.composite[..12].iter().all(|v| v.is_none()));
    assert!(table.composite[12].is_some());
    assert!(table.composite.last().unwrap().is_some());

    // Smoothing needs 6 trailing composite values on top of that.
    assert!(table.smoothed[..17].iter().all(|v| v.is_none()));
    assert!(table.smoothed[17].is_some());
}

#[tokio::test]
async fn rerun_on_identical_inputs_is_identical() {
    let config = test_config();
    let raw = collect(&config).await;

    let a = engine::run(&config, &raw).unwrap();
    let b = engine::run(&config, &raw).unwrap();

    assert_eq!(a.composite, b.composite);
    assert_eq!(a.smoothed, b.smoothed);
    for (x, y) in a.sub_pillars.iter().zip(&b.sub_pillars) {
        assert_eq!(x.values, y.values);
    }

    // Deterministic sources: a fresh collection reproduces the table too.
    let raw_again = collect(&config).await;
    let c = engine::run(&config, &raw_again).unwrap();
    assert_eq!(a.composite, c.composite);
}

#[tokio::test]
async fn all_zero_weights_are_rejected_before_any_processing() {
    let mut config = test_config();
    config.pillar_weights = vec![0.0; 6];
    let raw = collect(&test_config()).await;

    let err = engine::run(&config, &raw).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert!(err.to_string().contains("positive total"));
}

#[tokio::test]
async fn short_pillar_goes_missing_and_composite_survives() {
    let mut config = test_config();
    // Sentiment reports only through 2018; afterwards its pillar must be
    // missing while the composite keeps running on the remaining five.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sentiment.csv");
    let mut content = String::from("date,value\n");
    let mut date = d(2015, 1);
    let mut v = 1.0;
    while date <= d(2018, 12) {
        content.push_str(&format!("{date},{v}\n"));
        date = pressure_index::types::next_month_end(date);
        v += 0.5;
    }
    std::fs::write(&path, content).unwrap();
    config.series[5].source = SourceKind::Csv(path);

    let raw = collect(&config).await;
    let table = engine::run(&config, &raw).unwrap();

    let sentiment = table
        .pillars
        .iter()
        .find(|p| p.pillar == Pillar::Sentiment)
        .unwrap();
    let cutoff = table
        .grid
        .index_of(d(2018, 12))
        .expect("cutoff month on grid");
    assert!(sentiment.values[cutoff].is_some());
    assert!(sentiment.values[cutoff + 1..].iter().all(|v| v.is_none()));
    assert!(table.composite.last().unwrap().is_some());
}

#[tokio::test]
async fn lone_available_pillar_defines_the_composite_exactly() {
    // Only Market configured; every composite value must equal the pillar.
    let mut config = test_config();
    config.series.truncate(1);
    config.pillar_weights = vec![3.0, 1.0, 1.0, 1.0, 1.0, 1.0];

    let raw = collect(&config).await;
    let table = engine::run(&config, &raw).unwrap();

    assert_eq!(table.pillars.len(), 1);
    for (c, p) in table.composite.iter().zip(&table.pillars[0].values) {
        assert_eq!(c, p);
    }
}

#[tokio::test]
async fn csv_sources_flow_through_the_whole_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credit.csv");
    let mut content = String::from("date,value\n");
    let mut date = d(2020, 1);
    for i in 0..36 {
        // A drifting series with a gap in the middle.
        if i == 18 {
            content.push_str(&format!("{date},\n"));
        } else {
            content.push_str(&format!("{date},{}\n", 2.0 + (i as f64 * 0.7).sin()));
        }
        date = pressure_index::types::next_month_end(date);
    }
    std::fs::write(&path, content).unwrap();

    let config = Config {
        start: d(2020, 1),
        end: d(2022, 12),
        pillar_weights: vec![1.0; 6],
        smoothing_window: 3,
        series: vec![SeriesConfig {
            pillar: Pillar::Credit,
            name: "spread".to_string(),
            source: SourceKind::Csv(path),
            weight: 1.0,
            params: NormParams {
                window: 6,
                method: NormMethod::RollingZSigmoid,
                ..NormParams::default()
            },
        }],
        out_format: "csv".to_string(),
        output_dir: dir.path().to_path_buf(),
    };

    let raw = collect(&config).await;
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].points.len(), 35);

    let table = engine::run(&config, &raw).unwrap();
    // The gap month is missing in the normalized column.
    let gap = table.grid.index_of(d(2021, 7)).unwrap();
    assert!(table.sub_pillars[0].values[gap].is_none());
    for v in table.composite.iter().flatten() {
        assert!(*v >= 0.0 && *v <= 100.0);
    }

    let writer = pressure_index::output::OutputWriter::new();
    let out_path = writer.write_table(&config, &table).await.unwrap();
    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.starts_with("date,credit_spread,credit,composite,composite_smoothed"));
    assert_eq!(written.lines().count(), table.grid.len() + 1);
}

#[tokio::test]
async fn forward_fill_limit_bridges_reporting_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capex.csv");
    // Quarterly reporting: two missing months between observations.
    let mut content = String::from("date,value\n");
    let mut date = d(2019, 1);
    for i in 0..20 {
        content.push_str(&format!("{date},{}\n", 100.0 + i as f64));
        for _ in 0..3 {
            date = pressure_index::types::next_month_end(date);
        }
    }
    std::fs::write(&path, content).unwrap();

    let base = SeriesConfig {
        pillar: Pillar::Capex,
        name: "orders".to_string(),
        source: SourceKind::Csv(path),
        weight: 1.0,
        params: NormParams {
            window: 8,
            forward_fill_limit: Some(2),
            ..NormParams::default()
        },
    };
    let config = Config {
        start: d(2019, 1),
        end: d(2023, 12),
        pillar_weights: vec![1.0; 6],
        smoothing_window: 3,
        series: vec![base],
        out_format: "parquet".to_string(),
        output_dir: dir.path().to_path_buf(),
    };

    let raw = collect(&config).await;
    let table = engine::run(&config, &raw).unwrap();

    // With the gaps bridged, the tail of the column is fully defined.
    let tail = &table.sub_pillars[0].values[table.grid.len() - 12..];
    assert!(tail.iter().all(|v| v.is_some()));
}
