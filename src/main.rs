use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pressure_index::cli::Args;
use pressure_index::display::display_pressure_table;
use pressure_index::output::OutputWriter;
use pressure_index::sources::create_source;
use pressure_index::types::RawSeries;
use pressure_index::{engine, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize Rayon thread pool
    let num_threads = std::thread::available_parallelism()
        .map(|x| x.get())
        .unwrap_or(4)
        .max(4);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("rayon-worker-{}", i))
        .build_global()
        .expect("Failed to initialize Rayon thread pool");

    info!("Initialized Rayon thread pool with {} threads", num_threads);

    let args = Args::parse();
    let config = args.into_config()?;

    info!(
        series = config.series.len(),
        start = %config.start,
        "starting pressure index run"
    );
    info!("Output directory: {}", config.output_dir.display());

    let raw = collect_raw_series(&config).await?;
    if raw.iter().all(|s| s.points.is_empty()) {
        warn!("No observations delivered by any source");
    }

    let table = engine::run(&config, &raw)?;

    // Write output
    let output_writer = OutputWriter::new();
    let output_path = output_writer.write_table(&config, &table).await?;

    // Display head and tail of the computed table
    display_pressure_table(&table);

    info!("Pressure index run completed successfully!");
    if let Some(filename) = output_path.file_name() {
        info!("Generated: {}", filename.to_string_lossy());
    }

    Ok(())
}

/// Fan sources out on the runtime and collect their series. Each source
/// loads independently; a failed source is logged and its series simply
/// never arrives, leaving an all-missing column.
async fn collect_raw_series(config: &Config) -> Result<Vec<RawSeries>> {
    let (tx, mut rx) = mpsc::channel::<RawSeries>(16);

    let mut fetch_tasks = Vec::new();
    for series_config in &config.series {
        let source = create_source(series_config)?;
        let tx = tx.clone();
        let config = config.clone();
        let column = series_config.column();
        fetch_tasks.push(tokio::spawn(async move {
            if let Err(e) = source.fetch_series(&config, tx).await {
                error!(column = %column, "error loading series: {e:#}");
            }
        }));
    }

    // Drop the original sender so the receiver ends when all sources do
    drop(tx);

    let mut raw = Vec::new();
    while let Some(series) = rx.recv().await {
        raw.push(series);
    }

    for task in fetch_tasks {
        task.await?;
    }

    info!("Collected {} raw series", raw.len());
    Ok(raw)
}
