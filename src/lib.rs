pub mod cli;
pub mod config;
pub mod display;
pub mod engine;
pub mod output;
pub mod sources;
pub mod types;

// Re-exports for library users
pub use config::{Config, NormMethod, NormParams, SeriesConfig, WeightConfig};
pub use display::display_pressure_table;
pub use engine::{run, PillarColumn, PressureTable};
pub use sources::{create_source, SeriesSource};
pub use types::{
    month_end, normalize_weights, round_to_6_sig_digits, EngineError, GridSeries, Pillar,
    RawSeries, SeriesPoint, SourceKind, SyntheticModel, DEFAULT_CLIP, DEFAULT_SMOOTHING_WINDOW,
    DEFAULT_STEEPNESS, DEFAULT_WINDOW, PARALLEL_THRESHOLD,
};
