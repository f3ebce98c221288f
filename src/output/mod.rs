use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use arrow::array::{ArrayRef, Date32Array, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use tracing::info;

use crate::config::Config;
use crate::engine::PressureTable;
use crate::types::round_to_6_sig_digits;

/// Writes the pressure table for the visualization/export collaborators.
///
/// Every score column is nullable: a missing month stays a null (parquet)
/// or an empty cell (csv), never a zero.
pub struct OutputWriter;

impl Default for OutputWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputWriter {
    pub fn new() -> Self {
        Self
    }

    pub async fn write_table(&self, config: &Config, table: &PressureTable) -> Result<PathBuf> {
        std::fs::create_dir_all(&config.output_dir)?;
        let filename = self.generate_filename(config, table);
        let path = config.output_dir.join(&filename);

        match config.out_format.as_str() {
            "csv" => self.write_csv(&path, table)?,
            _ => self.write_parquet(&path, table)?,
        }

        info!(path = %path.display(), rows = table.grid.len(), "wrote pressure table");
        Ok(path)
    }

    fn write_parquet(&self, path: &Path, table: &PressureTable) -> Result<()> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
        let days: Vec<i32> = table
            .grid
            .dates()
            .iter()
            .map(|d| (*d - epoch).num_days() as i32)
            .collect();

        let mut fields = vec![Field::new("date", DataType::Date32, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Date32Array::from(days))];
        for (label, column) in table.column_labels().into_iter().zip(table.columns()) {
            fields.push(Field::new(&label, DataType::Float64, true));
            arrays.push(Arc::new(Float64Array::from(column.to_vec())));
        }

        let schema = Schema::new(fields);
        let batch = RecordBatch::try_new(Arc::new(schema.clone()), arrays)?;

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, Arc::new(schema), None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    fn write_csv(&self, path: &Path, table: &PressureTable) -> Result<()> {
        let mut file = File::create(path)?;
        writeln!(file, "date,{}", table.column_labels().join(","))?;

        let columns = table.columns();
        for (t, date) in table.grid.dates().iter().enumerate() {
            write!(file, "{date}")?;
            for column in &columns {
                match column[t] {
                    Some(v) => write!(file, ",{}", round_to_6_sig_digits(v))?,
                    None => write!(file, ",")?,
                }
            }
            writeln!(file)?;
        }
        Ok(())
    }

    /// Filename from the run's shape:
    /// `pressure_<start>-<end>_<pillars>p_<smooth>m.<ext>`.
    fn generate_filename(&self, config: &Config, table: &PressureTable) -> String {
        let start = table
            .grid
            .dates()
            .first()
            .map(|d| d.format("%Y%m").to_string())
            .unwrap_or_else(|| "empty".to_string());
        let end = table
            .grid
            .dates()
            .last()
            .map(|d| d.format("%Y%m").to_string())
            .unwrap_or_else(|| "empty".to_string());
        let ext = if config.out_format == "csv" {
            "csv"
        } else {
            "parquet"
        };
        format!(
            "pressure_{start}-{end}_{}p_{}m.{ext}",
            table.pillars.len(),
            config.smoothing_window
        )
    }
}
