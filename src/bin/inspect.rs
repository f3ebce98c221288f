use arrow::array::{Array, Date32Array, Float64Array};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::env;
use std::fs::File;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <parquet_file>", args[0]);
        std::process::exit(1);
    }

    let filepath = &args[1];
    println!("\n{}", "=".repeat(120));
    println!("Inspecting: {}", filepath);
    println!("{}", "=".repeat(120));

    // Open parquet file
    let file = File::open(filepath)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut all_batches = Vec::new();
    let mut total_rows = 0;

    // Read all batches
    for batch_result in reader {
        let batch = batch_result?;
        total_rows += batch.num_rows();
        all_batches.push(batch);
    }

    println!("Total rows: {}", total_rows);

    if all_batches.is_empty() {
        println!("No data found!");
        return Ok(());
    }

    let schema = all_batches[0].schema();
    let labels: Vec<String> = schema
        .fields()
        .iter()
        .skip(1)
        .map(|f| f.name().clone())
        .collect();

    print!("{:<12}", "date");
    for label in &labels {
        print!(" {:>14}", &label[..label.len().min(14)]);
    }
    println!();

    let print_rows = |batch: &arrow::record_batch::RecordBatch, rows: std::ops::Range<usize>| {
        let dates = batch
            .column(0)
            .as_any()
            .downcast_ref::<Date32Array>()
            .expect("date column");
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
        for row in rows {
            let date = epoch + chrono::Days::new(dates.value(row) as u64);
            print!("{:<12}", date.format("%Y-%m").to_string());
            for col in 1..batch.num_columns() {
                let values = batch
                    .column(col)
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .expect("score column");
                if values.is_null(row) {
                    print!(" {:>14}", "-");
                } else {
                    print!(" {:>14.2}", values.value(row));
                }
            }
            println!();
        }
    };

    let first_batch = &all_batches[0];
    println!("=== FIRST 10 ROWS ===");
    print_rows(first_batch, 0..first_batch.num_rows().min(10));

    if total_rows > 10 {
        let last_batch = &all_batches[all_batches.len() - 1];
        let n = last_batch.num_rows();
        println!("=== LAST 10 ROWS ===");
        print_rows(last_batch, n.saturating_sub(10)..n);
    }

    println!("{}", "=".repeat(120));
    Ok(())
}
