use crate::engine::PressureTable;

/// Display-only regime band of a composite score.
///
/// Thresholds follow the dashboard convention; the engine itself only
/// ever produces the underlying numeric value.
pub fn regime_label(score: f64) -> &'static str {
    if score < 50.0 {
        "Watch (<50)"
    } else if score < 70.0 {
        "Rising (50-70)"
    } else if score < 85.0 {
        "Elevated (70-85)"
    } else {
        "Critical (>85)"
    }
}

fn fmt_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:>10.1}"),
        None => format!("{:>10}", "-"),
    }
}

/// Display a preview of the computed pressure table
pub fn display_pressure_table(table: &PressureTable) {
    if table.grid.is_empty() {
        println!("No data to display");
        return;
    }

    let width = 14 + 11 * (table.pillars.len() + 2);
    println!("\n{}", "=".repeat(width));
    println!("                 PRESSURE INDEX PREVIEW");
    println!("{}", "=".repeat(width));

    print!("{:<12}", "Month");
    for p in &table.pillars {
        let label = p.pillar.as_str();
        print!(" {:>10}", &label[..label.len().min(10)]);
    }
    println!(" {:>10} {:>10}", "composite", "smoothed");
    println!("{}", "-".repeat(width));

    let rows = table.grid.len();
    let head: Vec<usize> = (0..rows.min(10)).collect();
    let tail: Vec<usize> = if rows > 10 {
        (rows.saturating_sub(10)..rows).collect()
    } else {
        Vec::new()
    };

    for (label, indexes) in [("=== FIRST 10 ROWS ===", head), ("=== LAST 10 ROWS ===", tail)] {
        if indexes.is_empty() {
            continue;
        }
        println!("{label}");
        for t in indexes {
            print!("{:<12}", table.grid.dates()[t].format("%Y-%m"));
            for p in &table.pillars {
                print!(" {}", fmt_cell(p.values[t]));
            }
            println!(
                " {} {}",
                fmt_cell(table.composite[t]),
                fmt_cell(table.smoothed[t])
            );
        }
    }

    println!("{}", "=".repeat(width));
    println!("Total months: {}", rows);

    let defined = table.composite.iter().flatten().count();
    println!(
        "Composite coverage: {} of {} months ({:.1}%)",
        defined,
        rows,
        100.0 * defined as f64 / rows as f64
    );

    if let Some(latest) = table.smoothed.iter().rev().flatten().next() {
        println!("Latest smoothed composite: {:.1} - {}", latest, regime_label(*latest));
    } else if let Some(latest) = table.composite.iter().rev().flatten().next() {
        println!("Latest composite: {:.1} - {}", latest, regime_label(*latest));
    } else {
        println!("No composite values defined yet (insufficient history)");
    }
    println!("{}", "=".repeat(width));
}
