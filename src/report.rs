use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{CategoryCount, SellerMetrics, WeeklySeries};

pub fn build_report(
    generated_at: DateTime<Utc>,
    registrations: &WeeklySeries,
    categories: &[CategoryCount],
    conditions: &[CategoryCount],
    prices: &[CategoryCount],
    sellers: SellerMetrics,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Marketplace Admin Report");
    let _ = writeln!(
        output,
        "Generated {}",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## New Buyer Registrations (last {} weeks)",
        registrations.series.len()
    );

    for point in registrations.series.iter() {
        let _ = writeln!(output, "- week of {}: {}", point.label, point.value);
    }
    if !registrations.note.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "_{}_", registrations.note);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Product Categories");
    write_counts(&mut output, categories, "No products found.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Product Conditions");
    write_counts(&mut output, conditions, "No products found.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Price Distribution");
    write_counts(&mut output, prices, "No products found.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Seller Verification");
    if sellers.total == 0 {
        let _ = writeln!(output, "No sellers found.");
    } else {
        let _ = writeln!(
            output,
            "- {} of {} sellers verified ({} pending)",
            sellers.verified,
            sellers.total,
            sellers.total - sellers.verified
        );
    }

    output
}

fn write_counts(output: &mut String, counts: &[CategoryCount], empty_message: &str) {
    if counts.is_empty() {
        let _ = writeln!(output, "{empty_message}");
        return;
    }
    for count in counts {
        let _ = writeln!(output, "- {}: {}", count.name, count.value);
    }
}

pub fn write_series_csv(path: &Path, series: &WeeklySeries) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct CsvRow<'a> {
        week_of: &'a str,
        registrations: u64,
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {} for writing", path.display()))?;
    for point in series.series.iter() {
        writer.serialize(CsvRow {
            week_of: &point.label,
            registrations: point.value,
        })?;
    }
    writer.flush()?;
    Ok(())
}
