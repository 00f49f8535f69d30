//! Formatted text report for the comparison table: a stub-0 summary of
//! every variable, then per-variable detail over all stubs. Output is
//! deterministic byte-for-byte for a given comparison table.

use crate::error::{ReconError, Result};
use crate::varmap::SAMPLE_TARGET_MAP;
use polars::prelude::*;
use std::fs;
use std::path::Path;

const HEADERS: [&str; 8] = [
    "stub", "incrange", "target_var", "sample_key", "target", "sample", "diff", "pdiff",
];

/// Comma-grouped integer rendering of a value column entry.
pub fn fmt_count(v: Option<f64>) -> String {
    match v {
        None => "--".to_string(),
        Some(v) => {
            let rounded = v.round() as i128;
            let negative = rounded < 0;
            let digits = rounded.unsigned_abs().to_string();
            let mut grouped = String::new();
            for (i, ch) in digits.chars().enumerate() {
                if i > 0 && (digits.len() - i) % 3 == 0 {
                    grouped.push(',');
                }
                grouped.push(ch);
            }
            if negative {
                format!("-{}", grouped)
            } else {
                grouped
            }
        }
    }
}

/// Percent with one decimal; null (zero-target) prints as `--`.
pub fn fmt_pct(v: Option<f64>) -> String {
    match v {
        None => "--".to_string(),
        Some(v) => format!("{:.1}%", v),
    }
}

struct Row {
    cells: [String; 8],
    stub: i64,
    sample_key: String,
}

fn extract_rows(comp: &DataFrame) -> Result<Vec<Row>> {
    let stub = comp.column("common_stub")?.i64()?;
    let incrange = comp.column("incrange")?.str()?;
    let target_var = comp.column("target_var")?.str()?;
    let sample_key = comp.column("sample_key")?.str()?;
    let target = comp.column("target")?.f64()?;
    let sample = comp.column("sample")?.f64()?;
    let diff = comp.column("diff")?.f64()?;
    let pdiff = comp.column("pdiff")?.f64()?;

    let mut rows = Vec::with_capacity(comp.height());
    for i in 0..comp.height() {
        let s = stub.get(i).ok_or_else(|| {
            ReconError::Report(format!("Null stub in comparison row {}", i))
        })?;
        let key = sample_key.get(i).unwrap_or_default().to_string();
        rows.push(Row {
            cells: [
                s.to_string(),
                incrange.get(i).unwrap_or_default().to_string(),
                target_var.get(i).unwrap_or_default().to_string(),
                key.clone(),
                fmt_count(target.get(i)),
                fmt_count(sample.get(i)),
                fmt_count(diff.get(i)),
                fmt_pct(pdiff.get(i)),
            ],
            stub: s,
            sample_key: key,
        });
    }
    Ok(rows)
}

/// Render one aligned table over the selected rows. Text columns are
/// left-aligned, numeric columns right-aligned.
fn render_table(rows: &[&Row]) -> String {
    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.cells.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }
    let left_aligned = |i: usize| i == 1 || i == 2 || i == 3;

    let mut out = String::new();
    for (i, header) in HEADERS.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        if left_aligned(i) {
            out.push_str(&format!("{:<width$}", header, width = widths[i]));
        } else {
            out.push_str(&format!("{:>width$}", header, width = widths[i]));
        }
    }
    out.push('\n');
    for row in rows {
        for (i, cell) in row.cells.iter().enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            if left_aligned(i) {
                out.push_str(&format!("{:<width$}", cell, width = widths[i]));
            } else {
                out.push_str(&format!("{:>width$}", cell, width = widths[i]));
            }
        }
        out.push('\n');
    }
    out
}

/// Render the full report: header block, stub-0 summary, then one
/// section per variable in crosswalk order.
pub fn render(comp: &DataFrame, sample_path: &Path) -> Result<String> {
    let rows = extract_rows(comp)?;

    let mut out = String::new();
    out.push_str("Summary report:\n");
    out.push_str(&format!("  sample file: {}\n", sample_path.display()));
    out.push_str("  filers only, classified by filing-requirement and likely-filer rules\n\n");

    let summary: Vec<&Row> = rows.iter().filter(|r| r.stub == 0).collect();
    out.push_str(&render_table(&summary));

    out.push_str("\n\nDetails by AGI range:\n");
    for (key, _) in SAMPLE_TARGET_MAP.iter() {
        let section: Vec<&Row> = rows.iter().filter(|r| r.sample_key == *key).collect();
        if section.is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(&render_table(&section));
    }
    Ok(out)
}

pub fn write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_grouping() {
        assert_eq!(fmt_count(Some(0.0)), "0");
        assert_eq!(fmt_count(Some(999.0)), "999");
        assert_eq!(fmt_count(Some(1_000.0)), "1,000");
        assert_eq!(fmt_count(Some(1_234_567.4)), "1,234,567");
        assert_eq!(fmt_count(Some(-1_234_567.0)), "-1,234,567");
        assert_eq!(fmt_count(None), "--");
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(fmt_pct(Some(10.0)), "10.0%");
        assert_eq!(fmt_pct(Some(-5.04)), "-5.0%");
        assert_eq!(fmt_pct(None), "--");
    }

    #[test]
    fn report_has_summary_and_detail_sections() {
        let comp = DataFrame::new(vec![
            Series::new("common_stub", &[0i64, 1]),
            Series::new("incrange", &["All returns", "Under $5,000"]),
            Series::new("target_var", &["nret_all", "nret_all"]),
            Series::new("sample_key", &["c00100_nnz", "c00100_nnz"]),
            Series::new("target", &[100_000.0, 1_000.0]),
            Series::new("sample", &[110_000.0, 900.0]),
            Series::new("diff", &[10_000.0, -100.0]),
            Series::new("pdiff", &[10.0, -10.0]),
        ])
        .unwrap();
        let text = render(&comp, Path::new("puf2017.parquet")).unwrap();
        assert!(text.starts_with("Summary report:"));
        assert!(text.contains("puf2017.parquet"));
        assert!(text.contains("Details by AGI range:"));
        assert!(text.contains("110,000"));
        assert!(text.contains("Under $5,000"));
        assert!(text.contains("-10.0%"));
        // deterministic
        assert_eq!(text, render(&comp, Path::new("puf2017.parquet")).unwrap());
    }
}
