//! Sample-file ingestion and derived columns.

use crate::error::{ReconError, Result};
use crate::filers;
use crate::stubs;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

pub const ID_COLUMN: &str = "pid";
pub const WEIGHT_COLUMN: &str = "s006";

/// Sample value columns carried into the aggregation, in report order.
pub const ANALYSIS_VARS: [&str; 12] = [
    "c00100", "e00200", "e00300", "e00600", "c01000", "e01500", "e02400", "c02500",
    // itemized deductions
    "c17000", "c18300", "c19200", "c19700",
];

/// Scan a sample file by extension (CSV or Parquet).
fn scan(path: &Path) -> Result<LazyFrame> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(1000))
            .finish()
            .map_err(|e| ReconError::Sample(format!("Failed to scan CSV {}: {}", path.display(), e))),
        "parquet" => LazyFrame::scan_parquet(path, ScanArgsParquet::default())
            .map_err(|e| ReconError::Sample(format!("Failed to scan {}: {}", path.display(), e))),
        other => Err(ReconError::Sample(format!(
            "Unsupported sample file extension '{}' for {}",
            other,
            path.display()
        ))),
    }
}

/// Load the sample file and derive `gross_income`, `filer`, and
/// `common_stub`.
pub fn load(path: &Path) -> Result<DataFrame> {
    let df = scan(path)?
        .with_columns([filers::gross_income_expr()])
        .with_columns([filers::filer_expr()])
        .with_columns([stubs::assign_common_stub("c00100")])
        .collect()
        .map_err(|e| ReconError::Sample(format!("Failed to load {}: {}", path.display(), e)))?;
    info!(
        "Loaded sample file {}: {} records",
        path.display(),
        df.height()
    );
    Ok(df)
}

/// Restrict to filers and the analysis column set.
pub fn filers_subset(df: &DataFrame) -> Result<DataFrame> {
    let mut keep: Vec<Expr> = vec![col(ID_COLUMN), col("common_stub"), col(WEIGHT_COLUMN)];
    keep.extend(ANALYSIS_VARS.iter().map(|v| col(*v)));
    let sub = df
        .clone()
        .lazy()
        .filter(col("filer"))
        .select(keep)
        .collect()?;
    info!(
        "Filer subset: {} of {} records classified as filers",
        sub.height(),
        df.height()
    );
    Ok(sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_vars_match_crosswalk_variables() {
        use crate::varmap::SAMPLE_TARGET_MAP;
        for (key, _) in SAMPLE_TARGET_MAP.iter() {
            let (var, _) = key.rsplit_once('_').unwrap();
            assert!(ANALYSIS_VARS.contains(&var), "crosswalk var {} missing", var);
        }
        assert_eq!(ANALYSIS_VARS.len() * 2, SAMPLE_TARGET_MAP.len());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = scan(Path::new("sample.h5")).err().unwrap();
        assert!(err.to_string().contains("h5"));
    }
}
