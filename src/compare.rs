//! Join the sample aggregates against the targets and compute
//! differences. This is the heart of Pipeline A.

use crate::error::{ReconError, Result};
use crate::{aggregate, report, sample, targets, varmap};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Comparison column order: identifiers, values, then provenance.
pub const COMPARISON_COLUMNS: [&str; 11] = [
    "common_stub",
    "incrange",
    "target_var",
    "sample_key",
    "target",
    "sample",
    "diff",
    "pdiff",
    "column_description",
    "table_description",
    "src",
];

/// Join targets and melted sample aggregates on (stub, target variable)
/// and compute `diff` and `pdiff`. Rows whose keys fail to match on
/// either side drop out of the join; that is a data-quality signal, not
/// an error, so it is only traced.
pub fn compare(target_table: &DataFrame, sample_long: &DataFrame) -> Result<DataFrame> {
    let crosswalk = varmap::crosswalk_frame()?.lazy();

    let mapped = sample_long
        .clone()
        .lazy()
        .join(
            crosswalk,
            [col("sample_key")],
            [col("sample_key")],
            JoinArgs::new(JoinType::Inner),
        )
        .rename(["value"], ["sample"]);

    let target_side = target_table
        .clone()
        .lazy()
        .rename(["variable", "value"], ["target_var", "target"]);

    let mut keep: Vec<Expr> = COMPARISON_COLUMNS.iter().map(|c| col(*c)).collect();
    keep.push(col("report_order"));

    let joined = target_side
        .join(
            mapped,
            [col("common_stub"), col("target_var")],
            [col("common_stub"), col("target_var")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_columns([(col("sample") - col("target")).alias("diff")])
        .with_columns([when(col("target").neq(lit(0.0)))
            .then(col("diff") / col("target") * lit(100.0))
            .otherwise(lit(NULL))
            .alias("pdiff")])
        .select(keep)
        .sort_by_exprs(
            vec![col("report_order"), col("common_stub")],
            SortMultipleOptions::default(),
        )
        .select(COMPARISON_COLUMNS.map(col))
        .collect()
        .map_err(|e| ReconError::Comparison(format!("Comparison join failed: {}", e)))?;

    let mapped_rows = sample_long.height();
    debug!(
        "Comparison kept {} of {} sample rows after crosswalk and target joins",
        joined.height(),
        mapped_rows
    );
    info!("Comparison table: {} rows", joined.height());
    Ok(joined)
}

/// Pipeline A end to end: load, classify, aggregate, compare, report.
pub fn run(targets_path: &Path, sample_path: &Path, out_path: &Path) -> Result<()> {
    let target_table = targets::with_derived_cgnet(targets::load(targets_path)?)?;
    let puf = sample::load(sample_path)?;
    let sub = sample::filers_subset(&puf)?;
    let sums = aggregate::weighted_sums(&sub)?;
    let long = aggregate::measure_long(&sums)?;
    let comparison = compare(&target_table, &long)?;
    let text = report::render(&comparison, sample_path)?;
    report::write(out_path, &text)?;
    info!("Wrote comparison report to {}", out_path.display());
    Ok(())
}
