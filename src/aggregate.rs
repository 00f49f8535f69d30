//! Weighted aggregation of the filer subset: nonzero-record counts and
//! weighted sums by common stub and variable, with grand totals as stub 0.

use crate::error::{ReconError, Result};
use crate::sample::{ANALYSIS_VARS, WEIGHT_COLUMN};
use crate::stubs;
use polars::prelude::*;

/// Per stub × variable: `nnz` (weighted count of nonzero records) and
/// `wsum` (weighted sum). Stub 0 carries the grand totals; income-range
/// labels are joined on.
pub fn weighted_sums(sub: &DataFrame) -> Result<DataFrame> {
    let mut parts: Vec<LazyFrame> = Vec::with_capacity(ANALYSIS_VARS.len());
    for var in ANALYSIS_VARS {
        parts.push(sub.clone().lazy().select([
            col("common_stub"),
            lit(var).alias("variable"),
            when(col(var).neq(lit(0.0)))
                .then(col(WEIGHT_COLUMN))
                .otherwise(lit(0.0))
                .cast(DataType::Float64)
                .alias("nnz"),
            (col(var) * col(WEIGHT_COLUMN))
                .cast(DataType::Float64)
                .alias("wsum"),
        ]));
    }
    let long = concat(parts, UnionArgs::default())
        .map_err(|e| ReconError::Aggregation(format!("Failed to build long frame: {}", e)))?;

    let by_stub = long
        .group_by([col("common_stub"), col("variable")])
        .agg([col("nnz").sum(), col("wsum").sum()])
        .select([col("common_stub"), col("variable"), col("nnz"), col("wsum")]);

    let grand = by_stub
        .clone()
        .group_by([col("variable")])
        .agg([col("nnz").sum(), col("wsum").sum()])
        .with_columns([lit(0i64).cast(DataType::Int64).alias("common_stub")])
        .select([col("common_stub"), col("variable"), col("nnz"), col("wsum")]);

    let labels = stubs::stub_labels_frame()?.lazy();

    let sums = concat(vec![by_stub, grand], UnionArgs::default())
        .map_err(|e| ReconError::Aggregation(format!("Failed to append grand totals: {}", e)))?
        .join(
            labels,
            [col("common_stub")],
            [col("common_stub")],
            JoinArgs::new(JoinType::Left),
        )
        .select([
            col("common_stub"),
            col("incrange"),
            col("variable"),
            col("nnz"),
            col("wsum"),
        ])
        .sort_by_exprs(
            vec![col("variable"), col("common_stub")],
            SortMultipleOptions::default(),
        )
        .collect()
        .map_err(|e| ReconError::Aggregation(format!("Aggregation failed: {}", e)))?;

    Ok(sums)
}

/// Melt the two measures into one row per stub × variable × measure,
/// keyed by `<variable>_<measure>`.
pub fn measure_long(sums: &DataFrame) -> Result<DataFrame> {
    let mut parts: Vec<LazyFrame> = Vec::with_capacity(2);
    for measure in ["nnz", "wsum"] {
        parts.push(sums.clone().lazy().select([
            col("common_stub"),
            col("incrange"),
            col("variable"),
            lit(measure).alias("measure"),
            col(measure).alias("value"),
        ]));
    }
    let long = concat(parts, UnionArgs::default())
        .map_err(|e| ReconError::Aggregation(format!("Failed to melt measures: {}", e)))?
        .with_columns([concat_str([col("variable"), col("measure")], "_", true)
            .alias("sample_key")])
        .collect()
        .map_err(|e| ReconError::Aggregation(format!("Measure melt failed: {}", e)))?;
    Ok(long)
}
