//! Clean-targets table: load for comparison, deriving net capital gains
//! when the file predates the build pipeline's derived variables.

use crate::error::{ReconError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Column order of the clean long-format targets file.
pub const TARGET_COLUMNS: [&str; 8] = [
    "common_stub",
    "incrange",
    "variable",
    "value",
    "src",
    "table_description",
    "column_description",
    "excel_column",
];

pub const CGNET_DESCRIPTION: &str = "Net capital gains less loss (calculated)";
pub const NRET_CGNET_DESCRIPTION: &str =
    "Number of returns with net capital gains ASSUMED equal to returns with gains";

pub fn load(path: &Path) -> Result<DataFrame> {
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(1000))
        .finish()
        .map_err(|e| ReconError::Targets(format!("Failed to scan {}: {}", path.display(), e)))?
        .with_columns([
            col("common_stub").cast(DataType::Int64),
            col("value").cast(DataType::Float64),
        ])
        .collect()
        .map_err(|e| ReconError::Targets(format!("Failed to load {}: {}", path.display(), e)))?;
    info!("Loaded targets {}: {} rows", path.display(), df.height());
    Ok(df)
}

fn has_variable(df: &DataFrame, name: &str) -> Result<bool> {
    let vars = df.column("variable")?.str()?;
    Ok(vars.into_iter().flatten().any(|v| v == name))
}

/// Append derived `cgnet` / `nret_cgnet` rows when absent.
///
/// Losses are stored negative in the clean file, so the net is
/// `cggross + cgloss`; the return count is assumed equal to the count of
/// returns with gains, as the published tables give no net-gain count.
pub fn with_derived_cgnet(df: DataFrame) -> Result<DataFrame> {
    if has_variable(&df, "cgnet")? {
        return Ok(df);
    }
    info!("Targets file lacks cgnet; deriving from cggross and cgloss");

    let cg_vars = Series::new("cg_vars", &["cggross", "cgloss", "nret_cggross"]);
    let sum_of = |name: &'static str| {
        when(col("variable").eq(lit(name)))
            .then(col("value"))
            .otherwise(lit(0.0))
            .sum()
            .alias(name)
    };
    let wide = df
        .clone()
        .lazy()
        .filter(col("variable").is_in(lit(cg_vars)))
        .group_by([
            col("src"),
            col("common_stub"),
            col("incrange"),
            col("table_description"),
        ])
        .agg([sum_of("cggross"), sum_of("cgloss"), sum_of("nret_cggross")])
        .with_columns([
            (col("cggross") + col("cgloss")).alias("cgnet"),
            col("nret_cggross").alias("nret_cgnet"),
        ]);

    let mut parts: Vec<LazyFrame> = Vec::with_capacity(2);
    for (var, description) in [
        ("cgnet", CGNET_DESCRIPTION),
        ("nret_cgnet", NRET_CGNET_DESCRIPTION),
    ] {
        parts.push(wide.clone().select([
            col("common_stub"),
            col("incrange"),
            lit(var).alias("variable"),
            col(var).alias("value"),
            col("src"),
            col("table_description"),
            lit(description).alias("column_description"),
            lit("calculated").alias("excel_column"),
        ]));
    }
    let derived = concat(parts, UnionArgs::default())
        .map_err(|e| ReconError::Targets(format!("Failed to derive cgnet: {}", e)))?
        .collect()
        .map_err(|e| ReconError::Targets(format!("Failed to derive cgnet: {}", e)))?;

    let ordered = df
        .lazy()
        .select(TARGET_COLUMNS.map(col))
        .collect()?;
    let out = ordered.vstack(&derived)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets_without_cgnet() -> DataFrame {
        DataFrame::new(vec![
            Series::new("common_stub", &[0i64, 0, 0]),
            Series::new("incrange", &["All returns", "All returns", "All returns"]),
            Series::new("variable", &["cggross", "cgloss", "nret_cggross"]),
            Series::new("value", &[900_000.0, -100_000.0, 12_000.0]),
            Series::new("src", &["17in14acg.xls", "17in14acg.xls", "17in14acg.xls"]),
            Series::new(
                "table_description",
                &["Table 1.4A", "Table 1.4A", "Table 1.4A"],
            ),
            Series::new("column_description", &["gross", "loss", "nret gross"]),
            Series::new("excel_column", &["B", "C", "A"]),
        ])
        .unwrap()
    }

    #[test]
    fn derives_net_from_gross_plus_negative_loss() {
        let out = with_derived_cgnet(targets_without_cgnet()).unwrap();
        let net = out
            .clone()
            .lazy()
            .filter(col("variable").eq(lit("cgnet")))
            .collect()
            .unwrap();
        assert_eq!(net.height(), 1);
        assert_eq!(
            net.column("value").unwrap().f64().unwrap().get(0).unwrap(),
            800_000.0
        );
        let nret = out
            .lazy()
            .filter(col("variable").eq(lit("nret_cgnet")))
            .collect()
            .unwrap();
        assert_eq!(
            nret.column("value").unwrap().f64().unwrap().get(0).unwrap(),
            12_000.0
        );
    }

    #[test]
    fn leaves_file_alone_when_cgnet_present() {
        let df = targets_without_cgnet();
        let with_net = with_derived_cgnet(df).unwrap();
        let again = with_derived_cgnet(with_net.clone()).unwrap();
        assert_eq!(again.height(), with_net.height());
    }
}
