//! Target preparation (Pipeline B): ingest the raw table extracts,
//! normalize stubs, collapse duplicate sources, fix units and signs,
//! derive net variables, and save the clean long-format targets file.

use crate::error::{ReconError, Result};
use crate::stubs::{self, ITEMIZED_STUB_MAP, STANDARD_STUB_MAP};
use crate::tables::{self, EXEMPTION_SRC, PREFERRED_SRC};
use crate::targets::{CGNET_DESCRIPTION, TARGET_COLUMNS};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Conditional sum for widening a long frame inside a group_by.
fn sum_of(name: &'static str) -> Expr {
    when(col("variable").eq(lit(name)))
        .then(col("value"))
        .otherwise(lit(0.0))
        .sum()
        .alias(name)
}

/// Drop rows that carry no usable variable: unnamed spreadsheet columns
/// (short names equal to their extract column id) and rows without a
/// column description.
fn drop_unusable(all: LazyFrame) -> LazyFrame {
    let unnamed = col("variable")
        .str()
        .len_chars()
        .lt_eq(lit(2))
        .and(col("variable").eq(col("excel_column")));
    all.filter(
        unnamed
            .not()
            .and(col("column_description").is_not_null())
            .and(col("column_description").neq(lit(""))),
    )
}

/// Remap source stubs onto the common scheme. Itemized tables use the
/// finer 22-range map; everything else the standard 19-range map.
fn remap_stubs(all: LazyFrame) -> Result<LazyFrame> {
    let std_map = stubs::stub_map_frame(&STANDARD_STUB_MAP)?.lazy();
    let item_map = stubs::stub_map_frame(&ITEMIZED_STUB_MAP)?.lazy();

    let keep = [
        col("src"),
        col("common_stub"),
        col("variable"),
        col("value"),
        col("table_description"),
        col("column_description"),
        col("excel_column"),
    ];

    let standard = all
        .clone()
        .filter(col("itemized").not())
        .join(
            std_map,
            [col("src_stub")],
            [col("src_stub")],
            JoinArgs::new(JoinType::Inner),
        )
        .select(keep.clone());
    let itemized = all
        .filter(col("itemized"))
        .join(
            item_map,
            [col("src_stub")],
            [col("src_stub")],
            JoinArgs::new(JoinType::Inner),
        )
        .select(keep);

    concat(vec![standard, itemized], UnionArgs::default())
        .map_err(|e| ReconError::Build(format!("Stub remap failed: {}", e)))
}

/// Keep one source per variable: the preferred table for duplicated
/// variables, the marital-status table for the exemption amount.
fn drop_duplicate_sources(remapped: DataFrame) -> Result<DataFrame> {
    let dup_df = remapped
        .clone()
        .lazy()
        .group_by([col("variable")])
        .agg([col("src").n_unique().alias("n_src")])
        .filter(col("n_src").gt(lit(1)))
        .collect()?;
    let dupvars: Vec<String> = dup_df
        .column("variable")?
        .str()?
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect();
    if !dupvars.is_empty() {
        warn!(
            "Variables published in more than one table, keeping {}: {:?}",
            PREFERRED_SRC, dupvars
        );
    }

    let dup_series = Series::new("dupvars", dupvars);
    let is_dup = col("variable").is_in(lit(dup_series));
    let undup = remapped
        .lazy()
        .filter(
            is_dup
                .clone()
                .not()
                .or(is_dup.and(col("src").eq(lit(PREFERRED_SRC))))
                .or(col("variable")
                    .eq(lit("exemption"))
                    .and(col("src").eq(lit(EXEMPTION_SRC)))),
        )
        .collect()?;
    Ok(undup)
}

/// Collapse to one row per source × common stub × variable. Summing is
/// what merges the finer itemized stubs that share a common stub.
fn collapse(undup: DataFrame) -> Result<DataFrame> {
    let collapsed = undup
        .lazy()
        .group_by([
            col("src"),
            col("common_stub"),
            col("variable"),
            col("table_description"),
            col("column_description"),
            col("excel_column"),
        ])
        .agg([col("value").sum()])
        .join(
            stubs::stub_labels_frame()?.lazy(),
            [col("common_stub")],
            [col("common_stub")],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(collapsed)
}

/// Published dollar amounts are in thousands; counts (`nret_`/`n_`
/// prefixed) are not scaled. Loss amounts are published positive and
/// stored negative.
fn fix_units_and_signs(collapsed: DataFrame) -> Result<DataFrame> {
    let is_count = col("variable").str().contains(lit("nret_|n_"), true);
    let is_loss = col("variable")
        .str()
        .contains(lit("loss"), true)
        .and(col("variable").str().contains(lit("nret"), true).not());
    let fixed = collapsed
        .lazy()
        .with_columns([when(is_count)
            .then(col("value"))
            .otherwise(col("value") * lit(1000.0))
            .alias("value")])
        .with_columns([when(is_loss)
            .then(col("value") * lit(-1.0))
            .otherwise(col("value"))
            .alias("value")])
        .collect()?;
    Ok(fixed)
}

fn source_table(src: &str) -> Result<&'static tables::SourceTable> {
    tables::registry()
        .iter()
        .find(|t| t.src == src)
        .ok_or_else(|| ReconError::Build(format!("Source table {} missing from registry", src)))
}

/// Long rows for derived variables computed from a widened frame.
fn derived_long(
    wide: LazyFrame,
    src: &'static str,
    table_description: &'static str,
    vars: &[(&'static str, &'static str)],
) -> Result<LazyFrame> {
    let mut parts: Vec<LazyFrame> = Vec::with_capacity(vars.len());
    for (var, description) in vars.iter().copied() {
        parts.push(wide.clone().select([
            col("common_stub"),
            col("incrange"),
            lit(var).alias("variable"),
            col(var).alias("value"),
            lit(src).alias("src"),
            lit(table_description).alias("table_description"),
            lit(description).alias("column_description"),
            lit("calculated").alias("excel_column"),
        ]));
    }
    concat(parts, UnionArgs::default())
        .map_err(|e| ReconError::Build(format!("Derived melt failed: {}", e)))
}

/// Derived net-of-gross/loss variables, appended in long format.
///
/// Loss inputs are already negative at this point, so every net is a
/// plain sum.
pub fn derive_net_variables(clean: &DataFrame) -> Result<DataFrame> {
    let tab14a = source_table("17in14acg.xls")?;
    let cg_vars = Series::new(
        "cg_vars",
        &["cggross", "cgloss", "nret_cggross", "nret_cgloss"],
    );
    let cg_wide = clean
        .clone()
        .lazy()
        .filter(col("variable").is_in(lit(cg_vars)))
        .group_by([col("common_stub"), col("incrange")])
        .agg([
            sum_of("cggross"),
            sum_of("cgloss"),
            sum_of("nret_cggross"),
            sum_of("nret_cgloss"),
        ])
        .with_columns([
            (col("cggross") + col("cgloss")).alias("cgnet"),
            (col("nret_cggross") + col("nret_cgloss")).alias("nret_cgnet"),
        ]);
    let cg_rows = derived_long(
        cg_wide,
        tab14a.src,
        tab14a.description,
        &[
            ("cgnet", CGNET_DESCRIPTION),
            (
                "nret_cgnet",
                "Number of returns with net capital gains (calculated)",
            ),
        ],
    )?;

    let tab14 = source_table("17in14ar.xls")?;
    let sched_vars = Series::new(
        "sched_vars",
        &[
            "busprofnetinc",
            "busprofnetloss",
            "rentroyinc",
            "rentroyloss",
            "partnerscorpinc",
            "partnerscorploss",
            "estateinc",
            "estateloss",
        ],
    );
    let sched_wide = clean
        .clone()
        .lazy()
        .filter(col("variable").is_in(lit(sched_vars)))
        .group_by([col("common_stub"), col("incrange")])
        .agg([
            sum_of("busprofnetinc"),
            sum_of("busprofnetloss"),
            sum_of("rentroyinc"),
            sum_of("rentroyloss"),
            sum_of("partnerscorpinc"),
            sum_of("partnerscorploss"),
            sum_of("estateinc"),
            sum_of("estateloss"),
        ])
        .with_columns([
            (col("busprofnetinc") + col("busprofnetloss")).alias("busprofnet"),
            (col("partnerscorpinc") + col("partnerscorploss")).alias("partnerscorp"),
            (col("rentroyinc") + col("partnerscorpinc") + col("estateinc")).alias("e02000inc"),
            (col("rentroyloss") + col("partnerscorploss") + col("estateloss")).alias("e02000loss"),
        ])
        .with_columns([(col("e02000inc") + col("e02000loss")).alias("e02000")]);
    let sched_rows = derived_long(
        sched_wide,
        tab14.src,
        tab14.description,
        &[
            (
                "busprofnet",
                "Net income less loss: business or profession (calculated)",
            ),
            (
                "partnerscorp",
                "Net income less loss: partnerships and S corporations (calculated)",
            ),
            (
                "e02000inc",
                "Positive rent/royalty, partnership/S corporation, estate income (calculated)",
            ),
            (
                "e02000loss",
                "Loss rent/royalty, partnership/S corporation, estate income (calculated)",
            ),
            (
                "e02000",
                "Net rent/royalty, partnership/S corporation, estate income (calculated)",
            ),
        ],
    )?;

    let derived = concat(vec![cg_rows, sched_rows], UnionArgs::default())
        .map_err(|e| ReconError::Build(format!("Derived concat failed: {}", e)))?
        .collect()
        .map_err(|e| ReconError::Build(format!("Derived variables failed: {}", e)))?;
    Ok(derived)
}

/// Everything after ingestion: drop unusable rows, remap stubs, keep one
/// source per variable, collapse, fix units and signs, derive nets.
pub fn prepare(all: LazyFrame) -> Result<DataFrame> {
    let remapped = remap_stubs(drop_unusable(all))?
        .collect()
        .map_err(|e| ReconError::Build(format!("Ingest collect failed: {}", e)))?;
    let undup = drop_duplicate_sources(remapped)?;
    let clean = fix_units_and_signs(collapse(undup)?)?;
    let derived = derive_net_variables(&clean)?;

    let ordered = clean
        .lazy()
        .select(TARGET_COLUMNS.map(col))
        .collect()?;
    let out = ordered
        .vstack(&derived)?
        .lazy()
        .sort_by_exprs(
            vec![col("variable"), col("common_stub")],
            SortMultipleOptions::default(),
        )
        .collect()?;
    Ok(out)
}

/// Build the clean targets table from the raw extracts in `raw_dir`.
pub fn build_targets(raw_dir: &Path) -> Result<DataFrame> {
    let mut parts: Vec<LazyFrame> = Vec::with_capacity(tables::registry().len());
    for table in tables::registry() {
        parts.push(tables::ingest(table, raw_dir)?);
    }
    let all = concat(parts, UnionArgs::default())
        .map_err(|e| ReconError::Build(format!("Ingest concat failed: {}", e)))?;
    let out = prepare(all)?;
    info!("Built targets table: {} rows", out.height());
    Ok(out)
}

pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)
        .map_err(|e| ReconError::Build(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(())
}

/// Pipeline B end to end.
pub fn run(raw_dir: &Path, out_path: &Path) -> Result<()> {
    let mut df = build_targets(raw_dir)?;
    write_csv(&mut df, out_path)?;
    info!("Wrote clean targets to {}", out_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal ingested long frame: two sources publishing nret_all and
    /// agi, one itemized-table variable, on synthetic stubs.
    fn ingested() -> LazyFrame {
        let n = 8usize;
        DataFrame::new(vec![
            Series::new(
                "src",
                &[
                    "17in11si.xls",
                    "17in11si.xls",
                    "17in11si.xls",
                    "17in16ag.xls",
                    "17in11si.xls",
                    "17in11si.xls",
                    "17in21id.xls",
                    "17in21id.xls",
                ],
            ),
            Series::new("src_stub", &[0i64, 1, 2, 0, 1, 2, 7, 8]),
            Series::new("incrange", vec!["x"; n]),
            Series::new(
                "variable",
                &[
                    "nret_all",
                    "nret_all",
                    "nret_all",
                    "nret_all",
                    "agi",
                    "agi",
                    "id_taxpaid",
                    "id_taxpaid",
                ],
            ),
            Series::new("value", &[100.0, 40.0, 60.0, 100.0, 500.0, 700.0, 10.0, 20.0]),
            Series::new("table_description", vec!["t"; n]),
            Series::new(
                "column_description",
                &["c", "c", "c", "c", "c", "c", "c", "c"],
            ),
            Series::new("excel_column", vec!["B"; n]),
            Series::new(
                "itemized",
                &[false, false, false, false, false, false, true, true],
            ),
        ])
        .unwrap()
        .lazy()
    }

    fn value_of(df: &DataFrame, var: &str, stub: i64) -> Option<f64> {
        let row = df
            .clone()
            .lazy()
            .filter(
                col("variable")
                    .eq(lit(var))
                    .and(col("common_stub").eq(lit(stub))),
            )
            .collect()
            .unwrap();
        if row.height() == 0 {
            return None;
        }
        row.column("value").unwrap().f64().unwrap().get(0)
    }

    #[test]
    fn duplicate_sources_keep_the_preferred_table() {
        let out = prepare(ingested()).unwrap();
        // nret_all appears in two sources; only the preferred survives
        let srcs = out
            .clone()
            .lazy()
            .filter(col("variable").eq(lit("nret_all")))
            .collect()
            .unwrap();
        let kept: Vec<&str> = srcs
            .column("src")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(!kept.is_empty());
        assert!(kept.iter().all(|s| *s == PREFERRED_SRC));
    }

    #[test]
    fn standard_stubs_collapse_one_and_two() {
        let out = prepare(ingested()).unwrap();
        // source stubs 1 and 2 both land in common stub 1 and sum
        assert_eq!(value_of(&out, "nret_all", 1), Some(100.0));
        assert_eq!(value_of(&out, "nret_all", 0), Some(100.0));
    }

    #[test]
    fn itemized_stubs_use_the_finer_map() {
        let out = prepare(ingested()).unwrap();
        // itemized source stubs 7 and 8 both map to common stub 7,
        // and dollar amounts scale from thousands
        assert_eq!(value_of(&out, "id_taxpaid", 7), Some(30_000.0));
    }

    #[test]
    fn dollar_amounts_scale_but_counts_do_not() {
        let out = prepare(ingested()).unwrap();
        assert_eq!(value_of(&out, "agi", 1), Some(1_200_000.0));
        assert_eq!(value_of(&out, "nret_all", 1), Some(100.0));
    }

    #[test]
    fn losses_turn_negative_and_nets_derive() {
        let n = 4usize;
        let lf = DataFrame::new(vec![
            Series::new("src", vec!["17in14acg.xls"; n]),
            Series::new("src_stub", &[0i64, 0, 1, 1]),
            Series::new("incrange", vec!["x"; n]),
            Series::new(
                "variable",
                &["cggross", "cgloss", "nret_cggross", "nret_cgloss"],
            ),
            Series::new("value", &[900.0, 100.0, 12.0, 3.0]),
            Series::new("table_description", vec!["t"; n]),
            Series::new("column_description", vec!["c"; n]),
            Series::new("excel_column", &["B", "C", "D", "E"]),
            Series::new("itemized", vec![false; n]),
        ])
        .unwrap()
        .lazy();
        let out = prepare(lf).unwrap();
        // published positive loss stored negative, scaled by 1000
        assert_eq!(value_of(&out, "cgloss", 0), Some(-100_000.0));
        // net = gross + negative loss
        assert_eq!(value_of(&out, "cgnet", 0), Some(800_000.0));
        // counts unscaled, net count is the sum of both counts
        assert_eq!(value_of(&out, "nret_cgnet", 1), Some(15.0));
    }
}
