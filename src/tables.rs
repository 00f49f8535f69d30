//! Static registry of the published 2017 source tables and ingestion of
//! their raw extracts.
//!
//! Raw extracts are pre-cut per-table CSVs (one per published file)
//! whose header row is `incrange` followed by the registry's variable
//! names. Row order carries the source stub numbering: row 0 is the
//! table's "All returns" total, the remaining rows its income ranges.

use crate::error::{ReconError, Result};
use lazy_static::lazy_static;
use polars::prelude::*;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct TableColumn {
    pub excel_column: &'static str,
    pub variable: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceTable {
    /// Published file name, e.g. `17in11si.xls`.
    pub src: &'static str,
    pub description: &'static str,
    /// True for tables on the finer itemized-deduction stub scheme.
    pub itemized: bool,
    pub columns: &'static [TableColumn],
}

const fn column(
    excel_column: &'static str,
    variable: &'static str,
    description: &'static str,
) -> TableColumn {
    TableColumn {
        excel_column,
        variable,
        description,
    }
}

static TAB11_COLUMNS: &[TableColumn] = &[
    column("B", "nret_all", "Number of returns, total"),
    column("D", "agi", "Adjusted gross income less deficit"),
    column("K", "nret_ti", "Number of returns with taxable income"),
    column("L", "ti", "Taxable income"),
];

static TAB12_COLUMNS: &[TableColumn] = &[
    column("B", "nret_all", "Number of returns, total"),
    column("C", "agi", "Adjusted gross income less deficit"),
    column(
        "D",
        "nret_mfjss",
        "Number of joint returns and returns of surviving spouses",
    ),
    column("F", "nret_single", "Number of returns of single persons"),
    column("H", "exemption", "Exemption amount"),
];

static TAB14_COLUMNS: &[TableColumn] = &[
    column("B", "agi", "Adjusted gross income less deficit"),
    column("C", "nret_wages", "Number of returns with salaries and wages"),
    column("D", "wages", "Salaries and wages amount"),
    column("E", "nret_taxint", "Number of returns with taxable interest"),
    column("F", "taxint", "Taxable interest amount"),
    column("G", "nret_orddiv", "Number of returns with ordinary dividends"),
    column("H", "orddiv", "Ordinary dividends amount"),
    column("I", "nret_pensions", "Number of returns with pensions and annuities"),
    column("J", "pensions", "Pensions and annuities amount"),
    column(
        "K",
        "nret_socsectot",
        "Number of returns with total social security benefits",
    ),
    column("L", "socsectot", "Total social security benefits amount"),
    column(
        "M",
        "nret_socsectaxable",
        "Number of returns with taxable social security benefits",
    ),
    column("N", "socsectaxable", "Taxable social security benefits amount"),
    column(
        "O",
        "nret_busprofnetinc",
        "Number of returns with business or profession net income",
    ),
    column("P", "busprofnetinc", "Business or profession net income amount"),
    column(
        "Q",
        "nret_busprofnetloss",
        "Number of returns with business or profession net loss",
    ),
    column("R", "busprofnetloss", "Business or profession net loss amount"),
    column("S", "nret_rentroyinc", "Number of returns with rent and royalty net income"),
    column("T", "rentroyinc", "Rent and royalty net income amount"),
    column("U", "nret_rentroyloss", "Number of returns with rent and royalty net loss"),
    column("V", "rentroyloss", "Rent and royalty net loss amount"),
    column(
        "W",
        "nret_partnerscorpinc",
        "Number of returns with partnership and S corporation net income",
    ),
    column("X", "partnerscorpinc", "Partnership and S corporation net income amount"),
    column(
        "Y",
        "nret_partnerscorploss",
        "Number of returns with partnership and S corporation net loss",
    ),
    column("Z", "partnerscorploss", "Partnership and S corporation net loss amount"),
    column("AA", "nret_estateinc", "Number of returns with estate and trust net income"),
    column("AB", "estateinc", "Estate and trust net income amount"),
    column("AC", "nret_estateloss", "Number of returns with estate and trust net loss"),
    column("AD", "estateloss", "Estate and trust net loss amount"),
];

static TAB14A_COLUMNS: &[TableColumn] = &[
    column("B", "nret_cggross", "Number of returns with net capital gains"),
    column("C", "cggross", "Net capital gains amount"),
    column("D", "nret_cgloss", "Number of returns with net capital loss"),
    column("E", "cgloss", "Net capital loss amount"),
];

static TAB16_COLUMNS: &[TableColumn] = &[column(
    "B",
    "nret_all",
    "Number of returns, total, all marital statuses and ages",
)];

static TAB21_COLUMNS: &[TableColumn] = &[
    column(
        "B",
        "nret_id_medical_capped",
        "Number of returns with medical and dental expenses deduction",
    ),
    column("C", "id_medical_capped", "Medical and dental expenses deduction amount"),
    column("D", "nret_id_taxpaid", "Number of returns with taxes paid deduction"),
    column("E", "id_taxpaid", "Taxes paid deduction amount"),
    column("F", "nret_id_intpaid", "Number of returns with interest paid deduction"),
    column("G", "id_intpaid", "Interest paid deduction amount"),
    column(
        "H",
        "nret_id_mortgage",
        "Number of returns with home mortgage interest deduction",
    ),
    column("I", "id_mortgage", "Home mortgage interest deduction amount"),
    column(
        "J",
        "nret_id_contributions",
        "Number of returns with charitable contributions deduction",
    ),
    column("K", "id_contributions", "Charitable contributions deduction amount"),
];

static TAB25_COLUMNS: &[TableColumn] = &[
    column("B", "nret_eitc", "Number of returns with earned income credit"),
    column("C", "eitc", "Earned income credit amount"),
];

static TAB32_COLUMNS: &[TableColumn] = &[
    column("B", "nret_taxtot", "Number of returns with total income tax"),
    column("C", "taxtot", "Total income tax amount"),
];

lazy_static! {
    /// The eight 2017 source tables, in publication order.
    pub static ref REGISTRY: Vec<SourceTable> = vec![
        SourceTable {
            src: "17in11si.xls",
            description: "Table 1.1--Selected Income and Tax Items, by Size and Accumulated Size of Adjusted Gross Income",
            itemized: false,
            columns: TAB11_COLUMNS,
        },
        SourceTable {
            src: "17in12ms.xls",
            description: "Table 1.2--Adjusted Gross Income, Exemptions, Deductions, and Tax Items, by Size of Adjusted Gross Income and Marital Status",
            itemized: false,
            columns: TAB12_COLUMNS,
        },
        SourceTable {
            src: "17in14ar.xls",
            description: "Table 1.4--Sources of Income, Adjustments, Deductions and Exemptions, and Tax Items, by Size of Adjusted Gross Income",
            itemized: false,
            columns: TAB14_COLUMNS,
        },
        SourceTable {
            src: "17in14acg.xls",
            description: "Table 1.4A--Returns with Income or Loss from Sales of Capital Assets, by Size of Adjusted Gross Income",
            itemized: false,
            columns: TAB14A_COLUMNS,
        },
        SourceTable {
            src: "17in16ag.xls",
            description: "Table 1.6--Number of Returns, by Size of Adjusted Gross Income, Marital Status, and Age of Taxpayer",
            itemized: false,
            columns: TAB16_COLUMNS,
        },
        SourceTable {
            src: "17in21id.xls",
            description: "Table 2.1--Returns with Itemized Deductions: Sources of Income, Adjustments, Itemized Deductions by Type, Exemptions, and Tax Items, by Size of Adjusted Gross Income",
            itemized: true,
            columns: TAB21_COLUMNS,
        },
        SourceTable {
            src: "17in25ic.xls",
            description: "Table 2.5--Returns with Earned Income Credit, by Size of Adjusted Gross Income",
            itemized: false,
            columns: TAB25_COLUMNS,
        },
        SourceTable {
            src: "17in32tt.xls",
            description: "Table 3.2--Returns with Total Income Tax: Total Income Tax as a Percentage of Adjusted Gross Income",
            itemized: false,
            columns: TAB32_COLUMNS,
        },
    ];
}

/// Preferred source when a variable is published in more than one table.
pub const PREFERRED_SRC: &str = "17in11si.xls";
/// The exemption amount keeps the marital-status table instead.
pub const EXEMPTION_SRC: &str = "17in12ms.xls";

pub fn registry() -> &'static [SourceTable] {
    &REGISTRY
}

pub fn registry_json() -> Result<String> {
    Ok(serde_json::to_string_pretty(&*REGISTRY)?)
}

/// Extract file name for a published source: `17in11si.xls` -> `17in11si.csv`.
pub fn extract_file_name(src: &str) -> String {
    let stem = src.strip_suffix(".xls").unwrap_or(src);
    format!("{}.csv", stem)
}

/// Ingest one raw extract to long format with source metadata attached.
pub fn ingest(table: &SourceTable, raw_dir: &Path) -> Result<LazyFrame> {
    let path = raw_dir.join(extract_file_name(table.src));
    let lf = LazyCsvReader::new(&path)
        .with_infer_schema_length(Some(1000))
        .finish()
        .map_err(|e| {
            ReconError::Registry(format!("Failed to scan extract {}: {}", path.display(), e))
        })?
        .with_row_index("src_stub", None);

    let mut parts: Vec<LazyFrame> = Vec::with_capacity(table.columns.len());
    for c in table.columns {
        parts.push(lf.clone().select([
            lit(table.src).alias("src"),
            col("src_stub").cast(DataType::Int64),
            col("incrange").cast(DataType::String),
            lit(c.variable).alias("variable"),
            // non-numeric cells coerce to null
            col(c.variable).cast(DataType::Float64).alias("value"),
            lit(table.description).alias("table_description"),
            lit(c.description).alias("column_description"),
            lit(c.excel_column).alias("excel_column"),
            lit(table.itemized).alias("itemized"),
        ]));
    }
    concat(parts, UnionArgs::default())
        .map_err(|e| ReconError::Registry(format!("Failed to melt {}: {}", table.src, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_eight_tables() {
        assert_eq!(registry().len(), 8);
        assert_eq!(registry().iter().filter(|t| t.itemized).count(), 1);
    }

    #[test]
    fn variables_are_unique_within_a_table() {
        for table in registry() {
            let mut vars: Vec<&str> = table.columns.iter().map(|c| c.variable).collect();
            let before = vars.len();
            vars.sort_unstable();
            vars.dedup();
            assert_eq!(vars.len(), before, "duplicate variable in {}", table.src);
        }
    }

    #[test]
    fn extract_names_swap_the_extension() {
        assert_eq!(extract_file_name("17in11si.xls"), "17in11si.csv");
        assert_eq!(extract_file_name("custom"), "custom.csv");
    }

    #[test]
    fn registry_serializes() {
        let json = registry_json().unwrap();
        assert!(json.contains("17in21id.xls"));
        assert!(json.contains("nret_cggross"));
    }
}
