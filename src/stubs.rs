//! Common AGI bracket ("stub") scheme and the remap tables that bring the
//! published tables' heterogeneous stub numbering onto it.
//!
//! Stub 0 is the "All returns" grand total; stubs 1..=18 are left-closed
//! AGI brackets. Published tables come in two granularities: the standard
//! 19-range scheme (stubs 0..=19, where 1 is "no AGI" and 2 is "under
//! $5,000") and the finer 22-range scheme used by the itemized-deduction
//! table (stubs 0..=22).

use crate::error::Result;
use lazy_static::lazy_static;
use polars::prelude::*;

pub const STUB_COUNT: i64 = 18;

/// Upper bounds of common stubs 1..=17; stub 18 is open-ended above.
pub const STUB_UPPER_BOUNDS: [f64; 17] = [
    5_000.0,
    10_000.0,
    15_000.0,
    20_000.0,
    25_000.0,
    30_000.0,
    40_000.0,
    50_000.0,
    75_000.0,
    100_000.0,
    200_000.0,
    500_000.0,
    1_000_000.0,
    1_500_000.0,
    2_000_000.0,
    5_000_000.0,
    10_000_000.0,
];

pub const STUB_LABELS: [(i64, &str); 19] = [
    (0, "All returns"),
    (1, "Under $5,000"),
    (2, "$5,000 under $10,000"),
    (3, "$10,000 under $15,000"),
    (4, "$15,000 under $20,000"),
    (5, "$20,000 under $25,000"),
    (6, "$25,000 under $30,000"),
    (7, "$30,000 under $40,000"),
    (8, "$40,000 under $50,000"),
    (9, "$50,000 under $75,000"),
    (10, "$75,000 under $100,000"),
    (11, "$100,000 under $200,000"),
    (12, "$200,000 under $500,000"),
    (13, "$500,000 under $1,000,000"),
    (14, "$1,000,000 under $1,500,000"),
    (15, "$1,500,000 under $2,000,000"),
    (16, "$2,000,000 under $5,000,000"),
    (17, "$5,000,000 under $10,000,000"),
    (18, "$10,000,000 or more"),
];

lazy_static! {
    /// Source stub -> common stub for tables on the standard 19-range
    /// scheme. Source stubs 1 ("no AGI") and 2 ("under $5,000") collapse
    /// into common stub 1; everything above shifts down by one.
    pub static ref STANDARD_STUB_MAP: Vec<(i64, i64)> = {
        let mut map = vec![(0, 0), (1, 1), (2, 1)];
        map.extend((3..=19).map(|k| (k, k - 1)));
        map
    };

    /// Source stub -> common stub for the itemized-deduction table's
    /// finer 22-range scheme.
    pub static ref ITEMIZED_STUB_MAP: Vec<(i64, i64)> = {
        let mut map: Vec<(i64, i64)> = (0..=6).map(|k| (k, k)).collect();
        map.extend([(7, 7), (8, 7), (9, 8), (10, 8), (11, 9), (12, 9), (13, 9)]);
        map.extend((14..=22).map(|k| (k, k - 4)));
        map
    };
}

/// Expression bucketing an AGI column into common stubs 1..=18.
/// Brackets are left-closed, right-open; anything below $5,000
/// (including negative AGI) lands in stub 1.
pub fn assign_common_stub(agi_col: &str) -> Expr {
    let mut expr = lit(STUB_COUNT);
    for stub in (1..=17i64).rev() {
        let upper = STUB_UPPER_BOUNDS[(stub - 1) as usize];
        expr = when(col(agi_col).lt(lit(upper)))
            .then(lit(stub))
            .otherwise(expr);
    }
    expr.cast(DataType::Int64).alias("common_stub")
}

/// Two-column frame of stub labels, for joining income-range text onto
/// aggregated output.
pub fn stub_labels_frame() -> Result<DataFrame> {
    let stubs: Vec<i64> = STUB_LABELS.iter().map(|(s, _)| *s).collect();
    let labels: Vec<&str> = STUB_LABELS.iter().map(|(_, l)| *l).collect();
    let df = DataFrame::new(vec![
        Series::new("common_stub", stubs),
        Series::new("incrange", labels),
    ])?;
    Ok(df)
}

/// Two-column frame of a source-stub remap table, for joining onto
/// ingested published tables.
pub fn stub_map_frame(map: &[(i64, i64)]) -> Result<DataFrame> {
    let src: Vec<i64> = map.iter().map(|(s, _)| *s).collect();
    let common: Vec<i64> = map.iter().map(|(_, c)| *c).collect();
    let df = DataFrame::new(vec![
        Series::new("src_stub", src),
        Series::new("common_stub", common),
    ])?;
    Ok(df)
}

pub fn label_for(stub: i64) -> Option<&'static str> {
    STUB_LABELS
        .iter()
        .find(|(s, _)| *s == stub)
        .map(|(_, l)| *l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_map_is_total_and_surjective() {
        assert_eq!(STANDARD_STUB_MAP.len(), 20);
        for k in 0..=19 {
            assert!(STANDARD_STUB_MAP.iter().any(|(s, _)| *s == k));
        }
        for c in 0..=18 {
            assert!(STANDARD_STUB_MAP.iter().any(|(_, v)| *v == c));
        }
    }

    #[test]
    fn itemized_map_is_total_and_surjective() {
        assert_eq!(ITEMIZED_STUB_MAP.len(), 23);
        for k in 0..=22 {
            assert!(ITEMIZED_STUB_MAP.iter().any(|(s, _)| *s == k));
        }
        for c in 0..=18 {
            assert!(ITEMIZED_STUB_MAP.iter().any(|(_, v)| *v == c));
        }
        // spot checks from the published crosswalk
        let get = |k: i64| {
            ITEMIZED_STUB_MAP
                .iter()
                .find(|(s, _)| *s == k)
                .map(|(_, v)| *v)
                .unwrap()
        };
        assert_eq!(get(8), 7);
        assert_eq!(get(13), 9);
        assert_eq!(get(14), 10);
        assert_eq!(get(22), 18);
    }

    #[test]
    fn stub_assignment_is_left_closed() {
        let df = DataFrame::new(vec![Series::new(
            "c00100",
            &[-34_000_000.0, 0.0, 4_999.99, 5_000.0, 99_999.0, 100_000.0, 184_000_000.0],
        )])
        .unwrap();
        let out = df
            .lazy()
            .with_columns([assign_common_stub("c00100")])
            .collect()
            .unwrap();
        let stubs: Vec<i64> = out
            .column("common_stub")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(stubs, vec![1, 1, 1, 2, 10, 11, 18]);
    }

    #[test]
    fn labels_cover_every_stub() {
        for stub in 0..=STUB_COUNT {
            assert!(label_for(stub).is_some());
        }
        assert_eq!(label_for(0), Some("All returns"));
        assert_eq!(label_for(18), Some("$10,000,000 or more"));
    }
}
