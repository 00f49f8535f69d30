//! Crosswalk between sample variable/measure keys and published target
//! variable names. Insertion order drives report ordering.

use crate::error::{ReconError, Result};
use lazy_static::lazy_static;
use polars::prelude::*;
use std::collections::HashMap;

lazy_static! {
    /// `<sample variable>_<measure>` -> target variable name.
    pub static ref SAMPLE_TARGET_MAP: Vec<(&'static str, &'static str)> = vec![
        // AGI and income components
        ("c00100_nnz", "nret_all"),
        ("c00100_wsum", "agi"),
        ("e00200_nnz", "nret_wages"),
        ("e00200_wsum", "wages"),
        ("e00300_nnz", "nret_taxint"),
        ("e00300_wsum", "taxint"),
        ("e00600_nnz", "nret_orddiv"),
        ("e00600_wsum", "orddiv"),
        ("c01000_nnz", "nret_cgnet"),
        ("c01000_wsum", "cgnet"),
        ("e01500_nnz", "nret_pensions"),
        ("e01500_wsum", "pensions"),
        ("e02400_nnz", "nret_socsectot"),
        ("e02400_wsum", "socsectot"),
        ("c02500_nnz", "nret_socsectaxable"),
        ("c02500_wsum", "socsectaxable"),
        // itemized deductions
        ("c17000_nnz", "nret_id_medical_capped"),
        ("c17000_wsum", "id_medical_capped"),
        ("c18300_nnz", "nret_id_taxpaid"),
        ("c18300_wsum", "id_taxpaid"),
        ("c19200_nnz", "nret_id_intpaid"),
        ("c19200_wsum", "id_intpaid"),
        ("c19700_nnz", "nret_id_contributions"),
        ("c19700_wsum", "id_contributions"),
    ];
}

/// Two-column frame of the crosswalk plus its report order, for joining
/// onto the melted sample aggregates.
pub fn crosswalk_frame() -> Result<DataFrame> {
    let keys: Vec<&str> = SAMPLE_TARGET_MAP.iter().map(|(k, _)| *k).collect();
    let targets: Vec<&str> = SAMPLE_TARGET_MAP.iter().map(|(_, t)| *t).collect();
    let order: Vec<i64> = (0..SAMPLE_TARGET_MAP.len() as i64).collect();
    let df = DataFrame::new(vec![
        Series::new("sample_key", keys),
        Series::new("target_var", targets),
        Series::new("report_order", order),
    ])?;
    Ok(df)
}

/// Target variable name -> sample key. Errors if the forward map is not
/// injective, since the reverse would then be ambiguous.
pub fn reverse_crosswalk() -> Result<HashMap<&'static str, &'static str>> {
    let mut rev = HashMap::new();
    for (key, target) in SAMPLE_TARGET_MAP.iter() {
        if rev.insert(*target, *key).is_some() {
            return Err(ReconError::Comparison(format!(
                "Crosswalk maps more than one sample key to target '{}'",
                target
            )));
        }
    }
    Ok(rev)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crosswalk_is_injective_both_ways() {
        let rev = reverse_crosswalk().unwrap();
        assert_eq!(rev.len(), SAMPLE_TARGET_MAP.len());
    }

    #[test]
    fn every_key_pairs_a_count_with_a_sum() {
        // each sample variable appears exactly twice: once per measure
        let mut seen: HashMap<&str, Vec<&str>> = HashMap::new();
        for (key, _) in SAMPLE_TARGET_MAP.iter() {
            let (var, measure) = key.rsplit_once('_').unwrap();
            seen.entry(var).or_default().push(measure);
        }
        for (var, measures) in seen {
            assert_eq!(measures.len(), 2, "variable {} lacks a measure", var);
            assert!(measures.contains(&"nnz"));
            assert!(measures.contains(&"wsum"));
        }
    }

    #[test]
    fn count_targets_carry_the_nret_prefix() {
        for (key, target) in SAMPLE_TARGET_MAP.iter() {
            if key.ends_with("_nnz") {
                assert!(target.starts_with("nret_"), "{} -> {}", key, target);
            } else {
                assert!(!target.starts_with("nret_"), "{} -> {}", key, target);
            }
        }
    }
}
