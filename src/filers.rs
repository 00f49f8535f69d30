//! Filing-requirement classification for the sample file, 2017 rules.
//!
//! A record is a filer when its gross income meets the requirement
//! threshold for its filing status and age band, or when it would file
//! anyway (negative AGI, nonzero income tax, or nonzero credits).

use polars::prelude::*;

/// Filing-status codes in the sample file's MARS column.
pub const MARS_SINGLE: i64 = 1;
pub const MARS_JOINT: i64 = 2;
pub const MARS_SEPARATE: i64 = 3;
pub const MARS_HEAD_OF_HOUSEHOLD: i64 = 4;
pub const MARS_WIDOW: i64 = 5;

/// 2017 gross-income filing thresholds by status and age band.
pub const SINGLE_UNDER_65: f64 = 10_400.0;
pub const SINGLE_65_PLUS: f64 = 11_950.0;
pub const JOINT_BOTH_UNDER_65: f64 = 20_800.0;
pub const JOINT_ONE_65_PLUS: f64 = 22_050.0;
pub const JOINT_BOTH_65_PLUS: f64 = 23_300.0;
pub const SEPARATE_ANY_AGE: f64 = 4_050.0;
pub const HOH_UNDER_65: f64 = 13_400.0;
pub const HOH_65_PLUS: f64 = 14_950.0;
pub const WIDOW_UNDER_65: f64 = 16_750.0;
pub const WIDOW_65_PLUS: f64 = 18_000.0;

/// Negative part of a column: the value where it is a loss, else zero.
fn neg_part(name: &str) -> Expr {
    when(col(name).lt(lit(0.0)))
        .then(col(name))
        .otherwise(lit(0.0))
}

/// Gross income for filing-requirement purposes: AGI plus above-the-line
/// adjustments, adding back losses deducted in arriving at AGI and
/// untaxed income excluded from it. Floored at zero.
pub fn gross_income_expr() -> Expr {
    let above_line_income = col("c00100") + col("c02900");

    // losses are negative, so subtracting them adds their magnitude back
    let above_line_losses = neg_part("c23650")
        + neg_part("c01000")
        + neg_part("e01200")
        + neg_part("e00900")
        + neg_part("e02000")
        + neg_part("e02100");

    // tax-exempt interest, untaxed pensions, untaxed social security
    let above_line_untaxed =
        col("e00400") + (col("e01500") - col("e01700")) + (col("e02400") - col("c02500"));

    let gross = above_line_income - above_line_losses + above_line_untaxed;
    when(gross.clone().gt_eq(lit(0.0)))
        .then(gross)
        .otherwise(lit(0.0))
        .alias("gross_income")
}

/// Required to file under the status/age/gross-income rules.
/// Expects a `gross_income` column (see [`gross_income_expr`]).
pub fn required_filer_expr() -> Expr {
    let gi = || col("gross_income");
    let head_lt65 = col("age_head").lt(lit(65));
    let head_ge65 = col("age_head").gt_eq(lit(65));
    let spouse_lt65 = col("age_spouse").lt(lit(65));
    let spouse_ge65 = col("age_spouse").gt_eq(lit(65));

    let single = col("MARS").eq(lit(MARS_SINGLE)).and(
        head_lt65
            .clone()
            .and(gi().gt_eq(lit(SINGLE_UNDER_65)))
            .or(head_ge65.clone().and(gi().gt_eq(lit(SINGLE_65_PLUS)))),
    );

    // the one-65+ clause covers any couple with at least one spouse
    // 65+, so a both-65+ couple already qualifies at that threshold
    let one_ge65 = head_ge65.clone().or(spouse_ge65.clone());
    let joint = col("MARS").eq(lit(MARS_JOINT)).and(
        head_lt65
            .clone()
            .and(spouse_lt65)
            .and(gi().gt_eq(lit(JOINT_BOTH_UNDER_65)))
            .or(one_ge65.and(gi().gt_eq(lit(JOINT_ONE_65_PLUS))))
            .or(head_ge65
                .clone()
                .and(spouse_ge65)
                .and(gi().gt_eq(lit(JOINT_BOTH_65_PLUS)))),
    );

    let separate = col("MARS")
        .eq(lit(MARS_SEPARATE))
        .and(gi().gt_eq(lit(SEPARATE_ANY_AGE)));

    let hoh = col("MARS").eq(lit(MARS_HEAD_OF_HOUSEHOLD)).and(
        head_lt65
            .clone()
            .and(gi().gt_eq(lit(HOH_UNDER_65)))
            .or(head_ge65.clone().and(gi().gt_eq(lit(HOH_65_PLUS)))),
    );

    let widow = col("MARS").eq(lit(MARS_WIDOW)).and(
        head_lt65
            .and(gi().gt_eq(lit(WIDOW_UNDER_65)))
            .or(head_ge65.and(gi().gt_eq(lit(WIDOW_65_PLUS)))),
    );

    single.or(joint).or(separate).or(hoh).or(widow)
}

/// Will (or must) file even when the threshold rules are not met:
/// negative AGI, nonzero income tax, or nonzero credits used/refunded.
pub fn likely_filer_expr() -> Expr {
    col("c00100")
        .lt(lit(0.0))
        .or(col("iitax").neq(lit(0.0)))
        .or(col("c07100").neq(lit(0.0)))
        .or(col("refund").neq(lit(0.0)))
}

pub fn filer_expr() -> Expr {
    required_filer_expr().or(likely_filer_expr()).alias("filer")
}
