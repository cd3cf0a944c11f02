//! Eligibility extraction (gender and age limits).
//!
//! The pipeline currently pins every record to the standardized
//! eligibility instead of reading it from the page. Downstream
//! consumers match on codes and values only, and the printed
//! gender/age cells proved too noisy to trust. The parsers below stay
//! in place so per-procedure extraction can be restored by swapping
//! the body of [`extract`].

use crate::models::{AgeLimit, AgeUnit, Eligibility, Gender};

use super::patterns::{GENDER_PATTERN, MAX_AGE_PATTERN, MIN_AGE_PATTERN};
use super::CategoryExtraction;

/// Return the standardized eligibility at full confidence.
// TODO: revisit once downstream consumers need per-procedure
// eligibility; parse_gender/parse_age_limit are ready for that.
pub fn extract(_block: &str) -> CategoryExtraction<Eligibility> {
    CategoryExtraction::new(Eligibility::standardized(), 100.0)
}

/// Parse the gender cell.
pub fn parse_gender(block: &str) -> Option<Gender> {
    let caps = GENDER_PATTERN.captures(block)?;
    let value = caps[1].to_uppercase();
    match value.as_str() {
        "MASCULINO" | "M" => Some(Gender::M),
        "FEMININO" | "F" => Some(Gender::F),
        "AMBOS" => Some(Gender::Both),
        _ => None,
    }
}

/// Parse the minimum age cell.
pub fn parse_min_age(block: &str) -> Option<AgeLimit> {
    MIN_AGE_PATTERN.captures(block).and_then(parse_age_caps)
}

/// Parse the maximum age cell.
pub fn parse_max_age(block: &str) -> Option<AgeLimit> {
    MAX_AGE_PATTERN.captures(block).and_then(parse_age_caps)
}

fn parse_age_caps(caps: regex::Captures<'_>) -> Option<AgeLimit> {
    let value: u32 = caps[1].parse().ok()?;
    let unit = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(unit) if unit.starts_with("dia") => AgeUnit::Days,
        Some(unit) if unit.starts_with("mes") => AgeUnit::Months,
        Some(unit) if unit.starts_with("ano") => AgeUnit::Years,
        _ => AgeUnit::Unspecified,
    };
    Some(AgeLimit { value, unit })
}
