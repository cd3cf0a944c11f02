//! Ambulatory monetary value extraction (S.A. and total).

use crate::models::AmbulatoryValues;

use super::money::extract_labeled_amount;
use super::patterns::{AMBULATORY_SERVICE_PATTERNS, AMBULATORY_TOTAL_PATTERNS};
use super::CategoryExtraction;

/// Extract the ambulatory values from a block.
///
/// Confidence is the share of the two amounts that came out positive,
/// scaled to 0-100. A page with no ambulatory pricing scores 0, which
/// is normal for hospital-only procedures.
pub fn extract(block: &str) -> CategoryExtraction<AmbulatoryValues> {
    let values = AmbulatoryValues {
        service: extract_labeled_amount(
            block,
            &AMBULATORY_SERVICE_PATTERNS,
            "Valor Ambulatorial S.A.",
        ),
        total: extract_labeled_amount(
            block,
            &AMBULATORY_TOTAL_PATTERNS,
            "Valor Ambulatorial Total",
        ),
    };

    let found = [
        values.service.is_sign_positive() && !values.service.is_zero(),
        values.total.is_sign_positive() && !values.total.is_zero(),
    ]
    .iter()
    .filter(|found| **found)
    .count();

    let confidence = ((found as f32 / 2.0) * 100.0).round();
    CategoryExtraction::new(values, confidence)
}
