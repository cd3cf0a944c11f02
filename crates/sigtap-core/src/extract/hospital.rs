//! Hospital monetary value extraction (S.H., S.P. and total).

use crate::models::HospitalValues;

use super::money::extract_labeled_amount;
use super::patterns::{
    HOSPITAL_PROFESSIONAL_PATTERNS, HOSPITAL_SERVICE_PATTERNS, HOSPITAL_TOTAL_PATTERNS,
};
use super::CategoryExtraction;

/// Extract the hospital values from a block.
///
/// Confidence is the share of the three amounts found, scaled to
/// 0-100, with a +10 bonus (capped at 100) when the total agrees with
/// S.H. + S.P. within 5%.
pub fn extract(block: &str) -> CategoryExtraction<HospitalValues> {
    let values = HospitalValues {
        service: extract_labeled_amount(block, &HOSPITAL_SERVICE_PATTERNS, "Valor Hospitalar S.H"),
        professional: extract_labeled_amount(
            block,
            &HOSPITAL_PROFESSIONAL_PATTERNS,
            "Valor Hospitalar S.P",
        ),
        total: extract_labeled_amount(block, &HOSPITAL_TOTAL_PATTERNS, "Valor Hospitalar Total"),
    };

    let found = [values.service, values.professional, values.total]
        .iter()
        .filter(|v| !v.is_zero())
        .count();

    let mut confidence = ((found as f32 / 3.0) * 100.0).round();
    if values.total_consistent() == Some(true) {
        confidence = (confidence + 10.0).min(100.0);
    }

    CategoryExtraction::new(values, confidence)
}
