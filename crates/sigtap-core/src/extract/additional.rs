//! Additional classification extraction (CBO, CID, credentialing,
//! service classification, complementary attribute).

use regex::Regex;

use crate::models::AdditionalClassifications;

use super::patterns::{
    first_capture, window_after_label, CBO_CODE_SHAPES, CBO_VALID, CID_CODE_SHAPES, CID_VALID,
    COMPLEMENTARY_ATTRIBUTE_PATTERNS, HABILITATION_GROUP_PATTERNS, HABILITATION_PATTERNS,
    NUMERIC_CODE, SERVICE_CLASSIFICATION_PATTERNS,
};
use super::CategoryExtraction;

/// Extract the additional classifications from a block.
///
/// Confidence is the share of the seven fields found, scaled to 0-100,
/// minus 10 for each code array that still contains an invalid shape.
pub fn extract(block: &str) -> CategoryExtraction<AdditionalClassifications> {
    let occupation_codes = extract_codes(block, "CBO", &CBO_CODE_SHAPES, &CBO_VALID);
    let diagnosis_codes = extract_codes(block, "CID", &CID_CODE_SHAPES, &CID_VALID);

    let credentialing = extract_text(block, &HABILITATION_PATTERNS);
    let credentialing_groups = split_list(&extract_text(block, &HABILITATION_GROUP_PATTERNS));
    let service_classification = extract_text(block, &SERVICE_CLASSIFICATION_PATTERNS);
    let complementary_attribute = extract_text(block, &COMPLEMENTARY_ATTRIBUTE_PATTERNS);

    let additional = AdditionalClassifications {
        occupation_codes,
        diagnosis_codes,
        credentialing,
        credentialing_groups,
        service_classification,
        complementary_attribute,
    };

    let found = [
        !additional.occupation_codes.is_empty(),
        !additional.diagnosis_codes.is_empty(),
        !additional.credentialing.is_empty(),
        !additional.credentialing_groups.is_empty(),
        !additional.service_classification.is_empty(),
        // Bed specialty moved to the classification category; its slot
        // in the ratio stays so scores remain comparable.
        false,
        !additional.complementary_attribute.is_empty(),
    ]
    .iter()
    .filter(|found| **found)
    .count();

    let mut confidence = ((found as f32 / 7.0) * 100.0).round();
    for codes in [&additional.occupation_codes, &additional.diagnosis_codes] {
        if !codes.is_empty() && codes.iter().any(|c| !is_valid(c, &CBO_VALID, &CID_VALID)) {
            confidence = (confidence - 10.0).max(0.0);
        }
    }

    CategoryExtraction::new(additional, confidence)
}

fn is_valid(code: &str, cbo: &Regex, cid: &Regex) -> bool {
    cbo.is_match(code) || cid.is_match(code)
}

/// Collect code-shaped values within 200 characters of the field
/// label, deduplicated in first-seen order.
fn extract_codes(block: &str, label: &str, shapes: &[Regex], valid: &Regex) -> Vec<String> {
    let Some(window) = window_after_label(block, label, 200) else {
        return Vec::new();
    };

    let mut codes: Vec<String> = Vec::new();
    for shape in shapes {
        for caps in shape.captures_iter(window) {
            let code = caps[1].trim().to_uppercase();
            if valid.is_match(&code) && !codes.iter().any(|c| c == &code || c.contains(&code)) {
                codes.push(code);
            }
        }
    }
    codes
}

fn extract_text(block: &str, patterns: &[Regex]) -> String {
    first_capture(patterns, block)
        .filter(|value| !NUMERIC_CODE.is_match(value))
        .unwrap_or("")
        .to_string()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split([';', ',', '|', '/'])
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
