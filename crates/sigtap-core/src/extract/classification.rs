//! Classification field extraction (origin, complexity, modality,
//! registration instrument, financing, bed specialty).
//!
//! Complexity and financing read reliably from the block text alone.
//! The remaining fields print their value away from the label in the
//! table layout, so they go through the positional index first and
//! fall back to sequential patterns.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::layout::{PageLayout, PositionalIndex};
use crate::models::{fold_diacritics, Classification, Complexity};

use super::patterns::{
    first_capture, CODED_LABEL_VALID, COMPLEXITY_PATTERNS, FINANCING_PATTERNS, ORIGIN_VALID,
};
use super::CategoryExtraction;

lazy_static! {
    static ref ORIGIN_SEQ: Regex = Regex::new(r"(?i)Origem[:\s]*([^\n\r]+)").unwrap();
    static ref MODALITY_SEQ: Regex = Regex::new(r"(?i)Modalidade[:\s]*([^\n\r]+)").unwrap();
    static ref INSTRUMENT_SEQ: Regex =
        Regex::new(r"(?i)Instrumento\s+de\s+Registro[:\s]*([^\n\r]+)").unwrap();
    static ref BED_SPECIALTY_SEQ: Regex =
        Regex::new(r"(?i)Especialidade\s+(?:do\s+)?Leito[:\s]*([^\n\r]+)").unwrap();
}

/// Extract the classification fields from a block.
///
/// Confidence is the share of the six fields that produced a value,
/// scaled to 0-100.
pub fn extract(block: &str, layout: Option<&PageLayout>) -> CategoryExtraction<Classification> {
    let complexity_text = first_capture(&COMPLEXITY_PATTERNS, block).unwrap_or("");
    let complexity = Complexity::from_text(complexity_text);
    if let Complexity::Other(text) = &complexity {
        warn!(text = %text, "unmapped complexity text preserved verbatim");
    }

    let financing = first_capture(&FINANCING_PATTERNS, block)
        .unwrap_or("")
        .to_string();

    let index = layout.map(PositionalIndex::new);

    let origin = positional_or_sequential(
        index.as_ref(),
        block,
        |label| contains_folded(label, "ORIGEM"),
        |value| ORIGIN_VALID.is_match(value),
        &ORIGIN_SEQ,
    );
    let modality = positional_or_sequential(
        index.as_ref(),
        block,
        |label| contains_folded(label, "MODALIDADE"),
        |value| CODED_LABEL_VALID.is_match(value),
        &MODALITY_SEQ,
    );
    let registration_instrument = positional_or_sequential(
        index.as_ref(),
        block,
        |label| contains_folded(label, "INSTRUMENTO") && contains_folded(label, "REGISTRO"),
        |value| CODED_LABEL_VALID.is_match(value),
        &INSTRUMENT_SEQ,
    );
    let bed_specialty = positional_or_sequential(
        index.as_ref(),
        block,
        |label| contains_folded(label, "ESPECIALIDADE") && contains_folded(label, "LEITO"),
        |value| !value.is_empty(),
        &BED_SPECIALTY_SEQ,
    );

    let classification = Classification {
        origin,
        complexity,
        modality,
        registration_instrument,
        financing,
        bed_specialty,
    };

    let found = [
        !matches!(classification.complexity, Complexity::Unknown),
        !classification.financing.is_empty(),
        !classification.origin.is_empty(),
        !classification.modality.is_empty(),
        !classification.registration_instrument.is_empty(),
        !classification.bed_specialty.is_empty(),
    ]
    .iter()
    .filter(|found| **found)
    .count();

    let confidence = ((found as f32 / 6.0) * 100.0).round();
    CategoryExtraction::new(classification, confidence)
}

fn positional_or_sequential(
    index: Option<&PositionalIndex<'_>>,
    block: &str,
    is_label: impl Fn(&str) -> bool,
    accept: impl Fn(&str) -> bool,
    sequential: &Regex,
) -> String {
    if let Some(index) = index {
        if let Some(value) = index.value_for_label(&is_label, |v| !is_label(v) && accept(v)) {
            return value;
        }
    }
    sequential
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty() && accept(value))
        .unwrap_or_default()
}

fn contains_folded(text: &str, needle: &str) -> bool {
    fold_diacritics(&text.to_uppercase()).contains(needle)
}
