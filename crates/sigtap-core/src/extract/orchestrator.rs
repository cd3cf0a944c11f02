//! Page-level orchestration of the category extractors.
//!
//! Rebuilds the page's sequential text, slices it into per-procedure
//! blocks at each code header, and runs the seven category extractors
//! over every block.

use tracing::{debug, warn};

use crate::error::Result;
use crate::layout::PageLayout;
use crate::models::{ExtractionMethod, ProcedureRecord};

use super::patterns::PROCEDURE_HEADER;
use super::{
    additional, ambulatory, classification, eligibility, hospital, identification, limits,
    StatsSheet,
};

/// Fallback block length when no next header bounds the slice.
const BLOCK_FALLBACK_CHARS: usize = 2000;

/// Everything extracted deterministically from one page.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub records: Vec<ProcedureRecord>,
    /// Mean record confidence for the page, 0 when no records.
    pub confidence: f32,
    pub stats: StatsSheet,
}

/// Run the deterministic extractors over one page.
pub fn extract_page(layout: &PageLayout) -> Result<PageExtraction> {
    layout.check()?;

    let text = layout.full_text();
    let mut extraction = PageExtraction::default();

    let headers: Vec<_> = PROCEDURE_HEADER.find_iter(&text).collect();
    for (i, header) in headers.iter().enumerate() {
        let end = headers
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or_else(|| char_floor(&text, header.start() + BLOCK_FALLBACK_CHARS));
        let block = &text[header.start()..end.max(header.end())];

        if let Some(record) = extract_block(block, layout, &mut extraction.stats) {
            extraction.records.push(record);
        }
    }

    // A page with text but no headers may still carry a bare code.
    if headers.is_empty() {
        if let Some(record) = extract_block(&text, layout, &mut extraction.stats) {
            extraction.records.push(record);
        }
    }

    if extraction.records.is_empty() {
        debug!(page = layout.page_number, "no procedure data on page");
    } else {
        extraction.confidence = extraction
            .records
            .iter()
            .map(|r| r.extraction_confidence)
            .sum::<f32>()
            / extraction.records.len() as f32;
    }

    Ok(extraction)
}

fn extract_block(
    block: &str,
    layout: &PageLayout,
    stats: &mut StatsSheet,
) -> Option<ProcedureRecord> {
    let ident = identification::extract(block);
    stats.identification.record(ident.confidence);
    let Some(identity) = ident.value else {
        return None;
    };

    let class = classification::extract(block, Some(layout));
    stats.classification.record(class.confidence);

    let amb = ambulatory::extract(block);
    stats.ambulatory.record(amb.confidence);

    let hosp = hospital::extract(block);
    stats.hospital.record(hosp.confidence);

    let elig = eligibility::extract(block);
    stats.eligibility.record(elig.confidence);

    let lim = limits::extract(block);
    stats.limits.record(lim.confidence);

    let add = additional::extract(block);
    stats.additional.record(add.confidence);

    let confidence = [
        ident.confidence,
        class.confidence,
        amb.confidence,
        hosp.confidence,
        elig.confidence,
        lim.confidence,
        add.confidence,
    ]
    .iter()
    .sum::<f32>()
        / 7.0;

    let record = ProcedureRecord {
        code: identity.code,
        description: identity.description,
        classification: class.value,
        ambulatory_values: amb.value,
        hospital_values: hosp.value,
        eligibility: elig.value,
        operational_limits: lim.value,
        additional: add.value,
        extraction_confidence: confidence,
        extraction_method: ExtractionMethod::Deterministic,
    };

    if !record.has_valid_code() {
        warn!(code = %record.code, "extracted record carries a malformed code");
    }

    Some(record)
}

/// Largest char boundary at or below `index`.
fn char_floor(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
