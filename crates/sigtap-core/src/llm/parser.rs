//! Strict validation of the LLM's JSON payload.
//!
//! The service is prompted for a fixed JSON contract; anything that
//! does not meet it is dropped and recorded as an error string rather
//! than propagated, so one malformed item never voids a page.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use crate::models::{
    normalize_description, AdditionalClassifications, Classification, Complexity, Eligibility,
    ExtractionMethod, ProcedureRecord, CODE_PATTERN,
};

use crate::extract::patterns::{CBO_VALID, CID_VALID};

#[derive(Debug, Deserialize)]
struct LlmPayload {
    #[serde(default)]
    procedures: Vec<LlmProcedure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmProcedure {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    complexity: String,
    #[serde(default)]
    modality: String,
    #[serde(default)]
    registration_instrument: String,
    #[serde(default)]
    financing: String,
    #[serde(default)]
    value_amb: Value,
    #[serde(default)]
    value_amb_total: Value,
    #[serde(default)]
    value_hosp: Value,
    #[serde(default)]
    value_prof: Value,
    #[serde(default)]
    value_hosp_total: Value,
    #[serde(default)]
    max_quantity: Value,
    #[serde(default)]
    average_stay: Value,
    #[serde(default)]
    points: Value,
    #[serde(default)]
    cbo: Value,
    #[serde(default)]
    cid: Value,
    #[serde(default)]
    habilitation: String,
    #[serde(default)]
    habilitation_group: Vec<String>,
    #[serde(default)]
    service_classification: String,
}

/// Parse and validate a raw LLM response into records.
///
/// Returns the accepted records and the errors for everything dropped.
pub fn parse_response(raw: &str, page_text: &str) -> (Vec<ProcedureRecord>, Vec<String>) {
    let mut errors = Vec::new();

    let cleaned = strip_fences(raw);
    let payload: LlmPayload = match serde_json::from_str(cleaned) {
        Ok(payload) => payload,
        Err(e) => {
            errors.push(format!("invalid JSON payload: {}", e));
            return (Vec::new(), errors);
        }
    };

    let mut records = Vec::new();
    for proc in payload.procedures {
        if proc.code.is_empty() || proc.description.is_empty() {
            errors.push(format!(
                "procedure missing code or description: {:?}",
                proc.code
            ));
            continue;
        }
        if !CODE_PATTERN.is_match(&proc.code) {
            errors.push(format!("invalid procedure code: {}", proc.code));
            continue;
        }

        records.push(to_record(proc));
    }

    if records.is_empty() && !errors.is_empty() {
        debug!(errors = errors.len(), "llm payload yielded no valid records");
    }

    let confidence = calculate_confidence(&records, page_text);
    for record in &mut records {
        record.extraction_confidence = confidence;
    }

    (records, errors)
}

fn to_record(proc: LlmProcedure) -> ProcedureRecord {
    let mut record = ProcedureRecord::new(proc.code, normalize_description(&proc.description));
    record.extraction_method = ExtractionMethod::Llm;

    record.classification = Classification {
        origin: String::new(),
        complexity: normalize_llm_complexity(&proc.complexity),
        modality: proc.modality,
        registration_instrument: proc.registration_instrument,
        financing: proc.financing,
        bed_specialty: String::new(),
    };

    record.ambulatory_values.service = numeric(&proc.value_amb);
    record.ambulatory_values.total = numeric(&proc.value_amb_total);
    record.hospital_values.service = numeric(&proc.value_hosp);
    record.hospital_values.professional = numeric(&proc.value_prof);
    record.hospital_values.total = numeric(&proc.value_hosp_total);

    record.eligibility = Eligibility::standardized();

    record.operational_limits.max_quantity = integer(&proc.max_quantity);
    record.operational_limits.average_stay = numeric(&proc.average_stay);
    record.operational_limits.points = integer(&proc.points);

    record.additional = AdditionalClassifications {
        occupation_codes: code_list(&proc.cbo, &CBO_VALID),
        diagnosis_codes: code_list(&proc.cid, &CID_VALID),
        credentialing: proc.habilitation,
        credentialing_groups: proc.habilitation_group,
        service_classification: proc.service_classification,
        complementary_attribute: String::new(),
    };

    record
}

/// The service defaults unmapped complexity to the middle bucket; the
/// deterministic path preserves unmapped text instead.
fn normalize_llm_complexity(text: &str) -> Complexity {
    match Complexity::from_text(text) {
        complexity if complexity.is_standard() => complexity,
        _ => Complexity::Medium,
    }
}

/// Coerce a JSON value to a decimal amount. Strings may carry
/// Brazilian currency formatting.
fn numeric(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap_or(Decimal::ZERO),
        Value::String(s) => {
            let cleaned = s.replace(['R', '$', ' '], "").replace(',', ".");
            Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    }
    .round_dp(2)
}

fn integer(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0) as u32,
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Accept a string or array of strings; keep only shape-valid codes.
fn code_list(value: &Value, valid: &regex::Regex) -> Vec<String> {
    let candidates: Vec<String> = match value {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    candidates
        .into_iter()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| {
            let ok = valid.is_match(c);
            if !ok {
                debug!(code = %c, "dropping malformed classification code");
            }
            ok
        })
        .collect()
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Score a batch of records against the source text (0-100).
///
/// Per record: +20 valid code, +15 description longer than 10 chars,
/// +10 standard complexity, +10 any positive monetary value, +10
/// modality or financing present, +5 CBO/CID/credentialing present,
/// +30 when the code appears verbatim in the page text.
pub fn calculate_confidence(records: &[ProcedureRecord], page_text: &str) -> f32 {
    if records.is_empty() {
        return 0.0;
    }

    let mut score = 0.0f32;
    let max_score = (records.len() * 100) as f32;

    for record in records {
        if record.has_valid_code() {
            score += 20.0;
        }
        if record.description.len() > 10 {
            score += 15.0;
        }
        if record.classification.complexity.is_standard() {
            score += 10.0;
        }
        if !record.ambulatory_values.is_zero() || !record.hospital_values.is_zero() {
            score += 10.0;
        }
        if !record.classification.modality.is_empty() || !record.classification.financing.is_empty()
        {
            score += 10.0;
        }
        if !record.additional.occupation_codes.is_empty()
            || !record.additional.diagnosis_codes.is_empty()
            || !record.additional.credentialing.is_empty()
        {
            score += 5.0;
        }
        if page_text.contains(&record.code) {
            score += 30.0;
        }
    }

    ((score / max_score) * 100.0).min(100.0)
}
