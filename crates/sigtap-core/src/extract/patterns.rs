//! Common regex patterns for SIGTAP procedure extraction.
//!
//! Field patterns are priority-ordered: extractors try each pattern in
//! turn and stop at the first hit, so the most specific form comes
//! first and broad fallbacks last.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Procedure identification
    pub static ref PROCEDURE_HEADER: Regex = Regex::new(
        r"(?i)(\d{2}\.\d{2}\.\d{2}\.\d{3}-\d)\s+Procedimento:\s*([^\n\r]+)"
    ).unwrap();

    pub static ref CODE_ANYWHERE: Regex = Regex::new(
        r"(\d{2}\.\d{2}\.\d{2}\.\d{3}-\d)"
    ).unwrap();

    // Complexity: known values first (with and without accents), then
    // label-relative forms for layouts that split label and value.
    pub static ref COMPLEXITY_PATTERNS: Vec<Regex> = vec![
        Regex::new(
            r"(?i)(Média\s+Complexidade|Media\s+Complexidade|Atenção\s+Básica|Atencao\s+Basica|Baixa\s+Complexidade|Alta\s+Complexidade)"
        ).unwrap(),
        Regex::new(
            r"(?i)Complexidade:\s*\n\s*([^\n\r]+)"
        ).unwrap(),
        Regex::new(
            r"(?i)Complexidade[:\s]+([^\n\r]+)"
        ).unwrap(),
    ];

    // Financing type
    pub static ref FINANCING_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Tipo\s+de\s+Financiamento[:\s]*([^\n\r]+)").unwrap(),
        Regex::new(r"(?i)Financiamento[:\s]*([^\n\r]+)").unwrap(),
        // Code with parenthesized abbreviation: 06 - Média e Alta Complexidade (MAC)
        Regex::new(r"(\d{2}\s*-\s*[^(\n\r]*\([^)\n\r]*\))").unwrap(),
        Regex::new(r"(?i)\b(PAB|MAC|FAECP|FAEC|GMAQ)\b").unwrap(),
    ];

    // Monetary fields. Each list runs primary label form first, then
    // the short form without "Valor".
    pub static ref AMBULATORY_SERVICE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Valor\s+Ambulatorial\s+S\.?A\.?[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)Ambulatorial\s*S\.?A\.?[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
    ];

    pub static ref AMBULATORY_TOTAL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Valor\s+Ambulatorial\s+Total[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)Ambulatorial\s*Total[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
    ];

    pub static ref HOSPITAL_SERVICE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Valor\s+Hospitalar\s+S\.?H\.?[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)Hospitalar\s*S\.?H\.?[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
    ];

    pub static ref HOSPITAL_PROFESSIONAL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Valor\s+Hospitalar\s+S\.?P\.?[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)Hospitalar\s*S\.?P\.?[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
    ];

    pub static ref HOSPITAL_TOTAL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Valor\s+Hospitalar\s+Total[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)Hospitalar\s*Total[:\s]*R?\$?\s*([\d.,]+)").unwrap(),
    ];

    /// Bare decimal used by the near-the-label fallback.
    pub static ref DECIMAL_NEARBY: Regex = Regex::new(r"(\d+[.,]\d+)").unwrap();

    // Operational limits
    pub static ref MAX_QUANTITY_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Quantidade\s+M[áa]xima[:\s]*(\d+)").unwrap(),
    ];

    pub static ref AVERAGE_STAY_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)M[ée]dia\s+(?:de\s+)?Perman[êe]ncia[:\s]*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)Perman[êe]ncia[:\s]*([\d.,]+)").unwrap(),
    ];

    pub static ref POINTS_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Pontos[:\s]*(\d+)").unwrap(),
    ];

    /// Bare integer used by the near-the-label fallback.
    pub static ref INTEGER_NEARBY: Regex = Regex::new(r"(\d+)").unwrap();

    // Occupation (CBO) and diagnosis (CID) code shapes, searched near
    // the field label. Only the hyphenated CBO form is distinctive
    // enough to match bare; the digit-only forms must sit right after
    // the label or they would swallow every 4-digit run in the window.
    pub static ref CBO_CODE_SHAPES: Vec<Regex> = vec![
        Regex::new(r"(\d{4}-\d{2})").unwrap(),
        Regex::new(r"(?i)CBO[:\s]*(\d{6})").unwrap(),
        Regex::new(r"(?i)CBO[:\s]*(\d{4})").unwrap(),
    ];

    pub static ref CID_CODE_SHAPES: Vec<Regex> = vec![
        Regex::new(r"([A-Z]\d{2,3}(?:\.\d)?)").unwrap(),
    ];

    // Shape validators for positional lookups and code filtering
    pub static ref CBO_VALID: Regex = Regex::new(r"^(?:\d{4}-\d{2}|\d{6}|\d{4})$").unwrap();
    pub static ref CID_VALID: Regex = Regex::new(r"^[A-Z]\d{2,3}(?:\.\d)?$").unwrap();
    pub static ref ORIGIN_VALID: Regex = Regex::new(r"^[A-Z]\.?\d{8}$").unwrap();
    pub static ref CODED_LABEL_VALID: Regex = Regex::new(r"^\d{2}\s*-\s*.+").unwrap();

    // Textual additional-classification fields
    pub static ref HABILITATION_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Habilita[çc][ãa]o[:\s]*([^\n\r]+)").unwrap(),
    ];

    pub static ref HABILITATION_GROUP_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Grupo\s+de\s+Habilita[çc][ãa]o[:\s]*([^\n\r]+)").unwrap(),
    ];

    pub static ref SERVICE_CLASSIFICATION_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Servi[çc]o/Classifica[çc][ãa]o[:\s]*([^\n\r]+)").unwrap(),
    ];

    pub static ref COMPLEMENTARY_ATTRIBUTE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Atributo\s+Complementar[:\s]*([^\n\r]+)").unwrap(),
        Regex::new(r"(?i)Origem[:\s]*([^\n\r]+)").unwrap(),
    ];

    // Historical eligibility patterns. The pipeline pins eligibility to
    // a fixed default, but the parsers stay available.
    pub static ref GENDER_PATTERN: Regex = Regex::new(
        r"(?i)Sexo[:\s]*(Masculino|Feminino|Ambos|M\b|F\b)"
    ).unwrap();

    pub static ref MIN_AGE_PATTERN: Regex = Regex::new(
        r"(?i)Idade\s+M[íi]nima[:\s]*(\d+)\s*(dias?|mes(?:es)?|anos?|-)?"
    ).unwrap();

    pub static ref MAX_AGE_PATTERN: Regex = Regex::new(
        r"(?i)Idade\s+M[áa]xima[:\s]*(\d+)\s*(dias?|mes(?:es)?|anos?|-)?"
    ).unwrap();

    /// Simple numeric code shape, used to reject code-looking text in
    /// free-text fields.
    pub static ref NUMERIC_CODE: Regex = Regex::new(r"^\d+(-\d+)?$").unwrap();
}

/// First capture of the first pattern that matches.
pub fn first_capture<'t>(patterns: &[Regex], text: &'t str) -> Option<&'t str> {
    for pattern in patterns {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(0)) {
                let value = m.as_str().trim();
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// The window of text following the first case-insensitive occurrence
/// of `label`, used by nearby-value fallbacks.
///
/// Matching runs directly on `text` with a `(?i)` regex rather than a
/// lowercased copy: case folding can change byte lengths, so offsets
/// found in a folded copy are not valid indices into the original.
pub fn window_after_label<'t>(text: &'t str, label: &str, window: usize) -> Option<&'t str> {
    let pattern = Regex::new(&format!("(?i){}", regex::escape(label))).ok()?;
    let start = pattern.find(text)?.start();
    let end = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .find(|&i| i >= start + window)
        .unwrap_or(text.len());
    Some(&text[start..end])
}
