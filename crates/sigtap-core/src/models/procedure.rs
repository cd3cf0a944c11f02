//! Procedure record data model for the SIGTAP unified table.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Canonical SIGTAP code shape: 2-2-2-3-1 digit groups.
    pub static ref CODE_PATTERN: Regex = Regex::new(r"^\d{2}\.\d{2}\.\d{2}\.\d{3}-\d$").unwrap();
}

/// A structured entry describing one billable procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureRecord {
    /// Canonical procedure code (`DD.DD.DD.DDD-D`).
    pub code: String,

    /// Normalized uppercase description.
    pub description: String,

    /// Origin, complexity, modality and related classification fields.
    pub classification: Classification,

    /// Ambulatory monetary values.
    pub ambulatory_values: AmbulatoryValues,

    /// Hospital monetary values.
    pub hospital_values: HospitalValues,

    /// Gender and age eligibility criteria.
    pub eligibility: Eligibility,

    /// Quantity, stay and point limits.
    pub operational_limits: OperationalLimits,

    /// Occupation/diagnosis codes and credentialing metadata.
    pub additional: AdditionalClassifications,

    /// Provenance-weighted confidence of the record as a whole (0-100).
    pub extraction_confidence: f32,

    /// Which extraction path produced this record.
    pub extraction_method: ExtractionMethod,
}

/// Classification slice of a procedure record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    /// Origin reference (e.g. `H.32013035`).
    #[serde(default)]
    pub origin: String,

    /// Complexity level.
    #[serde(default)]
    pub complexity: Complexity,

    /// Modality (e.g. `02 - Hospitalar`).
    #[serde(default)]
    pub modality: String,

    /// Registration instrument (e.g. `03 - AIH (Proc. Principal)`).
    #[serde(default)]
    pub registration_instrument: String,

    /// Financing type (e.g. `06 - Média e Alta Complexidade (MAC)`).
    #[serde(default)]
    pub financing: String,

    /// Bed specialty, when the procedure implies admission.
    #[serde(default)]
    pub bed_specialty: String,
}

/// Complexity buckets of the unified table.
///
/// Text that matches none of the four standard levels is preserved
/// verbatim rather than silently defaulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Atenção Básica.
    AttentionBasic,
    /// Baixa Complexidade.
    Low,
    /// Média Complexidade.
    Medium,
    /// Alta Complexidade.
    High,
    /// No complexity text was found.
    #[default]
    #[serde(rename = "")]
    Unknown,
    /// Unmapped verbatim text. Untagged, so it must stay the last
    /// variant for the serde derives.
    #[serde(untagged)]
    Other(String),
}

impl Complexity {
    /// Map free text onto a complexity bucket by substring matching.
    ///
    /// Input is case-folded and stripped of diacritics before matching,
    /// so "Atenção Básica", "ATENCAO BASICA" and "atencao basica" all
    /// land in the same bucket. Unmapped non-empty text is preserved
    /// as [`Complexity::Other`].
    pub fn from_text(text: &str) -> Self {
        let folded = fold_diacritics(&text.to_uppercase());
        let folded = folded.trim();

        if folded.is_empty() {
            return Complexity::Unknown;
        }

        if folded.contains("ATENCAO") || folded.contains("BASICA") {
            Complexity::AttentionBasic
        } else if folded.contains("BAIXA") {
            Complexity::Low
        } else if folded.contains("MEDIA") {
            Complexity::Medium
        } else if folded.contains("ALTA") {
            Complexity::High
        } else {
            Complexity::Other(text.trim().to_string())
        }
    }

    /// True for the four standard buckets.
    pub fn is_standard(&self) -> bool {
        matches!(
            self,
            Complexity::AttentionBasic | Complexity::Low | Complexity::Medium | Complexity::High
        )
    }

    /// Canonical display form, as printed in the source table.
    pub fn display(&self) -> &str {
        match self {
            Complexity::AttentionBasic => "ATENÇÃO BÁSICA",
            Complexity::Low => "BAIXA COMPLEXIDADE",
            Complexity::Medium => "MÉDIA COMPLEXIDADE",
            Complexity::High => "ALTA COMPLEXIDADE",
            Complexity::Other(text) => text,
            Complexity::Unknown => "",
        }
    }
}

/// Ambulatory monetary sub-amounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmbulatoryValues {
    /// Ambulatory service amount (S.A.).
    pub service: Decimal,
    /// Ambulatory total.
    pub total: Decimal,
}

impl AmbulatoryValues {
    /// True when no amount was extracted.
    pub fn is_zero(&self) -> bool {
        self.service.is_zero() && self.total.is_zero()
    }
}

/// Hospital monetary sub-amounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HospitalValues {
    /// Hospital service amount (S.H.).
    pub service: Decimal,
    /// Professional service amount (S.P.).
    pub professional: Decimal,
    /// Hospital total.
    pub total: Decimal,
}

impl HospitalValues {
    /// True when no amount was extracted.
    pub fn is_zero(&self) -> bool {
        self.service.is_zero() && self.professional.is_zero() && self.total.is_zero()
    }

    /// Check that total ≈ service + professional within 5%.
    ///
    /// Only meaningful when all three amounts are positive; returns
    /// `None` otherwise.
    pub fn total_consistent(&self) -> Option<bool> {
        if self.service <= Decimal::ZERO
            || self.professional <= Decimal::ZERO
            || self.total <= Decimal::ZERO
        {
            return None;
        }

        let calculated = self.service + self.professional;
        let difference = (self.total - calculated).abs();
        // Tolerance floor of 0.01 so sub-cent rounding never fails.
        let tolerance = (calculated * Decimal::new(5, 2)).max(Decimal::new(1, 2));
        Some(difference <= tolerance)
    }
}

/// Gender eligibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    M,
    F,
    #[default]
    Both,
}

/// Unit attached to an age limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeUnit {
    Days,
    Months,
    Years,
    /// Printed as "-" in the source table.
    #[default]
    Unspecified,
}

/// Age bound with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeLimit {
    pub value: u32,
    pub unit: AgeUnit,
}

/// Gender and age eligibility criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub gender: Gender,
    pub min_age: AgeLimit,
    pub max_age: AgeLimit,
}

impl Default for Eligibility {
    fn default() -> Self {
        Self::standardized()
    }
}

impl Eligibility {
    /// The standardized eligibility applied to every record.
    ///
    /// Eligibility does not participate in downstream financial
    /// matching, so it is pinned to a single default rather than
    /// extracted per procedure.
    pub fn standardized() -> Self {
        Self {
            gender: Gender::Both,
            min_age: AgeLimit {
                value: 0,
                unit: AgeUnit::Unspecified,
            },
            max_age: AgeLimit {
                value: 130,
                unit: AgeUnit::Years,
            },
        }
    }
}

/// Quantity, stay and point limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationalLimits {
    /// Maximum billable quantity.
    pub max_quantity: u32,
    /// Average stay in days.
    pub average_stay: Decimal,
    /// Point value.
    pub points: u32,
}

/// Occupation/diagnosis codes and credentialing metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalClassifications {
    /// CBO occupation codes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub occupation_codes: Vec<String>,

    /// CID diagnosis codes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnosis_codes: Vec<String>,

    /// Credentialing label.
    #[serde(default)]
    pub credentialing: String,

    /// Credentialing groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentialing_groups: Vec<String>,

    /// Service/classification label.
    #[serde(default)]
    pub service_classification: String,

    /// Complementary free-text attribute.
    #[serde(default)]
    pub complementary_attribute: String,
}

/// Which extraction path produced a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    #[default]
    Deterministic,
    Llm,
    Merged,
}

impl ProcedureRecord {
    /// Create an empty record carrying only a code and description.
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            classification: Classification::default(),
            ambulatory_values: AmbulatoryValues::default(),
            hospital_values: HospitalValues::default(),
            eligibility: Eligibility::standardized(),
            operational_limits: OperationalLimits::default(),
            additional: AdditionalClassifications::default(),
            extraction_confidence: 0.0,
            extraction_method: ExtractionMethod::Deterministic,
        }
    }

    /// True when the code matches the canonical pattern.
    pub fn has_valid_code(&self) -> bool {
        CODE_PATTERN.is_match(&self.code)
    }

    /// Validate the record and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.has_valid_code() {
            issues.push(format!("Invalid procedure code: {}", self.code));
        }

        if self.description.is_empty() {
            issues.push("Missing description".to_string());
        }

        for (name, value) in [
            ("ambulatory service", self.ambulatory_values.service),
            ("ambulatory total", self.ambulatory_values.total),
            ("hospital service", self.hospital_values.service),
            ("hospital professional", self.hospital_values.professional),
            ("hospital total", self.hospital_values.total),
        ] {
            if value < Decimal::ZERO {
                issues.push(format!("Negative monetary value for {}: {}", name, value));
            }
        }

        if self.hospital_values.total_consistent() == Some(false) {
            issues.push(format!(
                "Hospital total ({}) differs from S.H. + S.P. ({}) by more than 5%",
                self.hospital_values.total,
                self.hospital_values.service + self.hospital_values.professional
            ));
        }

        issues
    }
}

/// Normalize a description: collapse whitespace, strip stray symbols,
/// uppercase. Diacritics are preserved.
pub fn normalize_description(raw: &str) -> String {
    let collapsed: String = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '(' | ')' | ',' | '.' | '/'))
        .collect::<String>()
        .trim()
        .to_uppercase()
}

/// Replace accented Latin letters with their ASCII base letter.
///
/// Only the accents that occur in the source table are handled; this
/// is for matching, not for display.
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'À' | 'Á' | 'Â' | 'Ã' | 'Ä' => 'A',
            'È' | 'É' | 'Ê' | 'Ë' => 'E',
            'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
            'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
            'Ç' => 'C',
            'à' | 'á' | 'â' | 'ã' | 'ä' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_complexity_mapping() {
        assert_eq!(
            Complexity::from_text("Atenção Básica"),
            Complexity::AttentionBasic
        );
        assert_eq!(
            Complexity::from_text("ATENCAO BASICA"),
            Complexity::AttentionBasic
        );
        assert_eq!(Complexity::from_text("Baixa Complexidade"), Complexity::Low);
        assert_eq!(
            Complexity::from_text("média complexidade"),
            Complexity::Medium
        );
        assert_eq!(Complexity::from_text("ALTA COMPLEXIDADE"), Complexity::High);
        assert_eq!(Complexity::from_text(""), Complexity::Unknown);
    }

    #[test]
    fn test_complexity_unmapped_text_is_preserved() {
        let raw = "Complexidade Especial";
        match Complexity::from_text(raw) {
            Complexity::Other(text) => assert_eq!(text, raw),
            other => panic!("expected Other, got {:?}", other),
        }
    }

    #[test]
    fn test_complexity_serde_round_trip() {
        for complexity in [
            Complexity::AttentionBasic,
            Complexity::High,
            Complexity::Unknown,
            Complexity::Other("Complexidade Especial".to_string()),
        ] {
            let json = serde_json::to_string(&complexity).unwrap();
            let back: Complexity = serde_json::from_str(&json).unwrap();
            assert_eq!(back, complexity);
        }

        assert_eq!(
            serde_json::to_string(&Complexity::AttentionBasic).unwrap(),
            r#""attention_basic""#
        );
        assert_eq!(serde_json::to_string(&Complexity::Unknown).unwrap(), r#""""#);
    }

    #[test]
    fn test_code_validation() {
        let record = ProcedureRecord::new("01.01.01.001-2", "CONSULTA");
        assert!(record.has_valid_code());

        let bad = ProcedureRecord::new("AB.CD.EF.GHI-J", "CONSULTA");
        assert!(!bad.has_valid_code());
    }

    #[test]
    fn test_hospital_total_consistency() {
        let values = HospitalValues {
            service: Decimal::from_str("120.50").unwrap(),
            professional: Decimal::from_str("78.90").unwrap(),
            total: Decimal::from_str("199.40").unwrap(),
        };
        assert_eq!(values.total_consistent(), Some(true));

        let drifted = HospitalValues {
            service: Decimal::from_str("100.00").unwrap(),
            professional: Decimal::from_str("100.00").unwrap(),
            total: Decimal::from_str("300.00").unwrap(),
        };
        assert_eq!(drifted.total_consistent(), Some(false));

        let partial = HospitalValues {
            service: Decimal::from_str("100.00").unwrap(),
            professional: Decimal::ZERO,
            total: Decimal::from_str("100.00").unwrap(),
        };
        assert_eq!(partial.total_consistent(), None);
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(
            normalize_description("  Consulta   médica\tem atenção básica  "),
            "CONSULTA MÉDICA EM ATENÇÃO BÁSICA"
        );
        assert_eq!(
            normalize_description("Biópsia* de #mama (unilateral)"),
            "BIÓPSIA DE MAMA (UNILATERAL)"
        );
    }

    #[test]
    fn test_standardized_eligibility() {
        let eligibility = Eligibility::standardized();
        assert_eq!(eligibility.gender, Gender::Both);
        assert_eq!(eligibility.min_age.value, 0);
        assert_eq!(eligibility.min_age.unit, AgeUnit::Unspecified);
        assert_eq!(eligibility.max_age.value, 130);
        assert_eq!(eligibility.max_age.unit, AgeUnit::Years);
    }

    #[test]
    fn test_validate_flags_negative_money() {
        let mut record = ProcedureRecord::new("01.01.01.001-2", "CONSULTA");
        record.ambulatory_values.service = Decimal::from_str("-1.00").unwrap();
        let issues = record.validate();
        assert!(issues.iter().any(|i| i.contains("Negative monetary")));
    }
}
