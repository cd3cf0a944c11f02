//! Data models for SIGTAP procedure extraction.

pub mod config;
pub mod procedure;

pub use config::{HybridConfig, LlmConfig, ProcessingConfig, SigtapConfig};
pub use procedure::{
    AdditionalClassifications, AgeLimit, AgeUnit, AmbulatoryValues, Classification, Complexity,
    Eligibility, ExtractionMethod, Gender, HospitalValues, OperationalLimits, ProcedureRecord,
    fold_diacritics, normalize_description, CODE_PATTERN,
};
