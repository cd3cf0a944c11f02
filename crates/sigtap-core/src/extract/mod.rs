//! Deterministic category extractors for procedure blocks.

pub mod additional;
pub mod ambulatory;
pub mod classification;
pub mod eligibility;
pub mod hospital;
pub mod identification;
pub mod limits;
pub mod money;
pub mod orchestrator;
pub mod patterns;

pub use money::{format_brazilian_amount, parse_brazilian_amount};
pub use orchestrator::{extract_page, PageExtraction};

use serde::Serialize;

/// One category's extraction outcome: the typed value plus a 0-100
/// confidence score computed by that category's own rules.
#[derive(Debug, Clone)]
pub struct CategoryExtraction<T> {
    pub value: T,
    pub confidence: f32,
}

impl<T> CategoryExtraction<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self { value, confidence }
    }
}

/// Per-extractor success/failure counters.
///
/// Accumulated by the caller over a run and reported in the processing
/// summary; extractors themselves stay stateless.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ExtractorStats {
    pub successful: u64,
    pub failed: u64,
    confidence_sum: f64,
}

impl ExtractorStats {
    /// Record one extraction outcome. Zero confidence counts as a
    /// failure.
    pub fn record(&mut self, confidence: f32) {
        if confidence > 0.0 {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.confidence_sum += confidence as f64;
    }

    pub fn attempts(&self) -> u64 {
        self.successful + self.failed
    }

    pub fn mean_confidence(&self) -> f32 {
        let attempts = self.attempts();
        if attempts == 0 {
            0.0
        } else {
            (self.confidence_sum / attempts as f64) as f32
        }
    }
}

/// Counters for all seven category extractors.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatsSheet {
    pub identification: ExtractorStats,
    pub classification: ExtractorStats,
    pub ambulatory: ExtractorStats,
    pub hospital: ExtractorStats,
    pub eligibility: ExtractorStats,
    pub limits: ExtractorStats,
    pub additional: ExtractorStats,
}

impl StatsSheet {
    pub fn merge(&mut self, other: &StatsSheet) {
        for (mine, theirs) in [
            (&mut self.identification, &other.identification),
            (&mut self.classification, &other.classification),
            (&mut self.ambulatory, &other.ambulatory),
            (&mut self.hospital, &other.hospital),
            (&mut self.eligibility, &other.eligibility),
            (&mut self.limits, &other.limits),
            (&mut self.additional, &other.additional),
        ] {
            mine.successful += theirs.successful;
            mine.failed += theirs.failed;
            mine.confidence_sum += theirs.confidence_sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stats_record() {
        let mut stats = ExtractorStats::default();
        stats.record(80.0);
        stats.record(0.0);
        stats.record(100.0);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.attempts(), 3);
        assert_eq!(stats.mean_confidence(), 60.0);
    }

    #[test]
    fn test_sheet_merge() {
        let mut a = StatsSheet::default();
        a.identification.record(95.0);
        let mut b = StatsSheet::default();
        b.identification.record(0.0);
        a.merge(&b);
        assert_eq!(a.identification.attempts(), 2);
        assert_eq!(a.identification.successful, 1);
    }
}
