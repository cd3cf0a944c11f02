//! Hybrid page extraction: deterministic first, LLM fallback when the
//! deterministic result looks weak, confidence-driven merge.

use serde::Serialize;
use tracing::{debug, info};

use crate::extract::{self, StatsSheet};
use crate::layout::PageLayout;
use crate::llm::{LlmExtraction, LlmExtractor, LlmService, LlmUsage};
use crate::models::{Complexity, ExtractionMethod, HybridConfig, ProcedureRecord};

/// Which source produced a page's final records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Deterministic,
    Llm,
    Merged,
}

/// Per-strategy page counters for a run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StrategyCounts {
    pub deterministic: u64,
    pub llm: u64,
    pub merged: u64,
}

impl StrategyCounts {
    fn record(&mut self, strategy: MergeStrategy) {
        match strategy {
            MergeStrategy::Deterministic => self.deterministic += 1,
            MergeStrategy::Llm => self.llm += 1,
            MergeStrategy::Merged => self.merged += 1,
        }
    }
}

/// One page's final extraction outcome.
#[derive(Debug, Clone)]
pub struct HybridPageResult {
    pub records: Vec<ProcedureRecord>,
    pub confidence: f32,
    pub strategy: MergeStrategy,
    pub errors: Vec<String>,
    pub stats: StatsSheet,
}

/// Hybrid extraction engine. Holds the LLM budget and strategy
/// counters for one run.
pub struct HybridEngine<S: LlmService> {
    config: HybridConfig,
    llm: Option<LlmExtractor<S>>,
    llm_calls: usize,
    strategies: StrategyCounts,
}

impl<S: LlmService> HybridEngine<S> {
    pub fn new(config: HybridConfig) -> Self {
        Self {
            config,
            llm: None,
            llm_calls: 0,
            strategies: StrategyCounts::default(),
        }
    }

    /// Attach an LLM service as the fallback extractor.
    pub fn with_llm(mut self, service: S) -> Self {
        let retries = self.config.max_retries.max(1);
        self.llm = Some(LlmExtractor::new(service, retries));
        self
    }

    pub fn strategy_counts(&self) -> StrategyCounts {
        self.strategies
    }

    pub fn llm_usage(&self) -> LlmUsage {
        self.llm
            .as_ref()
            .map(|l| l.usage())
            .unwrap_or_default()
    }

    /// Extract one page.
    ///
    /// The deterministic extractors always run first. The LLM is
    /// consulted only when it is configured, the per-batch budget is
    /// not exhausted, and the deterministic result is weak (confidence
    /// below threshold, too few records, or errors).
    pub async fn extract_page(
        &mut self,
        layout: &PageLayout,
        total_pages: Option<usize>,
    ) -> HybridPageResult {
        let mut errors = Vec::new();

        let deterministic = match extract::extract_page(layout) {
            Ok(extraction) => extraction,
            Err(e) => {
                errors.push(e.to_string());
                Default::default()
            }
        };

        if !self.should_use_llm(&deterministic.records, deterministic.confidence, &errors) {
            let result = HybridPageResult {
                confidence: deterministic.confidence,
                records: deterministic.records,
                strategy: MergeStrategy::Deterministic,
                errors,
                stats: deterministic.stats,
            };
            self.strategies.record(result.strategy);
            return result;
        }

        // Budget is spent per consultation, successful or not.
        self.llm_calls += 1;
        if self.config.cooldown_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.cooldown_ms)).await;
        }

        let llm_result = match self.llm.as_mut() {
            Some(llm) => {
                llm.extract_page(&layout.full_text(), layout.page_number, total_pages)
                    .await
            }
            // should_use_llm requires a configured service.
            None => LlmExtraction::default(),
        };

        let mut result = merge_results(
            deterministic.records,
            deterministic.confidence,
            llm_result,
            self.config.confidence_threshold,
        );
        errors.append(&mut result.errors);
        result.errors = errors;
        result.stats = deterministic.stats;

        info!(
            page = layout.page_number,
            records = result.records.len(),
            confidence = result.confidence,
            strategy = ?result.strategy,
            "hybrid extraction complete"
        );
        self.strategies.record(result.strategy);
        result
    }

    fn should_use_llm(&self, records: &[ProcedureRecord], confidence: f32, errors: &[String]) -> bool {
        if self.llm.is_none() {
            return false;
        }
        if self.llm_calls >= self.config.max_llm_pages_per_batch {
            debug!(
                budget = self.config.max_llm_pages_per_batch,
                "llm page budget exhausted"
            );
            return false;
        }

        confidence < self.config.confidence_threshold
            || records.len() < self.config.min_procedures
            || !errors.is_empty()
    }
}

fn merge_results(
    deterministic: Vec<ProcedureRecord>,
    deterministic_confidence: f32,
    llm: LlmExtraction,
    confidence_threshold: f32,
) -> HybridPageResult {
    // Strategy 1: the LLM is clearly better, take it wholesale.
    if llm.confidence > deterministic_confidence + 20.0 {
        return HybridPageResult {
            confidence: llm.confidence,
            records: llm.records,
            strategy: MergeStrategy::Llm,
            errors: llm.errors,
            stats: StatsSheet::default(),
        };
    }

    // Strategy 2: the deterministic result already clears the bar.
    if deterministic_confidence >= confidence_threshold {
        return HybridPageResult {
            confidence: deterministic_confidence,
            records: deterministic,
            strategy: MergeStrategy::Deterministic,
            errors: llm.errors,
            stats: StatsSheet::default(),
        };
    }

    // Strategy 3: field-level merge keyed by code.
    let mut records = deterministic;
    let mut index: std::collections::HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.code.clone(), i))
        .collect();

    for llm_record in llm.records {
        match index.get(&llm_record.code) {
            Some(&i) => merge_record(&mut records[i], llm_record),
            None => {
                index.insert(llm_record.code.clone(), records.len());
                records.push(llm_record);
            }
        }
    }

    HybridPageResult {
        confidence: deterministic_confidence.max(llm.confidence),
        records,
        strategy: MergeStrategy::Merged,
        errors: llm.errors,
        stats: StatsSheet::default(),
    }
}

/// Fill the deterministic record's empty fields from the LLM record.
/// Populated deterministic fields always win.
fn merge_record(base: &mut ProcedureRecord, llm: ProcedureRecord) {
    if base.description.is_empty() {
        base.description = llm.description;
    }
    if matches!(base.classification.complexity, Complexity::Unknown) {
        base.classification.complexity = llm.classification.complexity;
    }
    if base.classification.modality.is_empty() {
        base.classification.modality = llm.classification.modality;
    }
    if base.classification.registration_instrument.is_empty() {
        base.classification.registration_instrument = llm.classification.registration_instrument;
    }
    if base.classification.financing.is_empty() {
        base.classification.financing = llm.classification.financing;
    }

    if base.ambulatory_values.service.is_zero() {
        base.ambulatory_values.service = llm.ambulatory_values.service;
    }
    if base.ambulatory_values.total.is_zero() {
        base.ambulatory_values.total = llm.ambulatory_values.total;
    }
    if base.hospital_values.service.is_zero() {
        base.hospital_values.service = llm.hospital_values.service;
    }
    if base.hospital_values.professional.is_zero() {
        base.hospital_values.professional = llm.hospital_values.professional;
    }
    if base.hospital_values.total.is_zero() {
        base.hospital_values.total = llm.hospital_values.total;
    }

    if base.operational_limits.max_quantity == 0 {
        base.operational_limits.max_quantity = llm.operational_limits.max_quantity;
    }
    if base.operational_limits.average_stay.is_zero() {
        base.operational_limits.average_stay = llm.operational_limits.average_stay;
    }
    if base.operational_limits.points == 0 {
        base.operational_limits.points = llm.operational_limits.points;
    }

    for code in llm.additional.occupation_codes {
        if !base.additional.occupation_codes.contains(&code) {
            base.additional.occupation_codes.push(code);
        }
    }
    for code in llm.additional.diagnosis_codes {
        if !base.additional.diagnosis_codes.contains(&code) {
            base.additional.diagnosis_codes.push(code);
        }
    }
    if base.additional.credentialing.is_empty() {
        base.additional.credentialing = llm.additional.credentialing;
    }

    base.extraction_confidence = base.extraction_confidence.max(llm.extraction_confidence);
    base.extraction_method = ExtractionMethod::Merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TextFragment;
    use crate::llm::client::MockLlm;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn fragment_lines(lines: &[&str]) -> PageLayout {
        let fragments = lines
            .iter()
            .enumerate()
            .map(|(i, line)| TextFragment::new(*line, 50.0, 800.0 - (i as f32) * 20.0))
            .collect();
        PageLayout::new(1, fragments)
    }

    fn strong_page() -> PageLayout {
        fragment_lines(&[
            "03.01.01.004-8 Procedimento: Consulta de profissionais de nível superior",
            "Complexidade: Atenção Básica",
            "Tipo de Financiamento: 01 - Atenção Básica (PAB)",
            "Origem: H.32013035",
            "Modalidade: 01 - Ambulatorial",
            "Instrumento de Registro: 01 - BPA (Consolidado)",
            "Especialidade do Leito: -",
            "Valor Ambulatorial S.A.: 6,30",
            "Valor Ambulatorial Total: 6,30",
            "Valor Hospitalar S.H.: 1,00",
            "Valor Hospitalar S.P.: 1,00",
            "Valor Hospitalar Total: 2,00",
            "Quantidade Máxima: 2",
            "Média Permanência: 1,0",
            "Pontos: 10",
            "CBO: 2231-05",
            "CID: A15.0",
            "Habilitação: 0101 - Atenção básica",
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn test_confident_page_skips_llm() {
        let mock = MockLlm::with_response("{}");
        let mut engine = HybridEngine::new(HybridConfig::default()).with_llm(mock);

        let result = engine.extract_page(&strong_page(), None).await;
        assert_eq!(result.strategy, MergeStrategy::Deterministic);
        assert!(result.confidence >= 75.0);
        assert_eq!(engine.llm.as_ref().unwrap().usage().calls, 0);
        assert_eq!(engine.strategy_counts().deterministic, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_page_falls_back_to_llm_wholesale() {
        let payload = r#"{"procedures": [{
            "code": "03.01.01.004-8",
            "description": "CONSULTA DE PROFISSIONAIS DE NÍVEL SUPERIOR",
            "complexity": "ATENÇÃO BÁSICA",
            "modality": "01 - Ambulatorial",
            "valueAmb": 6.30
        }]}"#;
        let mock = MockLlm::with_response(payload);
        let mut engine = HybridEngine::new(HybridConfig::default()).with_llm(mock);

        let layout = fragment_lines(&["Tabela Unificada", "cabeçalho sem procedimentos"]);
        let result = engine.extract_page(&layout, None).await;

        assert_eq!(result.strategy, MergeStrategy::Llm);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].extraction_method, ExtractionMethod::Llm);
        assert_eq!(engine.strategy_counts().llm, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_level_merge() {
        // Deterministic side: mid-confidence record without hospital
        // values. The LLM side scores close enough that neither wins
        // wholesale.
        let layout = fragment_lines(&[
            "02.02.01.012-9 Procedimento: Dosagem de creatinina",
            "Complexidade: Atenção Básica",
            "Tipo de Financiamento: 01 - Atenção Básica (PAB)",
            "Origem: A.02020112",
            "Modalidade: 01 - Ambulatorial",
            "Valor Ambulatorial S.A.: 1,85",
            "Valor Ambulatorial Total: 1,85",
            "Quantidade Máxima: 1",
            "Média Permanência: 1,0",
            "Pontos: 5",
        ]);
        let payload = r#"{"procedures": [{
            "code": "02.02.01.012-9",
            "description": "DOSAGEM",
            "financing": "06 - MAC",
            "valueHosp": 12.00,
            "valueProf": 3.00,
            "valueHospTotal": 15.00
        }]}"#;
        let mock = MockLlm::with_response(payload);
        let mut engine = HybridEngine::new(HybridConfig::default()).with_llm(mock);

        let result = engine.extract_page(&layout, None).await;
        assert_eq!(result.strategy, MergeStrategy::Merged);
        assert_eq!(result.records.len(), 1);

        let record = &result.records[0];
        assert_eq!(record.extraction_method, ExtractionMethod::Merged);
        // Deterministic fields win when populated.
        assert_eq!(
            record.classification.financing,
            "01 - Atenção Básica (PAB)"
        );
        // Empty deterministic fields are filled from the LLM.
        assert_eq!(
            record.hospital_values.total,
            Decimal::from_str("15.00").unwrap()
        );
        assert_eq!(engine.strategy_counts().merged, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_forces_deterministic() {
        let mock = MockLlm::with_response("{}");
        let config = HybridConfig {
            max_llm_pages_per_batch: 0,
            ..HybridConfig::default()
        };
        let mut engine = HybridEngine::new(config).with_llm(mock);

        let layout = fragment_lines(&["página sem procedimentos"]);
        let result = engine.extract_page(&layout, None).await;

        assert_eq!(result.strategy, MergeStrategy::Deterministic);
        assert!(result.records.is_empty());
        assert_eq!(engine.llm.as_ref().unwrap().usage().calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_appends_new_codes_from_llm() {
        let deterministic = vec![ProcedureRecord::new("01.01.01.001-2", "CONSULTA BÁSICA")];
        let llm_record = ProcedureRecord::new("02.02.02.002-4", "PROCEDIMENTO NOVO");
        let llm = LlmExtraction {
            records: vec![llm_record],
            confidence: 50.0,
            errors: Vec::new(),
        };

        let result = merge_results(deterministic, 40.0, llm, 75.0);
        assert_eq!(result.strategy, MergeStrategy::Merged);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.confidence, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_llm_failure_keeps_deterministic_result() {
        let mock = MockLlm::new(vec![Err(crate::error::LlmError::Transport(
            "down".to_string(),
        ))]);
        let mut engine = HybridEngine::new(HybridConfig::default()).with_llm(mock);

        let layout = fragment_lines(&[
            "02.02.01.012-9 Procedimento: Dosagem de creatinina",
            "Valor Ambulatorial Total: 1,85",
        ]);
        let result = engine.extract_page(&layout, None).await;

        // LLM produced nothing; the deterministic record survives with
        // the failure recorded.
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.strategy, MergeStrategy::Merged);
        assert!(result.errors.iter().any(|e| e.contains("retries exhausted")));
    }
}
