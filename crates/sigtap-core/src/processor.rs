//! Whole-document processing: strict in-order page loop, batching,
//! progress reporting and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::error::SigtapError;
use crate::extract::StatsSheet;
use crate::hybrid::{HybridEngine, StrategyCounts};
use crate::layout::PageLayout;
use crate::llm::{LlmService, LlmUsage};
use crate::models::{Complexity, ProcedureRecord, SigtapConfig};

/// Supplies page layouts for one document.
///
/// A failure here is the only condition fatal to a run; everything
/// else degrades to a per-page diagnostic.
pub trait PageSource {
    fn total_pages(&self) -> usize;

    fn page(
        &mut self,
        page_number: u32,
    ) -> impl std::future::Future<Output = crate::error::Result<PageLayout>> + Send;
}

/// Cooperative cancellation flag, checked between pages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Progress snapshot handed to the progress callback after each page.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub current_page: usize,
    pub total_pages: usize,
    pub records_so_far: usize,
    /// Pages completed as a percentage of the document, 0-100.
    pub percent: f32,
}

/// Record counts per complexity bucket.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ComplexityBuckets {
    pub attention_basic: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub other: usize,
    pub unknown: usize,
}

impl ComplexityBuckets {
    fn count(&mut self, complexity: &Complexity) {
        match complexity {
            Complexity::AttentionBasic => self.attention_basic += 1,
            Complexity::Low => self.low += 1,
            Complexity::Medium => self.medium += 1,
            Complexity::High => self.high += 1,
            Complexity::Other(_) => self.other += 1,
            Complexity::Unknown => self.unknown += 1,
        }
    }
}

/// Run-level diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingSummary {
    pub by_complexity: ComplexityBuckets,
    pub extractor_stats: StatsSheet,
    pub strategies: StrategyCounts,
    pub llm_usage: LlmUsage,
    /// Non-fatal per-page errors as (page, message).
    pub page_errors: Vec<(u32, String)>,
    pub mean_confidence: f32,
}

/// Outcome of one document run.
#[derive(Debug)]
pub struct ProcessingResult {
    pub success: bool,
    pub message: String,
    pub records: Vec<ProcedureRecord>,
    pub total_processed: usize,
    pub total_pages: usize,
    pub summary: ProcessingSummary,
}

/// Batched, cancellable page-by-page document processor.
pub struct DocumentProcessor<S: LlmService> {
    config: SigtapConfig,
    engine: HybridEngine<S>,
}

impl<S: LlmService> DocumentProcessor<S> {
    pub fn new(config: SigtapConfig) -> Self {
        let engine = HybridEngine::new(config.hybrid.clone());
        Self { config, engine }
    }

    /// Attach an LLM fallback service.
    pub fn with_llm(mut self, service: S) -> Self {
        self.engine = self.engine.with_llm(service);
        self
    }

    /// Process a whole document in strict page order.
    ///
    /// Pages run in batches with a cooperative yield between pages so
    /// a caller on the same runtime stays responsive. `progress` is
    /// invoked after every page. Cancellation is honored between pages
    /// and returns the partial result.
    pub async fn process<P: PageSource>(
        &mut self,
        source: &mut P,
        cancel: &CancellationToken,
        mut progress: impl FnMut(Progress),
    ) -> ProcessingResult {
        let mut total_pages = source.total_pages();
        if self.config.processing.max_pages > 0 {
            total_pages = total_pages.min(self.config.processing.max_pages);
        }
        let batch_size = self.config.batch_size_for(total_pages).max(1);

        info!(total_pages, batch_size, "document processing started");

        let mut records: Vec<ProcedureRecord> = Vec::new();
        let mut summary = ProcessingSummary::default();
        let mut confidence_sum = 0.0f64;
        let mut processed = 0usize;
        let mut cancelled = false;

        'batches: for batch_start in (1..=total_pages).step_by(batch_size) {
            let batch_end = (batch_start + batch_size - 1).min(total_pages);

            for page_number in batch_start..=batch_end {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'batches;
                }

                let layout = match source.page(page_number as u32).await {
                    Ok(layout) => layout,
                    Err(e) => {
                        let message = match e {
                            SigtapError::Document(msg) => msg,
                            other => other.to_string(),
                        };
                        error!(page = page_number, error = %message, "page source failed");
                        return ProcessingResult {
                            success: false,
                            message: format!("page source failed at page {}: {}", page_number, message),
                            records,
                            total_processed: processed,
                            total_pages,
                            summary,
                        };
                    }
                };

                let page = self.engine.extract_page(&layout, Some(total_pages)).await;
                for error in &page.errors {
                    summary.page_errors.push((page_number as u32, error.clone()));
                }

                summary.extractor_stats.merge(&page.stats);
                confidence_sum += f64::from(page.confidence);
                for record in &page.records {
                    summary.by_complexity.count(&record.classification.complexity);
                }
                records.extend(page.records);
                processed += 1;

                progress(Progress {
                    current_page: page_number,
                    total_pages,
                    records_so_far: records.len(),
                    percent: (page_number as f32 / total_pages as f32) * 100.0,
                });

                // Keep the runtime responsive on large documents.
                tokio::task::yield_now().await;
            }
        }

        summary.strategies = self.engine.strategy_counts();
        summary.llm_usage = self.engine.llm_usage();
        summary.mean_confidence = if processed > 0 {
            (confidence_sum / processed as f64) as f32
        } else {
            0.0
        };

        let message = if cancelled {
            format!(
                "processing cancelled after {} of {} pages, {} records extracted",
                processed,
                total_pages,
                records.len()
            )
        } else {
            format!(
                "processed {} pages, {} records extracted",
                processed,
                records.len()
            )
        };
        info!(processed, records = records.len(), cancelled, "document processing finished");

        ProcessingResult {
            success: true,
            message,
            records,
            total_processed: processed,
            total_pages,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::layout::TextFragment;
    use crate::llm::client::MockLlm;
    use pretty_assertions::assert_eq;

    /// In-memory page source over canned layouts.
    struct VecSource {
        pages: Vec<PageLayout>,
        fail_at: Option<u32>,
    }

    impl VecSource {
        fn new(pages: Vec<PageLayout>) -> Self {
            Self {
                pages,
                fail_at: None,
            }
        }
    }

    impl PageSource for VecSource {
        fn total_pages(&self) -> usize {
            self.pages.len()
        }

        async fn page(&mut self, page_number: u32) -> Result<PageLayout> {
            if self.fail_at == Some(page_number) {
                return Err(SigtapError::Document(format!(
                    "unreadable page {}",
                    page_number
                )));
            }
            Ok(self.pages[(page_number - 1) as usize].clone())
        }
    }

    fn procedure_page(page_number: u32, code: &str, complexity: &str) -> PageLayout {
        let lines = [
            format!("{} Procedimento: Procedimento de teste número {}", code, page_number),
            format!("Complexidade: {}", complexity),
            "Tipo de Financiamento: 06 - Média e Alta Complexidade (MAC)".to_string(),
            "Origem: H.32013035".to_string(),
            "Modalidade: 02 - Hospitalar".to_string(),
            "Instrumento de Registro: 03 - AIH (Proc. Principal)".to_string(),
            "Especialidade do Leito: Cirúrgico".to_string(),
            "Valor Ambulatorial S.A.: 6,30".to_string(),
            "Valor Ambulatorial Total: 6,30".to_string(),
            "Valor Hospitalar S.H.: 120,50".to_string(),
            "Valor Hospitalar S.P.: 78,90".to_string(),
            "Valor Hospitalar Total: 199,40".to_string(),
            "Quantidade Máxima: 2".to_string(),
            "Média Permanência: 4,5".to_string(),
            "Pontos: 180".to_string(),
            "CBO: 2231-05".to_string(),
            "CID: A15.0".to_string(),
        ];
        let fragments = lines
            .iter()
            .enumerate()
            .map(|(i, line)| TextFragment::new(line.clone(), 50.0, 800.0 - (i as f32) * 20.0))
            .collect();
        PageLayout::new(page_number, fragments)
    }

    fn processor() -> DocumentProcessor<MockLlm> {
        DocumentProcessor::new(SigtapConfig::default())
    }

    #[tokio::test]
    async fn test_processes_pages_in_order() {
        let mut source = VecSource::new(vec![
            procedure_page(1, "03.01.01.004-8", "Atenção Básica"),
            procedure_page(2, "04.08.05.012-7", "Alta Complexidade"),
        ]);

        let mut seen_pages = Vec::new();
        let mut seen_percents = Vec::new();
        let result = processor()
            .process(&mut source, &CancellationToken::new(), |p| {
                seen_pages.push(p.current_page);
                seen_percents.push(p.percent);
            })
            .await;

        assert!(result.success);
        assert_eq!(seen_pages, vec![1, 2]);
        assert_eq!(seen_percents, vec![50.0, 100.0]);
        assert_eq!(result.total_processed, 2);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].code, "03.01.01.004-8");
        assert_eq!(result.records[1].code, "04.08.05.012-7");
        assert_eq!(result.summary.by_complexity.attention_basic, 1);
        assert_eq!(result.summary.by_complexity.high, 1);
        assert!(result.summary.mean_confidence > 0.0);
    }

    #[tokio::test]
    async fn test_source_failure_is_fatal_with_partials() {
        let mut source = VecSource::new(vec![
            procedure_page(1, "03.01.01.004-8", "Atenção Básica"),
            procedure_page(2, "04.08.05.012-7", "Alta Complexidade"),
        ]);
        source.fail_at = Some(2);

        let result = processor()
            .process(&mut source, &CancellationToken::new(), |_| {})
            .await;

        assert!(!result.success);
        assert!(result.message.contains("page source failed at page 2"));
        // Work done before the failure is preserved.
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.total_processed, 1);
    }

    #[tokio::test]
    async fn test_cancellation_returns_partials() {
        let mut source = VecSource::new(vec![
            procedure_page(1, "03.01.01.004-8", "Atenção Básica"),
            procedure_page(2, "04.08.05.012-7", "Alta Complexidade"),
        ]);

        let cancel = CancellationToken::new();
        let cancel_after_first = cancel.clone();
        let result = processor()
            .process(&mut source, &cancel, move |p| {
                if p.current_page == 1 {
                    cancel_after_first.cancel();
                }
            })
            .await;

        assert!(result.success);
        assert!(result.message.contains("cancelled"));
        assert_eq!(result.total_processed, 1);
        assert_eq!(result.records.len(), 1);
    }

    #[tokio::test]
    async fn test_max_pages_cap() {
        let mut source = VecSource::new(vec![
            procedure_page(1, "03.01.01.004-8", "Atenção Básica"),
            procedure_page(2, "04.08.05.012-7", "Alta Complexidade"),
        ]);

        let mut config = SigtapConfig::default();
        config.processing.max_pages = 1;
        let mut processor: DocumentProcessor<MockLlm> = DocumentProcessor::new(config);
        let result = processor
            .process(&mut source, &CancellationToken::new(), |_| {})
            .await;

        assert_eq!(result.total_pages, 1);
        assert_eq!(result.total_processed, 1);
    }

    #[tokio::test]
    async fn test_empty_pages_record_no_procedures_but_succeed() {
        let mut source = VecSource::new(vec![PageLayout::new(
            1,
            vec![TextFragment::new("índice", 10.0, 700.0)],
        )]);

        let result = processor()
            .process(&mut source, &CancellationToken::new(), |_| {})
            .await;

        assert!(result.success);
        assert!(result.records.is_empty());
        assert_eq!(result.summary.mean_confidence, 0.0);
    }
}
