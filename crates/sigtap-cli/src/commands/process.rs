//! Process command - extract procedure records from a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use sigtap_core::{
    CancellationToken, DocumentProcessor, ExtractionMethod, GeminiClient, PageSource,
    ProcedureRecord, ProcessingResult,
};

use super::{load_layout, JsonPageSource};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input document layout file (JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Skip the LLM fallback even when a credential is configured
    #[arg(long)]
    no_llm: bool,

    /// Show extraction confidence and usage summary
    #[arg(long)]
    show_confidence: bool,

    /// Validate extracted records
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = super::load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pages = load_layout(&args.input)?;
    let mut source = JsonPageSource::new(pages);

    let pb = ProgressBar::new(source.total_pages() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} pages {msg}")
            .unwrap()
            .progress_chars("##-"),
    );

    let mut processor: DocumentProcessor<GeminiClient> = DocumentProcessor::new(config.clone());
    if config.llm_configured() && !args.no_llm {
        let client = GeminiClient::new(&config.llm)
            .map_err(|e| anyhow::anyhow!("Failed to set up LLM service: {}", e))?;
        processor = processor.with_llm(client);
        debug!("LLM fallback enabled with model {}", config.llm.model);
    }

    // Ctrl-C cancels between pages and keeps the partial result.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let result = processor
        .process(&mut source, &cancel, |progress| {
            pb.set_position(progress.current_page as u64);
            pb.set_message(format!("{} records", progress.records_so_far));
        })
        .await;

    pb.finish_with_message("Done");

    if !result.success {
        anyhow::bail!("{}", result.message);
    }

    // Validate if requested
    if args.validate {
        let mut total_issues = 0;
        for record in &result.records {
            let issues = record.validate();
            if !issues.is_empty() {
                if total_issues == 0 {
                    eprintln!("{}", style("Validation issues:").yellow());
                }
                total_issues += issues.len();
                for issue in issues {
                    eprintln!("  - {}: {}", record.code, issue);
                }
            }
        }
        if total_issues == 0 {
            eprintln!("{} All records valid", style("✓").green());
        }
    }

    // Format output
    let output = format_result(&result, args.format)?;

    // Write output
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        print_summary(&result);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn print_summary(result: &ProcessingResult) {
    let summary = &result.summary;
    println!();
    println!(
        "{} {} records from {} pages, mean confidence {:.1}%",
        style("ℹ").blue(),
        result.records.len(),
        result.total_processed,
        summary.mean_confidence
    );
    println!(
        "{} Strategies: {} deterministic, {} llm, {} merged",
        style("ℹ").blue(),
        summary.strategies.deterministic,
        summary.strategies.llm,
        summary.strategies.merged
    );
    if summary.llm_usage.calls > 0 {
        println!(
            "{} LLM usage: {} calls, ~{} tokens, ~${:.4}",
            style("ℹ").blue(),
            summary.llm_usage.calls,
            summary.llm_usage.estimated_tokens,
            summary.llm_usage.estimated_cost_usd
        );
    }
    if !summary.page_errors.is_empty() {
        println!("{}", style("Page errors:").yellow());
        for (page, error) in &summary.page_errors {
            println!("  - page {}: {}", page, error);
        }
    }
}

pub fn method_label(method: ExtractionMethod) -> &'static str {
    match method {
        ExtractionMethod::Deterministic => "deterministic",
        ExtractionMethod::Llm => "llm",
        ExtractionMethod::Merged => "merged",
    }
}

fn format_result(result: &ProcessingResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&result.records)?),
        OutputFormat::Csv => format_csv(&result.records),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

pub fn format_csv(records: &[ProcedureRecord]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "code",
        "description",
        "complexity",
        "modality",
        "financing",
        "ambulatory_service",
        "ambulatory_total",
        "hospital_service",
        "hospital_professional",
        "hospital_total",
        "max_quantity",
        "average_stay",
        "points",
        "confidence",
        "method",
    ])?;

    for record in records {
        wtr.write_record([
            record.code.as_str(),
            record.description.as_str(),
            record.classification.complexity.display(),
            record.classification.modality.as_str(),
            record.classification.financing.as_str(),
            &record.ambulatory_values.service.to_string(),
            &record.ambulatory_values.total.to_string(),
            &record.hospital_values.service.to_string(),
            &record.hospital_values.professional.to_string(),
            &record.hospital_values.total.to_string(),
            &record.operational_limits.max_quantity.to_string(),
            &record.operational_limits.average_stay.to_string(),
            &record.operational_limits.points.to_string(),
            &format!("{:.1}", record.extraction_confidence),
            method_label(record.extraction_method),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ProcessingResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", result.message));
    output.push('\n');

    for record in &result.records {
        output.push_str(&format!("{}  {}\n", record.code, record.description));
        if record.classification.complexity != sigtap_core::Complexity::Unknown {
            output.push_str(&format!(
                "  Complexity: {}\n",
                record.classification.complexity.display()
            ));
        }
        if !record.classification.financing.is_empty() {
            output.push_str(&format!(
                "  Financing:  {}\n",
                record.classification.financing
            ));
        }
        output.push_str(&format!(
            "  Ambulatory: {} / {}   Hospital: {} + {} = {}\n",
            record.ambulatory_values.service,
            record.ambulatory_values.total,
            record.hospital_values.service,
            record.hospital_values.professional,
            record.hospital_values.total,
        ));
        output.push_str(&format!(
            "  Confidence: {:.1}% ({})\n",
            record.extraction_confidence,
            method_label(record.extraction_method)
        ));
        output.push('\n');
    }

    let buckets = &result.summary.by_complexity;
    output.push_str("By complexity:\n");
    output.push_str(&format!("  Atenção básica: {}\n", buckets.attention_basic));
    output.push_str(&format!("  Baixa:          {}\n", buckets.low));
    output.push_str(&format!("  Média:          {}\n", buckets.medium));
    output.push_str(&format!("  Alta:           {}\n", buckets.high));
    if buckets.other + buckets.unknown > 0 {
        output.push_str(&format!(
            "  Outros:         {}\n",
            buckets.other + buckets.unknown
        ));
    }

    output
}
