//! Batch processing command for multiple document layout files.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use sigtap_core::models::SigtapConfig;
use sigtap_core::{CancellationToken, DocumentProcessor, GeminiClient, ProcessingResult};

use super::process::{format_csv, method_label};
use super::{load_layout, JsonPageSource};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: super::process::OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Skip the LLM fallback even when a credential is configured
    #[arg(long)]
    no_llm: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    outcome: Option<ProcessingResult>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = super::load_config(config_path)?;

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    // Create output directory if specified
    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let mut results = Vec::with_capacity(files.len());

    for path in files {
        if cancel.is_cancelled() {
            warn!("Batch cancelled before {}", path.display());
            break;
        }

        let file_start = Instant::now();
        let outcome = process_single_file(&path, &config, &args, &cancel).await;
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                results.push(FileResult {
                    path: path.clone(),
                    outcome: Some(result),
                    error: None,
                    processing_time_ms,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(FileResult {
                        path: path.clone(),
                        outcome: None,
                        error: Some(error_msg),
                        processing_time_ms,
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed: {}", error_msg);
                }
            }
        }

        overall_pb.inc(1);
    }

    overall_pb.finish_with_message("Complete");

    // Write per-file outputs
    let successful: Vec<_> = results.iter().filter(|r| r.outcome.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    for result in &successful {
        if let (Some(outcome), Some(output_dir)) = (&result.outcome, &args.output_dir) {
            let output_name = result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document");

            let extension = match args.format {
                super::process::OutputFormat::Json => "json",
                super::process::OutputFormat::Csv => "csv",
                super::process::OutputFormat::Text => "txt",
            };

            let output_path = output_dir.join(format!("{}.{}", output_name, extension));

            let content = match args.format {
                super::process::OutputFormat::Json => serde_json::to_string(&outcome.records)?,
                super::process::OutputFormat::Csv => format_csv(&outcome.records)?,
                super::process::OutputFormat::Text => format_file_text(outcome),
            };

            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    // Generate summary if requested
    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    // Print summary
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn process_single_file(
    path: &PathBuf,
    config: &SigtapConfig,
    args: &BatchArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<ProcessingResult> {
    let pages = load_layout(path)?;
    let mut source = JsonPageSource::new(pages);

    // Each document gets a fresh processor so the per-batch LLM budget
    // and strategy counters do not leak across files.
    let mut processor: DocumentProcessor<GeminiClient> = DocumentProcessor::new(config.clone());
    if config.llm_configured() && !args.no_llm {
        let client = GeminiClient::new(&config.llm)
            .map_err(|e| anyhow::anyhow!("Failed to set up LLM service: {}", e))?;
        processor = processor.with_llm(client);
    }

    let result = processor.process(&mut source, cancel, |_| {}).await;
    if !result.success {
        anyhow::bail!("{}", result.message);
    }
    Ok(result)
}

fn write_summary(path: &PathBuf, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "pages",
        "records",
        "mean_confidence",
        "llm_calls",
        "estimated_cost_usd",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(outcome) = &result.outcome {
            wtr.write_record([
                filename,
                "success",
                &outcome.total_processed.to_string(),
                &outcome.records.len().to_string(),
                &format!("{:.1}", outcome.summary.mean_confidence),
                &outcome.summary.llm_usage.calls.to_string(),
                &format!("{:.4}", outcome.summary.llm_usage.estimated_cost_usd),
                &result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn format_file_text(outcome: &ProcessingResult) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n\n", outcome.message));
    for record in &outcome.records {
        output.push_str(&format!(
            "{}  {}  {:.1}% ({})\n",
            record.code,
            record.description,
            record.extraction_confidence,
            method_label(record.extraction_method)
        ));
    }
    output
}
