//! Config command - inspect and edit the pipeline configuration.
//!
//! Keys are the typed fields of `SigtapConfig`, addressed as
//! `section.field` (for example `hybrid.confidence_threshold`). Every
//! write is parsed into the real field type and the resulting
//! configuration is validated before it is saved, so a config file on
//! disk is always one the pipeline will accept.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use sigtap_core::models::SigtapConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init(InitArgs),

    /// Print one configuration value
    Get {
        /// Key as section.field, e.g. "hybrid.confidence_threshold"
        key: String,
    },

    /// Change one configuration value and save the file
    Set {
        /// Key as section.field
        key: String,
        /// New value, parsed as the field's type
        value: String,
    },

    /// Show where the configuration file lives
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for the configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, config_override: Option<&str>) -> anyhow::Result<()> {
    let path = config_override
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => show(&path),
        ConfigCommand::Init(init_args) => init(init_args, &path),
        ConfigCommand::Get { key } => get(&path, &key),
        ConfigCommand::Set { key, value } => set(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sigtap")
        .join("config.json")
}

/// Load the file if present, defaults otherwise.
fn load(path: &std::path::Path) -> anyhow::Result<SigtapConfig> {
    if path.exists() {
        Ok(SigtapConfig::from_file(path)?)
    } else {
        Ok(SigtapConfig::default())
    }
}

fn show(path: &std::path::Path) -> anyhow::Result<()> {
    if !path.exists() {
        println!(
            "{} No config file at {}, showing defaults.",
            style("ℹ").blue(),
            path.display()
        );
    }
    let config = load(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    for issue in config.validate() {
        println!("{} {}", style("warning:").yellow(), issue);
    }

    Ok(())
}

fn init(args: InitArgs, default_path: &std::path::Path) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(|| default_path.to_path_buf());

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    SigtapConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn get(path: &std::path::Path, key: &str) -> anyhow::Result<()> {
    println!("{}", read_key(&load(path)?, key)?);
    Ok(())
}

fn set(path: &std::path::Path, key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = load(path)?;
    write_key(&mut config, key, value)?;

    let issues = config.validate();
    if !issues.is_empty() {
        anyhow::bail!("refusing to save an invalid config:\n  {}", issues.join("\n  "));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        read_key(&config, key)?
    );

    Ok(())
}

fn show_path(path: &std::path::Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'sigtap config init' to create a configuration file.");
    }

    Ok(())
}

/// Read one field by its `section.field` key.
fn read_key(config: &SigtapConfig, key: &str) -> anyhow::Result<String> {
    let value = match key {
        "processing.batch_size" => config.processing.batch_size.to_string(),
        "processing.large_batch_size" => config.processing.large_batch_size.to_string(),
        "processing.large_document_pages" => config.processing.large_document_pages.to_string(),
        "processing.max_pages" => config.processing.max_pages.to_string(),
        "hybrid.confidence_threshold" => config.hybrid.confidence_threshold.to_string(),
        "hybrid.min_procedures" => config.hybrid.min_procedures.to_string(),
        "hybrid.max_retries" => config.hybrid.max_retries.to_string(),
        "hybrid.max_llm_pages_per_batch" => config.hybrid.max_llm_pages_per_batch.to_string(),
        "hybrid.cooldown_ms" => config.hybrid.cooldown_ms.to_string(),
        "llm.api_key" => config.llm.api_key.clone(),
        "llm.model" => config.llm.model.clone(),
        "llm.base_url" => config.llm.base_url.clone(),
        "llm.timeout_secs" => config.llm.timeout_secs.to_string(),
        "llm.temperature" => config.llm.temperature.to_string(),
        "llm.max_output_tokens" => config.llm.max_output_tokens.to_string(),
        other => anyhow::bail!("unknown configuration key: {}", other),
    };
    Ok(value)
}

/// Write one field by its `section.field` key, parsing `value` into
/// the field's type.
fn write_key(config: &mut SigtapConfig, key: &str, value: &str) -> anyhow::Result<()> {
    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
    where
        T::Err: std::fmt::Display,
    {
        value
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value {:?} for {}: {}", value, key, e))
    }

    match key {
        "processing.batch_size" => config.processing.batch_size = parse(key, value)?,
        "processing.large_batch_size" => config.processing.large_batch_size = parse(key, value)?,
        "processing.large_document_pages" => {
            config.processing.large_document_pages = parse(key, value)?
        }
        "processing.max_pages" => config.processing.max_pages = parse(key, value)?,
        "hybrid.confidence_threshold" => {
            config.hybrid.confidence_threshold = parse(key, value)?
        }
        "hybrid.min_procedures" => config.hybrid.min_procedures = parse(key, value)?,
        "hybrid.max_retries" => config.hybrid.max_retries = parse(key, value)?,
        "hybrid.max_llm_pages_per_batch" => {
            config.hybrid.max_llm_pages_per_batch = parse(key, value)?
        }
        "hybrid.cooldown_ms" => config.hybrid.cooldown_ms = parse(key, value)?,
        "llm.api_key" => config.llm.api_key = value.to_string(),
        "llm.model" => config.llm.model = value.to_string(),
        "llm.base_url" => config.llm.base_url = value.to_string(),
        "llm.timeout_secs" => config.llm.timeout_secs = parse(key, value)?,
        "llm.temperature" => config.llm.temperature = parse(key, value)?,
        "llm.max_output_tokens" => config.llm.max_output_tokens = parse(key, value)?,
        other => anyhow::bail!("unknown configuration key: {}", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_key_parses_into_field_type() {
        let mut config = SigtapConfig::default();
        write_key(&mut config, "hybrid.confidence_threshold", "82.5").unwrap();
        write_key(&mut config, "processing.batch_size", "25").unwrap();
        write_key(&mut config, "llm.model", "gemini-1.5-pro").unwrap();

        assert_eq!(config.hybrid.confidence_threshold, 82.5);
        assert_eq!(config.processing.batch_size, 25);
        assert_eq!(config.llm.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_write_key_rejects_non_numeric_threshold() {
        let mut config = SigtapConfig::default();
        let err = write_key(&mut config, "hybrid.confidence_threshold", "alta")
            .unwrap_err()
            .to_string();
        assert!(err.contains("hybrid.confidence_threshold"));
        assert!(err.contains("alta"));
        // Untouched on failure.
        assert_eq!(config.hybrid.confidence_threshold, 75.0);
    }

    #[test]
    fn test_write_key_rejects_unknown_key() {
        let mut config = SigtapConfig::default();
        let err = write_key(&mut config, "hybrid.no_such_field", "1")
            .unwrap_err()
            .to_string();
        assert!(err.contains("unknown configuration key"));
    }

    #[test]
    fn test_out_of_range_threshold_fails_validation() {
        let mut config = SigtapConfig::default();
        write_key(&mut config, "hybrid.confidence_threshold", "140").unwrap();
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.contains("hybrid.confidence_threshold")));
    }

    #[test]
    fn test_read_key_round_trips_written_value() {
        let mut config = SigtapConfig::default();
        write_key(&mut config, "hybrid.cooldown_ms", "750").unwrap();
        assert_eq!(read_key(&config, "hybrid.cooldown_ms").unwrap(), "750");
    }

    #[test]
    fn test_set_refuses_invalid_config_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let err = set(&path, "hybrid.confidence_threshold", "140")
            .unwrap_err()
            .to_string();
        assert!(err.contains("refusing to save"));
        assert!(!path.exists());
    }

    #[test]
    fn test_set_persists_valid_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        set(&path, "hybrid.confidence_threshold", "60").unwrap();
        let config = SigtapConfig::from_file(&path).unwrap();
        assert_eq!(config.hybrid.confidence_threshold, 60.0);
    }
}
