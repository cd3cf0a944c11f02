//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod process;

use std::path::Path;

use sigtap_core::error::{Result, SigtapError};
use sigtap_core::models::SigtapConfig;
use sigtap_core::{PageLayout, PageSource};

/// Load the configuration, or defaults when no path is given, and
/// refuse values outside their working ranges.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<SigtapConfig> {
    let config = match config_path {
        Some(path) => SigtapConfig::from_file(Path::new(path))?,
        None => SigtapConfig::default(),
    };

    let issues = config.validate();
    if !issues.is_empty() {
        anyhow::bail!("invalid configuration:\n  {}", issues.join("\n  "));
    }
    Ok(config)
}

/// Load a document layout dump: a JSON array of pages, each carrying
/// its positioned text fragments.
pub fn load_layout(path: &Path) -> anyhow::Result<Vec<PageLayout>> {
    let content = std::fs::read_to_string(path)?;
    let pages: Vec<PageLayout> = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("invalid layout file {}: {}", path.display(), e))?;
    Ok(pages)
}

/// Page source over an already-loaded layout dump.
pub struct JsonPageSource {
    pages: Vec<PageLayout>,
}

impl JsonPageSource {
    pub fn new(pages: Vec<PageLayout>) -> Self {
        Self { pages }
    }
}

impl PageSource for JsonPageSource {
    fn total_pages(&self) -> usize {
        self.pages.len()
    }

    async fn page(&mut self, page_number: u32) -> Result<PageLayout> {
        self.pages
            .get((page_number as usize).saturating_sub(1))
            .cloned()
            .ok_or_else(|| SigtapError::Document(format!("missing page {}", page_number)))
    }
}
