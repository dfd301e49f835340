use crate::error::{Result, ResultExt as _};
use crate::transform::joins::match_rate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Terminal artifact summarizing one successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub rows_out: usize,
    pub missing_created_at: usize,
    pub country_match_rate: f64,
    pub coercion_failures: BTreeMap<String, usize>,
    pub config: BTreeMap<String, String>,
}

impl RunMeta {
    pub fn from_analytics(
        analytics: &DataFrame,
        coercion_failures: BTreeMap<String, usize>,
        config: BTreeMap<String, String>,
    ) -> Self {
        let missing_created_at = analytics
            .column("created_at")
            .map_or(0, |c| c.null_count());
        Self {
            rows_out: analytics.height(),
            missing_created_at,
            country_match_rate: match_rate(analytics, "country"),
            coercion_failures,
            config,
        }
    }

    /// # Errors
    ///
    /// Fails if the file or its directory cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run metadata {}", path.display()))
    }

    /// # Errors
    ///
    /// Fails if the file is unreadable or malformed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
