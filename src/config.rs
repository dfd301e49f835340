//! Resolved paths and transform settings for one run.
//!
//! Input discovery is explicit: each raw dataset has an ordered list of
//! candidate files and the loader takes the first one that exists.

use crate::error::{EtlError, Result, ResultExt as _};
use crate::transform::outliers::{DEFAULT_IQR_K, DEFAULT_WINSOR_HI, DEFAULT_WINSOR_LO};
use crate::transform::quality::RangeCheck;
use crate::transform::types::TimezonePolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Conventional project directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paths {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub cache: PathBuf,
    pub processed: PathBuf,
    pub external: PathBuf,
    pub reports: PathBuf,
}

pub fn make_paths(root: impl Into<PathBuf>) -> Paths {
    let root = root.into();
    let data = root.join("data");
    Paths {
        raw: data.join("raw"),
        cache: data.join("cache"),
        processed: data.join("processed"),
        external: data.join("external"),
        reports: root.join("reports"),
        root,
    }
}

fn default_status_mapping() -> BTreeMap<String, String> {
    [
        ("paid", "paid"),
        ("refund", "refund"),
        ("refunded", "refund"),
        ("payment complete", "paid"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

fn default_join_suffixes() -> (String, String) {
    (String::new(), "_user".to_owned())
}

fn default_winsor_lower() -> f64 {
    DEFAULT_WINSOR_LO
}

fn default_winsor_upper() -> f64 {
    DEFAULT_WINSOR_HI
}

fn default_iqr_k() -> f64 {
    DEFAULT_IQR_K
}

/// Tunable transform parameters. Every field has a default, so a settings
/// file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSettings {
    #[serde(default = "default_status_mapping")]
    pub status_mapping: BTreeMap<String, String>,

    #[serde(default)]
    pub timezone: TimezonePolicy,

    #[serde(default = "default_winsor_lower")]
    pub winsor_lower: f64,

    #[serde(default = "default_winsor_upper")]
    pub winsor_upper: f64,

    #[serde(default = "default_iqr_k")]
    pub iqr_k: f64,

    #[serde(default = "default_join_suffixes")]
    pub join_suffixes: (String, String),

    /// Extra range checks applied to enforced orders.
    #[serde(default)]
    pub order_ranges: Vec<RangeCheck>,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            status_mapping: default_status_mapping(),
            timezone: TimezonePolicy::default(),
            winsor_lower: DEFAULT_WINSOR_LO,
            winsor_upper: DEFAULT_WINSOR_HI,
            iqr_k: DEFAULT_IQR_K,
            join_suffixes: default_join_suffixes(),
            order_ranges: Vec::new(),
        }
    }
}

impl TransformSettings {
    /// Load settings from a JSON file and validate them.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or malformed files and on invalid values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        Self::from_json(&content)
    }

    /// # Errors
    ///
    /// Fails on malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    ///
    /// Returns [`EtlError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |q: f64| (0.0..=1.0).contains(&q);
        if !in_unit(self.winsor_lower) || !in_unit(self.winsor_upper) {
            return Err(EtlError::Config(format!(
                "winsor quantiles must be within [0, 1], got {} and {}",
                self.winsor_lower, self.winsor_upper
            )));
        }
        if self.winsor_lower > self.winsor_upper {
            return Err(EtlError::Config(
                "winsor_lower must not exceed winsor_upper".to_owned(),
            ));
        }
        if !(self.iqr_k >= 0.0) {
            return Err(EtlError::Config(format!(
                "iqr_k must be non-negative, got {}",
                self.iqr_k
            )));
        }
        Ok(())
    }

    fn flatten_into(&self, out: &mut BTreeMap<String, String>) {
        for (from, to) in &self.status_mapping {
            out.insert(format!("status_mapping.{from}"), to.clone());
        }
        out.insert("timezone".to_owned(), self.timezone.as_str().to_owned());
        out.insert("winsor_lower".to_owned(), self.winsor_lower.to_string());
        out.insert("winsor_upper".to_owned(), self.winsor_upper.to_string());
        out.insert("iqr_k".to_owned(), self.iqr_k.to_string());
        out.insert("join_suffix_left".to_owned(), self.join_suffixes.0.clone());
        out.insert("join_suffix_right".to_owned(), self.join_suffixes.1.clone());
        for check in &self.order_ranges {
            let bound = |b: Option<f64>| b.map_or_else(String::new, |v| v.to_string());
            out.insert(
                format!("order_ranges.{}", check.column),
                format!("[{}, {}]", bound(check.lo), bound(check.hi)),
            );
        }
    }
}

/// Resolved configuration for a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct EtlConfig {
    pub paths: Paths,
    pub orders_candidates: Vec<PathBuf>,
    pub users_candidates: Vec<PathBuf>,
    pub out_orders_clean: PathBuf,
    pub out_users: PathBuf,
    pub out_analytics: PathBuf,
    pub run_meta: PathBuf,
    pub missingness_report: PathBuf,
    pub revenue_report: PathBuf,
    pub settings: TransformSettings,
}

/// Delimited text before columnar, conventional raw directory before root.
fn candidates(paths: &Paths, stem: &str) -> Vec<PathBuf> {
    vec![
        paths.raw.join(format!("{stem}.csv")),
        paths.raw.join(format!("{stem}.parquet")),
        paths.root.join(format!("{stem}.csv")),
        paths.root.join(format!("{stem}.parquet")),
    ]
}

impl EtlConfig {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let paths = make_paths(root);
        Self {
            orders_candidates: candidates(&paths, "orders"),
            users_candidates: candidates(&paths, "users"),
            out_orders_clean: paths.processed.join("orders_clean.parquet"),
            out_users: paths.processed.join("users.parquet"),
            out_analytics: paths.processed.join("analytics_table.parquet"),
            run_meta: paths.processed.join("_run_meta.json"),
            missingness_report: paths.reports.join("missingness_orders.csv"),
            revenue_report: paths.reports.join("revenue_by_country.csv"),
            settings: TransformSettings::default(),
            paths,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: TransformSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Every resolved path and setting as a flat string map.
    pub fn to_flat_map(&self) -> BTreeMap<String, String> {
        let show = |p: &Path| p.display().to_string();
        let join = |ps: &[PathBuf]| ps.iter().map(|p| show(p)).collect::<Vec<_>>().join(";");

        let mut out = BTreeMap::new();
        out.insert("root".to_owned(), show(&self.paths.root));
        out.insert("raw".to_owned(), show(&self.paths.raw));
        out.insert("cache".to_owned(), show(&self.paths.cache));
        out.insert("processed".to_owned(), show(&self.paths.processed));
        out.insert("external".to_owned(), show(&self.paths.external));
        out.insert("reports".to_owned(), show(&self.paths.reports));
        out.insert("orders_candidates".to_owned(), join(&self.orders_candidates));
        out.insert("users_candidates".to_owned(), join(&self.users_candidates));
        out.insert("out_orders_clean".to_owned(), show(&self.out_orders_clean));
        out.insert("out_users".to_owned(), show(&self.out_users));
        out.insert("out_analytics".to_owned(), show(&self.out_analytics));
        out.insert("run_meta".to_owned(), show(&self.run_meta));
        out.insert("missingness_report".to_owned(), show(&self.missingness_report));
        out.insert("revenue_report".to_owned(), show(&self.revenue_report));
        self.settings.flatten_into(&mut out);
        out
    }
}
