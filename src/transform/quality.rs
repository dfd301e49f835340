//! Data-quality assertions.
//!
//! Every check is fail-fast: the first violation is returned as an error and
//! the caller aborts the run. Rows are never dropped to make a check pass.

use super::keys::row_keys;
use crate::error::{EtlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fails if any of `names` is not a column of `df`.
///
/// # Errors
///
/// Returns [`EtlError::SchemaViolation`] naming the first missing column.
pub fn require_columns(df: &DataFrame, names: &[&str], dataset: &str) -> Result<()> {
    let present: HashSet<&str> = df.get_column_names().into_iter().map(|n| n.as_str()).collect();
    match names.iter().find(|name| !present.contains(*name)) {
        Some(missing) => Err(EtlError::SchemaViolation {
            dataset: dataset.to_owned(),
            column: (*missing).to_owned(),
        }),
        None => Ok(()),
    }
}

/// # Errors
///
/// Returns [`EtlError::EmptyDataset`] when `df` has no rows.
pub fn assert_non_empty(df: &DataFrame, dataset: &str) -> Result<()> {
    if df.height() == 0 {
        return Err(EtlError::EmptyDataset {
            dataset: dataset.to_owned(),
        });
    }
    Ok(())
}

/// Fails if `key` repeats among non-null values, or if it contains nulls and
/// `allow_null` is false. The null check runs first.
///
/// # Errors
///
/// Returns [`EtlError::NullKey`] or [`EtlError::UniquenessViolation`].
pub fn assert_unique_key(df: &DataFrame, key: &str, allow_null: bool, dataset: &str) -> Result<()> {
    require_columns(df, &[key], dataset)?;

    let nulls = df.column(key)?.null_count();
    if !allow_null && nulls > 0 {
        return Err(EtlError::NullKey {
            dataset: dataset.to_owned(),
            key: key.to_owned(),
            count: nulls,
        });
    }

    let mut seen = HashSet::new();
    for row in row_keys(df, &[key])?.into_iter().flatten() {
        if !seen.insert(row.clone()) {
            return Err(EtlError::UniquenessViolation {
                dataset: dataset.to_owned(),
                key: key.to_owned(),
                value: row.join("|"),
            });
        }
    }
    Ok(())
}

/// Fails if any non-null value of `series` lies outside `[lo, hi]`.
/// Either bound may be omitted; both are inclusive.
///
/// # Errors
///
/// Returns [`EtlError::RangeViolation`] with the first offending value.
pub fn assert_in_range(series: &Series, lo: Option<f64>, hi: Option<f64>) -> Result<()> {
    let values = series.cast(&DataType::Float64)?;
    let offending = values.f64()?.into_iter().flatten().find(|v| {
        lo.is_some_and(|lo| *v < lo) || hi.is_some_and(|hi| *v > hi)
    });

    match offending {
        Some(value) => Err(EtlError::RangeViolation {
            column: series.name().to_string(),
            value,
            lo,
            hi,
        }),
        None => Ok(()),
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct UniqueKeyCheck {
    pub key: String,
    #[serde(default)]
    pub allow_null: bool,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct RangeCheck {
    pub column: String,
    #[serde(default)]
    pub lo: Option<f64>,
    #[serde(default)]
    pub hi: Option<f64>,
}

impl RangeCheck {
    pub fn new(column: impl Into<String>, lo: Option<f64>, hi: Option<f64>) -> Self {
        Self {
            column: column.into(),
            lo,
            hi,
        }
    }
}

/// Declarative bundle of checks for one dataset.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct QualitySpec {
    pub dataset: String,
    #[serde(default)]
    pub required_columns: Vec<String>,
    #[serde(default = "default_true")]
    pub non_empty: bool,
    #[serde(default)]
    pub unique_key: Option<UniqueKeyCheck>,
    #[serde(default)]
    pub ranges: Vec<RangeCheck>,
}

fn default_true() -> bool {
    true
}

impl QualitySpec {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            required_columns: Vec::new(),
            non_empty: true,
            unique_key: None,
            ranges: Vec::new(),
        }
    }

    #[must_use]
    pub fn require(mut self, names: &[&str]) -> Self {
        self.required_columns
            .extend(names.iter().map(|n| (*n).to_owned()));
        self
    }

    #[must_use]
    pub fn unique(mut self, key: impl Into<String>, allow_null: bool) -> Self {
        self.unique_key = Some(UniqueKeyCheck {
            key: key.into(),
            allow_null,
        });
        self
    }

    #[must_use]
    pub fn range(mut self, check: RangeCheck) -> Self {
        self.ranges.push(check);
        self
    }

    /// Runs required columns, non-empty, unique key, then ranges, stopping at
    /// the first violation.
    ///
    /// # Errors
    ///
    /// Returns the first violated check.
    pub fn evaluate(&self, df: &DataFrame) -> Result<()> {
        let required: Vec<&str> = self.required_columns.iter().map(String::as_str).collect();
        require_columns(df, &required, &self.dataset)?;

        if self.non_empty {
            assert_non_empty(df, &self.dataset)?;
        }

        if let Some(check) = &self.unique_key {
            assert_unique_key(df, &check.key, check.allow_null, &self.dataset)?;
        }

        for check in &self.ranges {
            require_columns(df, &[check.column.as_str()], &self.dataset)?;
            let series = df.column(&check.column)?.as_materialized_series();
            assert_in_range(series, check.lo, check.hi)?;
        }

        tracing::debug!(dataset = %self.dataset, "quality checks passed");
        Ok(())
    }
}
