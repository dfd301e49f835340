//! Cardinality-validated left joins.
//!
//! The declared cardinality is checked against the data before joining, so a
//! many-to-one join whose right side repeats a key fails instead of silently
//! fanning out the left rows.

use super::keys::row_keys;
use super::quality::require_columns;
use crate::error::{EtlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    #[default]
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }

    fn left_unique(self) -> bool {
        matches!(self, Self::OneToOne | Self::OneToMany)
    }

    fn right_unique(self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }
}

/// Join keys, cardinality expectation and collision suffixes.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct JoinSpec {
    pub on: Vec<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Suffixes for colliding non-key columns, `(left, right)`. An empty
    /// suffix keeps that side's name unmodified.
    #[serde(default = "default_suffixes")]
    pub suffixes: (String, String),
}

const ROW_INDEX: &str = "__left_row";

fn default_suffixes() -> (String, String) {
    (String::new(), "_right".to_owned())
}

impl JoinSpec {
    pub fn new(on: &[&str], cardinality: Cardinality) -> Self {
        Self {
            on: on.iter().map(|k| (*k).to_owned()).collect(),
            cardinality,
            suffixes: default_suffixes(),
        }
    }

    #[must_use]
    pub fn with_suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.suffixes = (left.into(), right.into());
        self
    }

    fn keys(&self) -> Vec<&str> {
        self.on.iter().map(String::as_str).collect()
    }
}

fn check_unique(df: &DataFrame, keys: &[&str], side: &'static str, spec: &JoinSpec) -> Result<()> {
    let mut seen = HashSet::new();
    for key in row_keys(df, keys)?.into_iter().flatten() {
        if !seen.insert(key.clone()) {
            return Err(EtlError::CardinalityViolation {
                side,
                expectation: spec.cardinality.as_str().to_owned(),
                key: keys.join(","),
                value: key.join("|"),
            });
        }
    }
    Ok(())
}

/// Renames columns present on both sides (excluding keys) according to the
/// suffix pair. Returns `(left_renames, right_renames)` as (from, to) pairs.
fn collision_renames(
    left: &DataFrame,
    right: &DataFrame,
    spec: &JoinSpec,
) -> Result<(Vec<(String, String)>, Vec<(String, String)>)> {
    let keys: HashSet<&str> = spec.on.iter().map(String::as_str).collect();
    let left_names: Vec<String> = left.get_column_names().iter().map(|n| n.to_string()).collect();
    let right_names: Vec<String> = right.get_column_names().iter().map(|n| n.to_string()).collect();

    let colliding: Vec<&String> = right_names
        .iter()
        .filter(|n| !keys.contains(n.as_str()) && left_names.contains(n))
        .collect();
    if colliding.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let (left_suffix, right_suffix) = &spec.suffixes;
    if left_suffix.is_empty() && right_suffix.is_empty() {
        return Err(EtlError::Config(format!(
            "columns {colliding:?} exist on both join sides and both suffixes are empty"
        )));
    }

    let renames = |suffix: &str| -> Vec<(String, String)> {
        if suffix.is_empty() {
            return Vec::new();
        }
        colliding
            .iter()
            .map(|n| ((*n).clone(), format!("{n}{suffix}")))
            .collect()
    };
    let left_renames = renames(left_suffix);
    let right_renames = renames(right_suffix);

    let mut final_names: HashSet<String> = HashSet::new();
    let renamed_left = left_names.iter().map(|n| {
        left_renames
            .iter()
            .find(|(from, _)| from == n)
            .map_or_else(|| n.clone(), |(_, to)| to.clone())
    });
    let renamed_right = right_names
        .iter()
        .filter(|n| !keys.contains(n.as_str()))
        .map(|n| {
            right_renames
                .iter()
                .find(|(from, _)| from == n)
                .map_or_else(|| n.clone(), |(_, to)| to.clone())
        });
    for name in renamed_left.chain(renamed_right) {
        if !final_names.insert(name.clone()) {
            return Err(EtlError::Config(format!(
                "join suffixes {:?} still leave column '{name}' ambiguous",
                spec.suffixes
            )));
        }
    }

    Ok((left_renames, right_renames))
}

fn rename_all(df: &mut DataFrame, renames: &[(String, String)]) -> Result<()> {
    for (from, to) in renames {
        df.rename(from, to.as_str().into())?;
    }
    Ok(())
}

/// Left outer join of `left` with `right` on `spec.on`.
///
/// Every left row appears once per matching right row (exactly once when the
/// declared cardinality keeps the right side unique); unmatched rows get
/// nulls on the right-hand columns. Null keys never match.
///
/// # Errors
///
/// Returns [`EtlError::CardinalityViolation`] when a side the cardinality
/// declares unique repeats a key, a schema violation for missing keys, or a
/// configuration error for unresolvable name collisions.
pub fn safe_left_join(left: &DataFrame, right: &DataFrame, spec: &JoinSpec) -> Result<DataFrame> {
    let keys = spec.keys();
    if keys.is_empty() {
        return Err(EtlError::Config("join requires at least one key".to_owned()));
    }
    require_columns(left, &keys, "left")?;
    require_columns(right, &keys, "right")?;

    let (left_renames, right_renames) = collision_renames(left, right, spec)?;
    let mut left = left.clone();
    let mut right = right.clone();
    rename_all(&mut left, &left_renames)?;
    rename_all(&mut right, &right_renames)?;

    for key in &keys {
        let target = left.column(key)?.dtype().clone();
        if right.column(key)?.dtype() != &target {
            let aligned = right.column(key)?.as_materialized_series().cast(&target)?;
            right.with_column(aligned)?;
        }
    }

    // Uniqueness is judged on the aligned keys the join will compare.
    if spec.cardinality.left_unique() {
        check_unique(&left, &keys, "left", spec)?;
    }
    if spec.cardinality.right_unique() {
        check_unique(&right, &keys, "right", spec)?;
    }

    // Left rows come back in input order.
    let left = left.with_row_index(ROW_INDEX.into(), None)?;
    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let joined = left
        .lazy()
        .join(
            right.lazy(),
            key_exprs.clone(),
            key_exprs,
            JoinArgs::new(JoinType::Left),
        )
        .sort(
            [ROW_INDEX],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .drop([ROW_INDEX])
        .collect()?;

    tracing::debug!(
        cardinality = spec.cardinality.as_str(),
        rows = joined.height(),
        "left join complete"
    );
    Ok(joined)
}

/// Fraction of rows where `column` is non-null; 0.0 for an empty frame or a
/// missing column.
pub fn match_rate(df: &DataFrame, column: &str) -> f64 {
    match df.column(column) {
        Ok(c) if df.height() > 0 => 1.0 - c.null_count() as f64 / df.height() as f64,
        _ => 0.0,
    }
}
