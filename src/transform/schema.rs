//! Schema enforcement.
//!
//! Coercion never fails: values that cannot be represented in the target type
//! become null. The number of such values per column is reported alongside
//! the coerced frame so silent nullification stays observable.

use super::cleaning::parse_datetime_series;
use super::types::{ColumnType, Schema};
use crate::error::{EtlError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;

/// A frame after enforcement plus per-column coercion failure counts.
#[derive(Debug, Clone)]
pub struct Enforced {
    pub frame: DataFrame,
    pub coercion_failures: BTreeMap<String, usize>,
}

impl Enforced {
    pub fn total_failures(&self) -> usize {
        self.coercion_failures.values().sum()
    }
}

/// Coerces every column declared by `schema`; other columns pass through.
///
/// # Errors
///
/// Returns [`EtlError::SchemaViolation`] if a declared column is absent.
pub fn enforce_schema(df: &DataFrame, schema: &Schema, dataset: &str) -> Result<Enforced> {
    let mut frame = df.clone();
    let mut coercion_failures = BTreeMap::new();

    for (name, kind) in &schema.columns {
        let source = df
            .column(name)
            .map_err(|_| EtlError::SchemaViolation {
                dataset: dataset.to_owned(),
                column: name.clone(),
            })?
            .as_materialized_series();

        let coerced = coerce_series(source, *kind)?;
        let failures = coerced.null_count().saturating_sub(source.null_count());
        if failures > 0 {
            tracing::warn!(dataset, column = %name, failures, "values nullified during coercion");
        }
        coercion_failures.insert(name.clone(), failures);
        frame.with_column(coerced)?;
    }

    Ok(Enforced {
        frame,
        coercion_failures,
    })
}

/// Coerces a single column to a canonical type.
///
/// # Errors
///
/// Only internal Polars failures propagate; unparseable values become null.
pub fn coerce_series(series: &Series, kind: ColumnType) -> Result<Series> {
    let name = series.name().clone();
    let out = match kind {
        ColumnType::String => series.cast(&DataType::String)?,
        ColumnType::Float => coerce_float(series)?.with_name(name).into_series(),
        ColumnType::Integer => coerce_integer(series)?.with_name(name).into_series(),
        ColumnType::Boolean => coerce_boolean(series)?.with_name(name).into_series(),
        ColumnType::Timestamp(policy) => parse_datetime_series(series, policy)?,
    };
    Ok(out)
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn float_to_int(v: f64) -> Option<i64> {
    // Outside this window an f64 no longer maps onto a unique i64.
    const LIMIT: f64 = 9_007_199_254_740_992.0;
    (v.is_finite() && v.fract() == 0.0 && v.abs() <= LIMIT).then_some(v as i64)
}

fn coerce_float(series: &Series) -> Result<Float64Chunked> {
    let out = if series.dtype().is_string() {
        series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_float))
            .collect()
    } else {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect()
    };
    Ok(out)
}

fn coerce_integer(series: &Series) -> Result<Int64Chunked> {
    let dtype = series.dtype();
    let out = if dtype.is_string() {
        series
            .str()?
            .into_iter()
            .map(|v| {
                v.and_then(|raw| {
                    let raw = raw.trim();
                    raw.parse::<i64>()
                        .ok()
                        .or_else(|| parse_float(raw).and_then(float_to_int))
                })
            })
            .collect()
    } else if dtype.is_float() {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.and_then(float_to_int))
            .collect()
    } else {
        series.cast(&DataType::Int64)?.i64()?.clone()
    };
    Ok(out)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn coerce_boolean(series: &Series) -> Result<BooleanChunked> {
    let out = if series.dtype() == &DataType::Boolean {
        series.bool()?.clone()
    } else {
        series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_bool))
            .collect()
    };
    Ok(out)
}
