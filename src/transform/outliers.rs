//! Outlier detection and winsorization.
//!
//! Bounds are recomputed from the current frame on every call and never
//! cached. Flagging marks values outside the IQR fence; winsorization clips
//! values into a quantile window. The two are independent.

use super::quality::require_columns;
use crate::error::{EtlError, Result};
use polars::prelude::*;

pub const DEFAULT_IQR_K: f64 = 1.5;
pub const DEFAULT_WINSOR_LO: f64 = 0.01;
pub const DEFAULT_WINSOR_HI: f64 = 0.99;

/// Suffix of the boolean column written by [`add_outlier_flag`].
pub const OUTLIER_FLAG_SUFFIX: &str = "__is_outlier";

/// Lower/upper IQR fence. Both fields are NaN when no bound is available.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub const UNDEFINED: Self = Self {
        lower: f64::NAN,
        upper: f64::NAN,
    };

    pub fn is_defined(&self) -> bool {
        !self.lower.is_nan() && !self.upper.is_nan()
    }

    /// True when `value` lies strictly outside the fence.
    pub fn is_outlier(&self, value: f64) -> bool {
        self.is_defined() && (value < self.lower || value > self.upper)
    }
}

fn as_float(series: &Series) -> Result<Float64Chunked> {
    Ok(series.cast(&DataType::Float64)?.f64()?.clone())
}

/// Thresholds only come from finite values, so they are always finite.
fn finite(values: &Float64Chunked) -> Float64Chunked {
    values
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

fn quantile(values: &Float64Chunked, q: f64) -> Result<Option<f64>> {
    Ok(values.quantile(q, QuantileMethod::Linear)?)
}

/// Computes `(Q1 - k*IQR, Q3 + k*IQR)` over the finite non-null values.
///
/// # Errors
///
/// Only internal Polars failures propagate; an all-null column yields
/// [`OutlierBounds::UNDEFINED`].
pub fn iqr_bounds(series: &Series, k: f64) -> Result<OutlierBounds> {
    let values = finite(&as_float(series)?);
    match (quantile(&values, 0.25)?, quantile(&values, 0.75)?) {
        (Some(q1), Some(q3)) => {
            let iqr = q3 - q1;
            Ok(OutlierBounds {
                lower: q1 - k * iqr,
                upper: q3 + k * iqr,
            })
        }
        _ => Ok(OutlierBounds::UNDEFINED),
    }
}

/// Adds `<column>__is_outlier`. Nulls are never flagged, and nothing is
/// flagged when the column has no bound.
///
/// # Errors
///
/// Returns a schema violation if the column is missing.
pub fn add_outlier_flag(df: &DataFrame, column: &str, k: f64) -> Result<DataFrame> {
    require_columns(df, &[column], "frame")?;
    let series = df.column(column)?.as_materialized_series();
    let bounds = iqr_bounds(series, k)?;
    tracing::debug!(column, lower = bounds.lower, upper = bounds.upper, "iqr bounds");

    let flag: BooleanChunked = as_float(series)?
        .into_iter()
        .map(|v| Some(v.is_some_and(|x| bounds.is_outlier(x))))
        .collect();

    let mut out = df.clone();
    out.with_column(
        flag.with_name(format!("{column}{OUTLIER_FLAG_SUFFIX}").into())
            .into_series(),
    )?;
    Ok(out)
}

/// Clips values into `[quantile(lo), quantile(hi)]` of the finite non-null
/// data. Null and NaN positions are preserved; infinities are clipped. A
/// column without finite values is returned unchanged.
///
/// # Errors
///
/// Returns [`EtlError::Config`] for fractions outside `[0, 1]` or `lo > hi`.
pub fn winsorize(series: &Series, lo: f64, hi: f64) -> Result<Series> {
    if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
        return Err(EtlError::Config(format!(
            "winsorize quantiles must satisfy 0 <= lo <= hi <= 1, got lo={lo} hi={hi}"
        )));
    }

    let values = as_float(series)?;
    let thresholds = finite(&values);
    let (Some(lower), Some(upper)) = (quantile(&thresholds, lo)?, quantile(&thresholds, hi)?)
    else {
        return Ok(series.clone());
    };

    let clipped: Float64Chunked = values
        .into_iter()
        .map(|v| v.map(|x| x.clamp(lower, upper)))
        .collect();
    Ok(clipped.with_name(series.name().clone()).into_series())
}
