use super::quality::require_columns;
use super::types::TimezonePolicy;
use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Suffix of the boolean companion column written by [`add_missing_flags`].
pub const MISSING_FLAG_SUFFIX: &str = "__isna";

/// Trim, lowercase and collapse internal whitespace runs to one space.
pub fn normalize_text_expr(expr: Expr) -> Expr {
    expr.cast(DataType::String)
        .str()
        .strip_chars(lit(NULL))
        .str()
        .to_lowercase()
        .str()
        .replace_all(lit(r"\s+"), lit(" "), false)
}

/// Idempotent text normalization of a single column.
///
/// # Errors
///
/// Propagates Polars failures.
pub fn normalize_text(series: &Series) -> Result<Series> {
    let name = series.name().clone();
    let df = DataFrame::new(vec![Column::from(series.clone())])?;
    let out = df
        .lazy()
        .select([normalize_text_expr(col(name.clone())).alias(name.clone())])
        .collect()?;
    Ok(out.column(&name)?.as_materialized_series().clone())
}

/// Remaps values found in `mapping`; everything else, including nulls, passes
/// through unchanged.
///
/// # Errors
///
/// Propagates Polars failures.
pub fn apply_mapping(series: &Series, mapping: &BTreeMap<String, String>) -> Result<Series> {
    let strings = series.cast(&DataType::String)?;
    let mapped: StringChunked = strings
        .str()?
        .into_iter()
        .map(|v| v.map(|s| mapping.get(s).map_or(s, String::as_str)))
        .collect();
    Ok(mapped.with_name(series.name().clone()).into_series())
}

/// Adds `<col>__isna` for each column, true exactly where the source is null.
///
/// # Errors
///
/// Returns a schema violation if a column is missing.
pub fn add_missing_flags(df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
    require_columns(df, columns, "frame")?;
    let flags: Vec<Expr> = columns
        .iter()
        .map(|c| col(*c).is_null().alias(format!("{c}{MISSING_FLAG_SUFFIX}")))
        .collect();
    Ok(df.clone().lazy().with_columns(flags).collect()?)
}

#[derive(Clone, Serialize, PartialEq, Debug)]
pub struct MissingnessEntry {
    pub column: String,
    pub n_missing: usize,
    pub p_missing: f64,
}

/// Per-column null count and fraction, most-missing first.
pub fn missingness_report(df: &DataFrame) -> Vec<MissingnessEntry> {
    let n_rows = df.height();
    let mut report: Vec<MissingnessEntry> = df
        .get_columns()
        .iter()
        .map(|c| {
            let n_missing = c.null_count();
            let p_missing = if n_rows == 0 {
                0.0
            } else {
                n_missing as f64 / n_rows as f64
            };
            MissingnessEntry {
                column: c.name().to_string(),
                n_missing,
                p_missing,
            }
        })
        .collect();

    // Stable: ties keep column order.
    report.sort_by(|a, b| b.p_missing.total_cmp(&a.p_missing));
    report
}

/// Renders a missingness report as a frame for CSV output.
///
/// # Errors
///
/// Propagates Polars failures.
pub fn missingness_frame(report: &[MissingnessEntry]) -> Result<DataFrame> {
    let columns: Vec<&str> = report.iter().map(|e| e.column.as_str()).collect();
    let counts: Vec<u64> = report.iter().map(|e| e.n_missing as u64).collect();
    let fractions: Vec<f64> = report.iter().map(|e| e.p_missing).collect();
    Ok(DataFrame::new(vec![
        Column::new("column".into(), columns),
        Column::new("n_missing".into(), counts),
        Column::new("p_missing".into(), fractions),
    ])?)
}

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parses one timestamp to microseconds since the epoch, or `None`.
///
/// Under [`TimezonePolicy::Utc`] the result is the UTC instant. Under
/// [`TimezonePolicy::Naive`] it is the wall-clock reading as written.
pub fn parse_timestamp(raw: &str, policy: TimezonePolicy) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let with_offset = DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    });
    if let Some(dt) = with_offset {
        return Some(match policy {
            TimezonePolicy::Utc => dt.timestamp_micros(),
            TimezonePolicy::Naive => dt.naive_local().and_utc().timestamp_micros(),
        });
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().timestamp_micros())
}

/// Parses a column to a timestamp under `policy`; unparseable values become
/// null. Columns that are already temporal are re-expressed in the target
/// dtype.
///
/// # Errors
///
/// Only internal Polars failures propagate.
pub fn parse_datetime_series(series: &Series, policy: TimezonePolicy) -> Result<Series> {
    let name = series.name().clone();
    let micros: Int64Chunked = match series.dtype() {
        DataType::Datetime(_, tz) => series
            .cast(&DataType::Datetime(TimeUnit::Microseconds, tz.clone()))?
            .cast(&DataType::Int64)?
            .i64()?
            .clone(),
        DataType::Date => series
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
            .cast(&DataType::Int64)?
            .i64()?
            .clone(),
        _ => series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.and_then(|raw| parse_timestamp(raw, policy)))
            .collect(),
    };

    Ok(micros
        .with_name(name)
        .into_datetime(TimeUnit::Microseconds, policy.time_zone())
        .into_series())
}

/// Replaces `column` with its parsed timestamp.
///
/// # Errors
///
/// Returns a schema violation if the column is missing.
pub fn parse_datetime(df: &DataFrame, column: &str, policy: TimezonePolicy) -> Result<DataFrame> {
    require_columns(df, &[column], "frame")?;
    let parsed = parse_datetime_series(df.column(column)?.as_materialized_series(), policy)?;
    let mut out = df.clone();
    out.with_column(parsed)?;
    Ok(out)
}

/// Derives `date`, `year`, `month` (`YYYY-MM`), `dow` (weekday name) and
/// `hour` from a parsed timestamp column. Nulls propagate.
///
/// # Errors
///
/// Returns a schema violation if the column is missing.
pub fn add_time_parts(df: &DataFrame, ts_column: &str) -> Result<DataFrame> {
    require_columns(df, &[ts_column], "frame")?;
    let ts = || col(ts_column).dt();
    Ok(df
        .clone()
        .lazy()
        .with_columns([
            ts().date().alias("date"),
            ts().year().alias("year"),
            ts().strftime("%Y-%m").alias("month"),
            ts().strftime("%A").alias("dow"),
            ts().hour().alias("hour"),
        ])
        .collect()?)
}
