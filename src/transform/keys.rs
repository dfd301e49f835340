use crate::error::Result;
use polars::prelude::*;

/// Composite key of one row rendered as text.
pub type RowKey = Vec<String>;

/// Renders every row over `columns` as text, keeping nulls as `None`.
///
/// # Errors
///
/// Fails if a column is missing.
pub fn rendered_rows(df: &DataFrame, columns: &[&str]) -> Result<Vec<Vec<Option<String>>>> {
    let rendered = columns
        .iter()
        .map(|name| {
            df.column(name)?
                .as_materialized_series()
                .cast(&DataType::String)
        })
        .collect::<PolarsResult<Vec<Series>>>()?;
    let parts = rendered
        .iter()
        .map(Series::str)
        .collect::<PolarsResult<Vec<&StringChunked>>>()?;

    Ok((0..df.height())
        .map(|row| {
            parts
                .iter()
                .map(|ca| ca.get(row).map(ToOwned::to_owned))
                .collect()
        })
        .collect())
}

/// Builds the composite key of every row over `columns`.
///
/// A row whose key has any null component yields `None`: null keys never
/// compare equal to anything, including each other.
///
/// # Errors
///
/// Fails if a column is missing.
pub fn row_keys(df: &DataFrame, columns: &[&str]) -> Result<Vec<Option<RowKey>>> {
    Ok(rendered_rows(df, columns)?
        .into_iter()
        .map(|parts| parts.into_iter().collect::<Option<RowKey>>())
        .collect())
}
