use super::keys::rendered_rows;
use super::quality::require_columns;
use crate::error::Result;
use polars::prelude::*;
use std::collections::HashMap;

/// Keeps one row per distinct key combination: the one with the latest
/// `ts_column`. Null timestamps sort first, so any real timestamp wins; among
/// equal timestamps the later input row wins. Surviving rows come out in
/// ascending timestamp order.
///
/// # Errors
///
/// Returns a schema violation if a key or the timestamp column is missing.
pub fn dedupe_keep_latest(df: &DataFrame, keys: &[&str], ts_column: &str) -> Result<DataFrame> {
    require_columns(df, keys, "frame")?;
    require_columns(df, &[ts_column], "frame")?;

    let order = df
        .column(ts_column)?
        .as_materialized_series()
        .arg_sort(SortOptions {
            descending: false,
            nulls_last: false,
            maintain_order: true,
            ..Default::default()
        });

    // Null key components group together here, as in a plain drop-duplicates.
    let rendered = rendered_rows(df, keys)?;
    let mut latest: HashMap<&[Option<String>], (usize, IdxSize)> = HashMap::new();
    for (rank, idx) in order.into_iter().flatten().enumerate() {
        if let Some(key) = rendered.get(idx as usize) {
            latest.insert(key.as_slice(), (rank, idx));
        }
    }

    let mut kept: Vec<(usize, IdxSize)> = latest.into_values().collect();
    kept.sort_unstable_by_key(|(rank, _)| *rank);
    let indices = IdxCa::from_vec(
        "idx".into(),
        kept.into_iter().map(|(_, idx)| idx).collect(),
    );

    let out = df.take(&indices)?;
    tracing::debug!(rows_in = df.height(), rows_out = out.height(), "deduplicated");
    Ok(out)
}
