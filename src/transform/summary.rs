use super::quality::require_columns;
use crate::error::Result;
use polars::prelude::*;

/// Order count and total amount per country, highest revenue first.
/// Rows without a country form their own group.
///
/// # Errors
///
/// Returns a schema violation if `country`, `order_id` or `amount` is missing.
pub fn revenue_by_country(df: &DataFrame) -> Result<DataFrame> {
    require_columns(df, &["country", "order_id", "amount"], "analytics")?;

    Ok(df
        .clone()
        .lazy()
        .group_by_stable([col("country")])
        .agg([
            col("order_id").count().alias("orders_count"),
            col("amount").sum().alias("total_revenue"),
        ])
        .sort(
            ["total_revenue"],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()?)
}
