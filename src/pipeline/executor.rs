//! Pipeline execution engine.
//!
//! Sequences load → enforce → clean → join → aggregate → persist. Each stage
//! fully materializes its frame before the next starts, quality checks run at
//! stage boundaries, and the first failure aborts the whole run.

use super::meta::RunMeta;
use crate::config::{EtlConfig, TransformSettings};
use crate::error::{EtlError, Result};
use crate::transform::cleaning::{
    add_missing_flags, add_time_parts, apply_mapping, missingness_frame, missingness_report,
    normalize_text, parse_datetime,
};
use crate::transform::io::{load_df, locate_input, save_df};
use crate::transform::joins::{Cardinality, JoinSpec, match_rate, safe_left_join};
use crate::transform::outliers::{add_outlier_flag, winsorize};
use crate::transform::quality::{QualitySpec, RangeCheck, require_columns};
use crate::transform::schema::enforce_schema;
use crate::transform::summary::revenue_by_country;
use crate::transform::types::{ORDERS_REQUIRED, Schema, USERS_REQUIRED};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Report generated after a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub orders_in: usize,
    pub users_in: usize,
    pub meta: RunMeta,
    pub duration: std::time::Duration,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "ETL completed: {} orders + {} users → {} analytics rows, \
             country match rate {:.3}, {} missing created_at, {:.2}s",
            self.orders_in,
            self.users_in,
            self.meta.rows_out,
            self.meta.country_match_rate,
            self.meta.missing_created_at,
            self.duration.as_secs_f64()
        )
    }
}

/// Report generated by the individual stage entry points.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: &'static str,
    pub rows: usize,
    pub outputs: Vec<PathBuf>,
}

/// Result of the in-memory transform.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub analytics: DataFrame,
    pub orders_clean: DataFrame,
    pub users: DataFrame,
    pub coercion_failures: BTreeMap<String, usize>,
}

/// Range checks the staged clean entry point always applies.
pub fn default_order_ranges() -> Vec<RangeCheck> {
    vec![
        RangeCheck::new("amount", Some(0.0), None),
        RangeCheck::new("quantity", Some(1.0), Some(100.0)),
    ]
}

fn orders_gate() -> QualitySpec {
    QualitySpec::new("orders").require(&ORDERS_REQUIRED)
}

fn users_gate() -> QualitySpec {
    QualitySpec::new("users")
        .require(&USERS_REQUIRED)
        .unique("user_id", false)
}

/// Locates and reads the raw orders and users datasets.
///
/// # Errors
///
/// Fails with `NotFound` if no candidate exists, or on read errors.
pub fn load_inputs(cfg: &EtlConfig) -> Result<(DataFrame, DataFrame)> {
    let orders_path = locate_input(&cfg.orders_candidates)?;
    let users_path = locate_input(&cfg.users_candidates)?;
    tracing::info!(
        orders = %orders_path.display(),
        users = %users_path.display(),
        "loading inputs"
    );
    Ok((load_df(&orders_path)?, load_df(&users_path)?))
}

/// Enforces the orders schema, derives `status_clean`, adds missingness
/// flags for `amount`/`quantity` and applies `ranges`.
///
/// # Errors
///
/// Fails on schema or range violations.
pub fn clean_orders(
    orders_raw: &DataFrame,
    settings: &TransformSettings,
    ranges: &[RangeCheck],
) -> Result<(DataFrame, BTreeMap<String, usize>)> {
    let enforced = enforce_schema(orders_raw, &Schema::orders(), "orders")?;
    if enforced.total_failures() > 0 {
        tracing::info!(failures = ?enforced.coercion_failures, "orders coercion summary");
    }

    let mut orders = enforced.frame;
    let status = normalize_text(orders.column("status")?.as_materialized_series())?;
    let status_clean = apply_mapping(&status, &settings.status_mapping)?
        .with_name("status_clean".into());
    orders.with_column(status_clean)?;

    let orders = add_missing_flags(&orders, &["amount", "quantity"])?;

    let mut gate = QualitySpec::new("orders");
    gate.non_empty = false;
    gate.ranges = ranges.to_vec();
    gate.evaluate(&orders)?;

    Ok((orders, enforced.coercion_failures))
}

/// Parses `created_at`, adds time parts, joins users many-to-one and adds
/// `amount_winsor` and `amount__is_outlier`.
///
/// # Errors
///
/// Fails on cardinality violations or if the join changes the row count.
pub fn build_analytics(
    orders: &DataFrame,
    users: &DataFrame,
    settings: &TransformSettings,
) -> Result<DataFrame> {
    let orders = parse_datetime(orders, "created_at", settings.timezone)?;
    let orders = add_time_parts(&orders, "created_at")?;

    let missing_ts = orders.column("created_at")?.null_count();
    tracing::info!(
        missing = missing_ts,
        total = orders.height(),
        "missing created_at after parse"
    );

    let (left_suffix, right_suffix) = &settings.join_suffixes;
    let spec = JoinSpec::new(&["user_id"], Cardinality::ManyToOne)
        .with_suffixes(left_suffix.clone(), right_suffix.clone());
    let joined = safe_left_join(&orders, users, &spec)?;
    ensure_row_count(orders.height(), joined.height())?;
    tracing::info!(
        rows = joined.height(),
        country_match_rate = match_rate(&joined, "country"),
        "joined orders with users"
    );

    // The outlier flag is computed from the pre-winsorized amount.
    let amount = joined.column("amount")?.as_materialized_series();
    let winsor = winsorize(amount, settings.winsor_lower, settings.winsor_upper)?
        .with_name("amount_winsor".into());
    let mut analytics = add_outlier_flag(&joined, "amount", settings.iqr_k)?;
    analytics.with_column(winsor)?;
    Ok(analytics)
}

/// # Errors
///
/// Returns [`EtlError::RowCountInvariantBroken`] when the counts differ.
pub fn ensure_row_count(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(EtlError::RowCountInvariantBroken { expected, actual });
    }
    Ok(())
}

/// Full in-memory transform from raw orders and users to the analytics table.
///
/// # Errors
///
/// Returns the first quality, cardinality or invariant violation.
pub fn transform(
    orders_raw: &DataFrame,
    users_raw: &DataFrame,
    settings: &TransformSettings,
) -> Result<TransformOutput> {
    orders_gate().evaluate(orders_raw)?;
    users_gate().evaluate(users_raw)?;

    let users = enforce_schema(users_raw, &Schema::users(), "users")?.frame;
    let (orders_clean, coercion_failures) =
        clean_orders(orders_raw, settings, &settings.order_ranges)?;
    let analytics = build_analytics(&orders_clean, &users, settings)?;

    Ok(TransformOutput {
        analytics,
        orders_clean,
        users,
        coercion_failures,
    })
}

/// Writes the processed tables and diagnostic reports.
///
/// # Errors
///
/// Fails on I/O errors.
pub fn load_outputs(output: &TransformOutput, cfg: &EtlConfig) -> Result<()> {
    tracing::info!(dir = %cfg.paths.processed.display(), "writing outputs");
    save_df(&mut output.users.clone(), &cfg.out_users)?;
    save_df(&mut output.orders_clean.clone(), &cfg.out_orders_clean)?;
    save_df(&mut output.analytics.clone(), &cfg.out_analytics)?;

    let report = missingness_report(&output.orders_clean);
    save_df(&mut missingness_frame(&report)?, &cfg.missingness_report)?;
    save_df(&mut revenue_by_country(&output.analytics)?, &cfg.revenue_report)?;
    Ok(())
}

/// Runs the whole pipeline once and writes the run metadata last.
///
/// # Errors
///
/// Any I/O, quality, cardinality or invariant failure aborts the run.
pub fn run_etl(cfg: &EtlConfig) -> Result<RunReport> {
    let start = std::time::Instant::now();
    cfg.settings.validate()?;

    let (orders_raw, users_raw) = load_inputs(cfg)?;
    tracing::info!(
        orders = orders_raw.height(),
        users = users_raw.height(),
        "transforming"
    );
    let output = transform(&orders_raw, &users_raw, &cfg.settings)?;

    load_outputs(&output, cfg)?;

    let meta = RunMeta::from_analytics(
        &output.analytics,
        output.coercion_failures.clone(),
        cfg.to_flat_map(),
    );
    tracing::info!(path = %cfg.run_meta.display(), "writing run metadata");
    meta.write(&cfg.run_meta)?;

    Ok(RunReport {
        orders_in: orders_raw.height(),
        users_in: users_raw.height(),
        meta,
        duration: start.elapsed(),
    })
}

/// Enforces the orders schema and writes typed copies of both raw inputs.
///
/// # Errors
///
/// Fails on missing inputs or I/O errors.
pub fn run_load_stage(cfg: &EtlConfig) -> Result<StageReport> {
    let (orders_raw, users_raw) = load_inputs(cfg)?;
    let mut orders = enforce_schema(&orders_raw, &Schema::orders(), "orders")?.frame;
    let mut users = enforce_schema(&users_raw, &Schema::users(), "users")?.frame;
    tracing::info!(orders = orders.height(), users = users.height(), "rows loaded");

    let orders_out = cfg.paths.processed.join("orders.parquet");
    save_df(&mut orders, &orders_out)?;
    save_df(&mut users, &cfg.out_users)?;

    Ok(StageReport {
        stage: "load",
        rows: orders.height(),
        outputs: vec![orders_out, cfg.out_users.clone()],
    })
}

/// Quality gate, missingness report and order cleanup, written to
/// `orders_clean`.
///
/// # Errors
///
/// Fails on quality or range violations and I/O errors.
pub fn run_clean_stage(cfg: &EtlConfig) -> Result<StageReport> {
    let (orders_raw, users_raw) = load_inputs(cfg)?;
    orders_gate().evaluate(&orders_raw)?;
    QualitySpec::new("users")
        .require(&USERS_REQUIRED)
        .evaluate(&users_raw)?;

    let enforced = enforce_schema(&orders_raw, &Schema::orders(), "orders")?;
    let report = missingness_report(&enforced.frame);
    save_df(&mut missingness_frame(&report)?, &cfg.missingness_report)?;
    tracing::info!(path = %cfg.missingness_report.display(), "wrote missingness report");

    let mut ranges = default_order_ranges();
    ranges.extend(cfg.settings.order_ranges.iter().cloned());
    let (mut orders, _) = clean_orders(&orders_raw, &cfg.settings, &ranges)?;

    let mut users = enforce_schema(&users_raw, &Schema::users(), "users")?.frame;
    save_df(&mut orders, &cfg.out_orders_clean)?;
    save_df(&mut users, &cfg.out_users)?;

    Ok(StageReport {
        stage: "clean",
        rows: orders.height(),
        outputs: vec![
            cfg.missingness_report.clone(),
            cfg.out_orders_clean.clone(),
            cfg.out_users.clone(),
        ],
    })
}

/// Builds the analytics table and revenue summary from the processed
/// outputs of the clean stage.
///
/// # Errors
///
/// Fails on quality, cardinality or invariant violations and I/O errors.
pub fn run_analytics_stage(cfg: &EtlConfig) -> Result<StageReport> {
    let orders = load_df(&cfg.out_orders_clean)?;
    let users = load_df(&cfg.out_users)?;
    tracing::info!(orders = orders.height(), users = users.height(), "loaded processed inputs");

    require_columns(
        &orders,
        &["order_id", "user_id", "amount", "quantity", "created_at", "status_clean"],
        "orders_clean",
    )?;
    QualitySpec::new("orders_clean").evaluate(&orders)?;
    users_gate().evaluate(&users)?;

    let users = enforce_schema(&users, &Schema::users(), "users")?.frame;
    let mut analytics = build_analytics(&orders, &users, &cfg.settings)?;

    let mut summary = revenue_by_country(&analytics)?;
    save_df(&mut summary, &cfg.revenue_report)?;
    save_df(&mut analytics, &cfg.out_analytics)?;

    let meta = RunMeta::from_analytics(&analytics, BTreeMap::new(), cfg.to_flat_map());
    meta.write(&cfg.run_meta)?;

    Ok(StageReport {
        stage: "analytics",
        rows: analytics.height(),
        outputs: vec![
            cfg.revenue_report.clone(),
            cfg.out_analytics.clone(),
            cfg.run_meta.clone(),
        ],
    })
}
