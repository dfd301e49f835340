//! End-to-end tests for the ETL run
//!
//! Each test writes small raw CSV extracts into a temporary project root,
//! runs the pipeline against it and inspects the written artifacts.

#![expect(clippy::unwrap_used, clippy::panic)]

use orders_etl::config::{EtlConfig, TransformSettings};
use orders_etl::error::EtlError;
use orders_etl::pipeline::{self, RunMeta};
use orders_etl::transform::io::load_df;
use polars::prelude::*;
use std::path::Path;

const ORDERS_HEADER: &str = "order_id,user_id,amount,quantity,created_at,status";
const USERS_CSV: &str = "user_id,country,signup_date\nu1,US,2023-01-01\n";

fn write_raw(root: &Path, orders: &str, users: &str) {
    let raw = root.join("data").join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(raw.join("orders.csv"), orders).unwrap();
    std::fs::write(raw.join("users.csv"), users).unwrap();
}

fn single_order_root() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let orders = format!("{ORDERS_HEADER}\n1,u1,10.5,2,2024-01-01T00:00:00Z,Paid \n");
    write_raw(tmp.path(), &orders, USERS_CSV);
    tmp
}

fn column_str(df: &DataFrame, name: &str, row: usize) -> Option<String> {
    let s = df.column(name).unwrap().as_materialized_series().cast(&DataType::String).unwrap();
    s.str().unwrap().get(row).map(ToOwned::to_owned)
}

#[test]
fn test_single_order_end_to_end() {
    let tmp = single_order_root();
    let cfg = EtlConfig::from_root(tmp.path());

    let report = pipeline::run_etl(&cfg).unwrap();
    assert_eq!(report.orders_in, 1);
    assert_eq!(report.meta.rows_out, 1);

    let analytics = load_df(&cfg.out_analytics).unwrap();
    assert_eq!(analytics.height(), 1);
    assert_eq!(column_str(&analytics, "status_clean", 0).as_deref(), Some("paid"));
    assert_eq!(column_str(&analytics, "country", 0).as_deref(), Some("US"));
    assert_eq!(analytics.column("amount").unwrap().dtype(), &DataType::Float64);
    assert_eq!(analytics.column("amount").unwrap().as_materialized_series().f64().unwrap().get(0), Some(10.5));
    assert_eq!(analytics.column("quantity").unwrap().dtype(), &DataType::Int64);
    assert_eq!(analytics.column("quantity").unwrap().as_materialized_series().i64().unwrap().get(0), Some(2));
    assert_eq!(column_str(&analytics, "month", 0).as_deref(), Some("2024-01"));
    for extra in ["amount__isna", "quantity__isna", "amount_winsor", "amount__is_outlier"] {
        assert!(analytics.column(extra).is_ok(), "missing column {extra}");
    }

    assert!(cfg.out_users.is_file());
    assert!(cfg.out_orders_clean.is_file());
    assert!(cfg.missingness_report.is_file());
    assert!(cfg.revenue_report.is_file());
}

#[test]
fn test_run_meta_is_written() {
    let tmp = single_order_root();
    let cfg = EtlConfig::from_root(tmp.path());
    pipeline::run_etl(&cfg).unwrap();

    let meta = RunMeta::from_file(&cfg.run_meta).unwrap();
    assert_eq!(meta.rows_out, 1);
    assert_eq!(meta.missing_created_at, 0);
    assert!((meta.country_match_rate - 1.0).abs() < 1e-12);
    assert_eq!(meta.config.get("timezone").map(String::as_str), Some("utc"));
    assert!(meta.config.contains_key("out_analytics"));
}

#[test]
fn test_unparseable_amount_is_kept_and_flagged() {
    let tmp = tempfile::tempdir().unwrap();
    let orders = format!(
        "{ORDERS_HEADER}\n1,u1,not_a_number,1,2024-01-01,paid\n2,u1,5,1,not a date,refunded\n"
    );
    write_raw(tmp.path(), &orders, USERS_CSV);
    let cfg = EtlConfig::from_root(tmp.path());

    let report = pipeline::run_etl(&cfg).unwrap();
    assert_eq!(report.meta.rows_out, 2);
    assert_eq!(report.meta.missing_created_at, 1);
    assert_eq!(report.meta.coercion_failures.get("amount"), Some(&1));

    let analytics = load_df(&cfg.out_analytics).unwrap();
    let isna: Vec<Option<bool>> = analytics
        .column("amount__isna")
        .unwrap()
        .as_materialized_series()
        .bool()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(isna, vec![Some(true), Some(false)]);
    assert_eq!(column_str(&analytics, "status_clean", 1).as_deref(), Some("refund"));
}

#[test]
fn test_duplicate_users_abort_before_join() {
    let tmp = tempfile::tempdir().unwrap();
    let orders = format!("{ORDERS_HEADER}\n1,u1,10,1,2024-01-01,paid\n");
    let users = "user_id,country,signup_date\nu1,US,2023-01-01\nu1,CA,2023-02-01\n";
    write_raw(tmp.path(), &orders, users);
    let cfg = EtlConfig::from_root(tmp.path());

    match pipeline::run_etl(&cfg) {
        Err(EtlError::UniquenessViolation { dataset, key, value }) => {
            assert_eq!(dataset, "users");
            assert_eq!(key, "user_id");
            assert_eq!(value, "u1");
        }
        other => panic!("expected uniqueness violation, got {other:?}"),
    }
    assert!(!cfg.out_analytics.exists());
    assert!(!cfg.run_meta.exists());
}

#[test]
fn test_missing_inputs_report_all_candidates() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = EtlConfig::from_root(tmp.path());
    match pipeline::run_etl(&cfg) {
        Err(EtlError::NotFound { candidates }) => assert_eq!(candidates.len(), 4),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn test_inputs_found_at_project_root() {
    let tmp = tempfile::tempdir().unwrap();
    let orders = format!("{ORDERS_HEADER}\n1,u1,10,1,2024-01-01,paid\n");
    std::fs::write(tmp.path().join("orders.csv"), orders).unwrap();
    std::fs::write(tmp.path().join("users.csv"), USERS_CSV).unwrap();

    let report = pipeline::run_etl(&EtlConfig::from_root(tmp.path())).unwrap();
    assert_eq!(report.meta.rows_out, 1);
}

#[test]
fn test_staged_run_matches_full_run() {
    let tmp = single_order_root();
    let cfg = EtlConfig::from_root(tmp.path());

    let load = pipeline::run_load_stage(&cfg).unwrap();
    assert_eq!(load.rows, 1);
    let clean = pipeline::run_clean_stage(&cfg).unwrap();
    assert_eq!(clean.stage, "clean");
    let analytics = pipeline::run_analytics_stage(&cfg).unwrap();
    assert_eq!(analytics.rows, 1);

    let revenue = load_df(&cfg.revenue_report).unwrap();
    assert_eq!(column_str(&revenue, "country", 0).as_deref(), Some("US"));
    assert_eq!(column_str(&revenue, "orders_count", 0).as_deref(), Some("1"));
    assert_eq!(column_str(&revenue, "total_revenue", 0).as_deref(), Some("10.5"));
}

#[test]
fn test_clean_stage_rejects_out_of_range_quantity() {
    let tmp = tempfile::tempdir().unwrap();
    let orders = format!("{ORDERS_HEADER}\n1,u1,10,0,2024-01-01,paid\n");
    write_raw(tmp.path(), &orders, USERS_CSV);
    let cfg = EtlConfig::from_root(tmp.path());

    match pipeline::run_clean_stage(&cfg) {
        Err(EtlError::RangeViolation { column, .. }) => assert_eq!(column, "quantity"),
        other => panic!("expected range violation, got {other:?}"),
    }
    assert!(!cfg.out_orders_clean.exists());
}

#[test]
fn test_settings_change_status_mapping() {
    let tmp = tempfile::tempdir().unwrap();
    let orders = format!("{ORDERS_HEADER}\n1,u1,10,1,2024-01-01,Settled\n");
    write_raw(tmp.path(), &orders, USERS_CSV);

    let settings =
        TransformSettings::from_json(r#"{"status_mapping": {"settled": "paid"}}"#).unwrap();
    let cfg = EtlConfig::from_root(tmp.path()).with_settings(settings);
    pipeline::run_etl(&cfg).unwrap();

    let analytics = load_df(&cfg.out_analytics).unwrap();
    assert_eq!(column_str(&analytics, "status_clean", 0).as_deref(), Some("paid"));
    let meta = RunMeta::from_file(&cfg.run_meta).unwrap();
    assert_eq!(
        meta.config.get("status_mapping.settled").map(String::as_str),
        Some("paid")
    );
}

#[test]
fn test_unmatched_user_lowers_match_rate() {
    let tmp = tempfile::tempdir().unwrap();
    let orders = format!(
        "{ORDERS_HEADER}\n1,u1,10,1,2024-01-01,paid\n2,u404,20,1,2024-01-02,paid\n"
    );
    write_raw(tmp.path(), &orders, USERS_CSV);
    let cfg = EtlConfig::from_root(tmp.path());

    let report = pipeline::run_etl(&cfg).unwrap();
    assert_eq!(report.meta.rows_out, 2);
    assert!((report.meta.country_match_rate - 0.5).abs() < 1e-12);

    let revenue = load_df(&cfg.revenue_report).unwrap();
    assert_eq!(revenue.height(), 2);
    assert_eq!(column_str(&revenue, "country", 0).as_deref(), None);
    assert_eq!(column_str(&revenue, "country", 1).as_deref(), Some("US"));
}

#[test]
fn test_infinite_amounts_are_nullified_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let orders = format!(
        "{ORDERS_HEADER}\n1,u1,-inf,1,2024-01-01,paid\n2,u1,inf,1,2024-01-02,paid\n3,u1,7.5,1,2024-01-03,paid\n"
    );
    write_raw(tmp.path(), &orders, USERS_CSV);
    let cfg = EtlConfig::from_root(tmp.path());

    let report = pipeline::run_etl(&cfg).unwrap();
    assert_eq!(report.meta.rows_out, 3);
    assert_eq!(report.meta.coercion_failures.get("amount"), Some(&2));

    let analytics = load_df(&cfg.out_analytics).unwrap();
    let winsor: Vec<Option<f64>> = analytics
        .column("amount_winsor")
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(winsor, vec![None, None, Some(7.5)]);
}
