//! Orchestration of the orders/users batch run.
//!
//! A run loads the raw orders and users datasets, gates them through the
//! quality checks, cleans and enriches orders, joins users onto them
//! many-to-one and writes the processed tables, diagnostic reports and a
//! `_run_meta.json` summary.
//!
//! # Example
//!
//! ```no_run
//! use orders_etl::config::EtlConfig;
//! use orders_etl::pipeline::run_etl;
//!
//! let cfg = EtlConfig::from_root(".");
//! let report = run_etl(&cfg)?;
//! println!("{}", report.summary());
//! # Ok::<(), orders_etl::error::EtlError>(())
//! ```
//!
//! The same work is also split into three stages (`load`, `clean`,
//! `analytics`) that communicate through the processed directory, so a
//! failing stage can be rerun on its own.

pub mod executor;
pub mod meta;

pub use executor::{
    RunReport, StageReport, TransformOutput, build_analytics, clean_orders, ensure_row_count,
    load_inputs, load_outputs, run_analytics_stage, run_clean_stage, run_etl, run_load_stage,
    transform,
};
pub use meta::RunMeta;
