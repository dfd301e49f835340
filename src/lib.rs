//! # orders-etl - Batch ETL for order analytics
//!
//! Turns raw `orders` and `users` extracts into an analytics-ready table.
//! Inputs are schema-enforced, checked, cleaned, joined and summarized, and
//! every run leaves a small JSON metadata record behind.
//!
//! ## Quick Start
//!
//! ```no_run
//! use orders_etl::config::EtlConfig;
//! use orders_etl::pipeline::run_etl;
//!
//! let report = run_etl(&EtlConfig::from_root("."))?;
//! println!("{} rows, match rate {:.2}", report.meta.rows_out, report.meta.country_match_rate);
//! # Ok::<(), orders_etl::error::EtlError>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`transform`]: dataset transforms (schema, quality, cleaning, outliers, dedupe, joins)
//! - [`pipeline`]: run orchestration and the run metadata record
//! - [`config`]: project paths and tunable transform settings
//! - [`error`]: error types and handling utilities
//! - [`logging`]: console and rolling file logging
//!
//! ## Lazy Evaluation
//!
//! Expression-shaped steps (text normalization, flags, time parts, the join
//! and the revenue summary) are built on Polars' `LazyFrame` and collected
//! at the end of each step, so every stage boundary holds a materialized
//! `DataFrame`.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod transform;
