//! Dataset transforms: schema enforcement, quality gates, cleaning, outliers,
//! deduplication and joins.
//!
//! Every function takes a borrowed frame or column and returns a new one;
//! nothing here mutates its input.

pub mod cleaning;
pub mod dedupe;
pub mod io;
pub mod joins;
pub mod keys;
pub mod outliers;
pub mod quality;
pub mod schema;
pub mod summary;
pub mod types;

pub use cleaning::{
    MissingnessEntry, add_missing_flags, add_time_parts, apply_mapping, missingness_frame,
    missingness_report, normalize_text, normalize_text_expr, parse_datetime,
    parse_datetime_series, parse_timestamp,
};
pub use dedupe::dedupe_keep_latest;
pub use io::{load_df, locate_input, save_df};
pub use joins::{Cardinality, JoinSpec, match_rate, safe_left_join};
pub use outliers::{OutlierBounds, add_outlier_flag, iqr_bounds, winsorize};
pub use quality::{
    QualitySpec, RangeCheck, assert_in_range, assert_non_empty, assert_unique_key,
    require_columns,
};
pub use schema::{Enforced, coerce_series, enforce_schema};
pub use summary::revenue_by_country;
pub use types::{ColumnType, Schema, TimezonePolicy};
