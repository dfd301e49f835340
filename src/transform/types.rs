use polars::prelude::{DataType, PlSmallStr, TimeUnit};
use serde::{Deserialize, Serialize};

/// How parsed timestamps are anchored.
#[derive(Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum TimezonePolicy {
    /// Naive inputs are assumed to be UTC; offset inputs are converted to UTC.
    #[default]
    Utc,
    /// Keep the wall-clock reading as written and attach no zone.
    Naive,
}

impl TimezonePolicy {
    pub fn time_zone(self) -> Option<PlSmallStr> {
        match self {
            Self::Utc => Some(PlSmallStr::from_static("UTC")),
            Self::Naive => None,
        }
    }

    pub fn dtype(self) -> DataType {
        DataType::Datetime(TimeUnit::Microseconds, self.time_zone())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utc => "utc",
            Self::Naive => "naive",
        }
    }
}

/// Canonical column types a schema can declare.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Timestamp(TimezonePolicy),
    Boolean,
}

impl ColumnType {
    pub fn dtype(self) -> DataType {
        match self {
            Self::String => DataType::String,
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Timestamp(policy) => policy.dtype(),
            Self::Boolean => DataType::Boolean,
        }
    }
}

/// Ordered mapping of column name to canonical type.
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct Schema {
    pub columns: Vec<(String, ColumnType)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, kind: ColumnType) -> Self {
        self.columns.push((name.into(), kind));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Canonical schema for raw orders. `created_at` stays text here and is
    /// parsed by the datetime stage so its timezone policy stays configurable.
    pub fn orders() -> Self {
        Self::new()
            .with("order_id", ColumnType::String)
            .with("user_id", ColumnType::String)
            .with("amount", ColumnType::Float)
            .with("quantity", ColumnType::Integer)
            .with("created_at", ColumnType::String)
            .with("status", ColumnType::String)
    }

    pub fn users() -> Self {
        Self::new()
            .with("user_id", ColumnType::String)
            .with("country", ColumnType::String)
            .with("signup_date", ColumnType::String)
    }
}

pub const ORDERS_REQUIRED: [&str; 6] = [
    "order_id",
    "user_id",
    "amount",
    "quantity",
    "created_at",
    "status",
];

pub const USERS_REQUIRED: [&str; 3] = ["user_id", "country", "signup_date"];
