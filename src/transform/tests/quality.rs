use crate::error::EtlError;
use crate::transform::quality::{
    QualitySpec, RangeCheck, assert_in_range, assert_non_empty, assert_unique_key,
    require_columns,
};
use anyhow::Result;
use polars::prelude::*;

#[test]
fn test_unique_key_passes_on_distinct_values() -> Result<()> {
    let df = df!("user_id" => ["u1", "u2"])?;
    assert_unique_key(&df, "user_id", false, "users")?;
    Ok(())
}

#[test]
fn test_unique_key_reports_duplicate_value() -> Result<()> {
    let df = df!("user_id" => ["u1", "u1"])?;
    match assert_unique_key(&df, "user_id", false, "users") {
        Err(EtlError::UniquenessViolation { key, value, .. }) => {
            assert_eq!(key, "user_id");
            assert_eq!(value, "u1");
        }
        other => panic!("expected uniqueness violation, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_unique_key_rejects_nulls_unless_allowed() -> Result<()> {
    let df = df!("user_id" => [Some("u1"), None, None])?;
    assert!(matches!(
        assert_unique_key(&df, "user_id", false, "users"),
        Err(EtlError::NullKey { count: 2, .. })
    ));
    // Nulls are not duplicates of each other.
    assert_unique_key(&df, "user_id", true, "users")?;
    Ok(())
}

#[test]
fn test_require_columns_names_first_missing() -> Result<()> {
    let df = df!("a" => [1])?;
    let err = require_columns(&df, &["a", "b", "c"], "t").unwrap_err();
    assert!(err.to_string().contains("'b'"), "{err}");
    Ok(())
}

#[test]
fn test_empty_dataset_is_rejected() -> Result<()> {
    let df = df!("a" => Vec::<i64>::new())?;
    assert!(matches!(
        assert_non_empty(&df, "orders"),
        Err(EtlError::EmptyDataset { .. })
    ));
    Ok(())
}

#[test]
fn test_range_bounds_are_inclusive_and_ignore_nulls() -> Result<()> {
    let s = Series::new("quantity".into(), [Some(1.0), None, Some(100.0)]);
    assert_in_range(&s, Some(1.0), Some(100.0))?;

    match assert_in_range(&s, Some(1.0), Some(50.0)) {
        Err(EtlError::RangeViolation { column, value, .. }) => {
            assert_eq!(column, "quantity");
            assert_eq!(value, 100.0);
        }
        other => panic!("expected range violation, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_quality_spec_is_fail_fast_in_declared_order() -> Result<()> {
    // Both the uniqueness and range checks would fail; uniqueness runs first.
    let df = df!("id" => ["a", "a"], "amount" => [-1.0, 5.0])?;
    let spec = QualitySpec::new("orders")
        .require(&["id", "amount"])
        .unique("id", false)
        .range(RangeCheck::new("amount", Some(0.0), None));
    assert!(matches!(
        spec.evaluate(&df),
        Err(EtlError::UniquenessViolation { .. })
    ));
    Ok(())
}

#[test]
fn test_quality_spec_from_json() -> Result<()> {
    let spec: QualitySpec = serde_json::from_str(
        r#"{"dataset": "orders", "ranges": [{"column": "amount", "lo": 0.0}]}"#,
    )?;
    assert!(spec.non_empty);
    assert_eq!(spec.ranges[0].hi, None);
    Ok(())
}
