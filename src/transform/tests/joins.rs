use super::{floats, strs};
use crate::error::EtlError;
use crate::transform::joins::{Cardinality, JoinSpec, match_rate, safe_left_join};
use anyhow::Result;
use polars::prelude::*;

fn orders() -> Result<DataFrame> {
    Ok(df!(
        "order_id" => ["o1", "o2", "o3"],
        "user_id" => [Some("u1"), Some("u9"), None],
        "amount" => [1.0, 2.0, 3.0],
    )?)
}

fn users() -> Result<DataFrame> {
    Ok(df!("user_id" => ["u1", "u2"], "country" => ["US", "DE"])?)
}

#[test]
fn test_many_to_one_keeps_every_left_row() -> Result<()> {
    let spec = JoinSpec::new(&["user_id"], Cardinality::ManyToOne);
    let out = safe_left_join(&orders()?, &users()?, &spec)?;
    assert_eq!(out.height(), 3);
    assert_eq!(strs(&out, "country"), vec![Some("US".into()), None, None]);
    assert_eq!(floats(&out, "amount"), vec![Some(1.0), Some(2.0), Some(3.0)]);
    assert!((match_rate(&out, "country") - 1.0 / 3.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_duplicate_right_key_is_a_cardinality_violation() -> Result<()> {
    let users = df!("user_id" => ["u1", "u1"], "country" => ["US", "CA"])?;
    let spec = JoinSpec::new(&["user_id"], Cardinality::ManyToOne);
    match safe_left_join(&orders()?, &users, &spec) {
        Err(EtlError::CardinalityViolation { side, value, .. }) => {
            assert_eq!(side, "right");
            assert_eq!(value, "u1");
        }
        other => panic!("expected cardinality violation, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_one_to_many_checks_left_side() -> Result<()> {
    let left = df!("user_id" => ["u1", "u1"])?;
    let spec = JoinSpec::new(&["user_id"], Cardinality::OneToMany);
    assert!(matches!(
        safe_left_join(&left, &users()?, &spec),
        Err(EtlError::CardinalityViolation { side: "left", .. })
    ));
    Ok(())
}

#[test]
fn test_many_to_many_allows_fan_out() -> Result<()> {
    let left = df!("k" => ["a", "a"], "l" => [1, 2])?;
    let right = df!("k" => ["a", "a"], "r" => [3, 4])?;
    let out = safe_left_join(&left, &right, &JoinSpec::new(&["k"], Cardinality::ManyToMany))?;
    assert_eq!(out.height(), 4);
    Ok(())
}

#[test]
fn test_colliding_columns_take_right_suffix() -> Result<()> {
    let left = df!("user_id" => ["u1"], "country" => ["XX"])?;
    let spec = JoinSpec::new(&["user_id"], Cardinality::ManyToOne).with_suffixes("", "_user");
    let out = safe_left_join(&left, &users()?, &spec)?;
    assert_eq!(strs(&out, "country"), vec![Some("XX".into())]);
    assert_eq!(strs(&out, "country_user"), vec![Some("US".into())]);
    Ok(())
}

#[test]
fn test_collision_with_empty_suffixes_is_config_error() -> Result<()> {
    let left = df!("user_id" => ["u1"], "country" => ["XX"])?;
    let spec = JoinSpec::new(&["user_id"], Cardinality::ManyToOne).with_suffixes("", "");
    assert!(matches!(
        safe_left_join(&left, &users()?, &spec),
        Err(EtlError::Config(_))
    ));
    Ok(())
}

#[test]
fn test_right_key_is_aligned_to_left_dtype() -> Result<()> {
    let left = df!("id" => ["1", "2"])?;
    let right = df!("id" => [1i64, 2], "name" => ["one", "two"])?;
    let out = safe_left_join(&left, &right, &JoinSpec::new(&["id"], Cardinality::OneToOne))?;
    assert_eq!(strs(&out, "name"), vec![Some("one".into()), Some("two".into())]);
    Ok(())
}

#[test]
fn test_keys_colliding_after_alignment_violate_cardinality() -> Result<()> {
    let left = df!("id" => [1i64])?;
    let spec = JoinSpec::new(&["id"], Cardinality::ManyToOne);

    let padded = df!("id" => ["1", "01"], "name" => ["a", "b"])?;
    assert!(matches!(
        safe_left_join(&left, &padded, &spec),
        Err(EtlError::CardinalityViolation { side: "right", .. })
    ));

    let fractional = df!("id" => [1.0, 1.5], "name" => ["a", "b"])?;
    assert!(matches!(
        safe_left_join(&left, &fractional, &spec),
        Err(EtlError::CardinalityViolation { side: "right", .. })
    ));
    Ok(())
}
