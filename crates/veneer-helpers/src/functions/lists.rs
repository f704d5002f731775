// SPDX-License-Identifier: Apache-2.0 OR MIT
use serde_json::{json, Value};
use veneer_engine::{value_to_string, Error, HelperMeta, HelperOutcome, HelperRegistryBuilder};

use super::expect_no_args;

pub fn register(builder: &mut HelperRegistryBuilder) {
    builder
        .register("count", count)
        .register("reverse", reverse)
        .register("sort", sort)
        .register("first", first)
        .register("last", last);
}

/// `count` — element count for arrays and objects, character count for
/// strings, zero otherwise.
pub fn count(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_no_args("count", args)?;
    let n = match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => 0,
    };
    Ok(HelperOutcome::Value(json!(n)))
}

pub fn reverse(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_no_args("reverse", args)?;
    let out = match value {
        Value::Array(items) => {
            let mut items = items.clone();
            items.reverse();
            Value::Array(items)
        }
        Value::String(s) => json!(s.chars().rev().collect::<String>()),
        other => other.clone(),
    };
    Ok(HelperOutcome::Value(out))
}

/// `sort` — orders array elements by their string form; non-arrays pass
/// through unchanged.
pub fn sort(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_no_args("sort", args)?;
    let out = match value {
        Value::Array(items) => {
            let mut items = items.clone();
            items.sort_by_key(|item| value_to_string(item));
            Value::Array(items)
        }
        other => other.clone(),
    };
    Ok(HelperOutcome::Value(out))
}

pub fn first(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_no_args("first", args)?;
    let out = match value {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };
    Ok(HelperOutcome::Value(out))
}

pub fn last(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_no_args("last", args)?;
    let out = match value {
        Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };
    Ok(HelperOutcome::Value(out))
}
