// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Predicates used to gate sections and filter iterated entries.

use serde_json::Value;
use veneer_engine::{Error, HelperMeta, HelperOutcome, HelperRegistryBuilder};

use super::{expect_exact_args, expect_number};

pub fn register(builder: &mut HelperRegistryBuilder) {
    builder
        .register("is", is)
        .register("not", not)
        .register("gt", gt)
        .register("lt", lt)
        .register("has", has);
}

/// `is(x)` — true when the working value equals the argument.
pub fn is(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_exact_args("is", args, 1)?;
    Ok(HelperOutcome::Bool(value == &args[0]))
}

/// `not(x)` — the inverse of `is`; with no argument, true when the
/// working value is empty.
pub fn not(value: &Value, args: &[Value], meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    if args.is_empty() {
        return Ok(HelperOutcome::Bool(meta.emptiness));
    }
    expect_exact_args("not", args, 1)?;
    Ok(HelperOutcome::Bool(value != &args[0]))
}

pub fn gt(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_exact_args("gt", args, 1)?;
    let bound = expect_number("gt", &args[0], 1)?;
    Ok(HelperOutcome::Bool(
        value.as_f64().is_some_and(|n| n > bound),
    ))
}

pub fn lt(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_exact_args("lt", args, 1)?;
    let bound = expect_number("lt", &args[0], 1)?;
    Ok(HelperOutcome::Bool(
        value.as_f64().is_some_and(|n| n < bound),
    ))
}

/// `has(x)` — membership: substring for strings, element for arrays,
/// key for objects.
pub fn has(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_exact_args("has", args, 1)?;
    let needle = &args[0];
    let found = match value {
        Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        Value::Array(items) => items.contains(needle),
        Value::Object(map) => needle.as_str().map(|n| map.contains_key(n)).unwrap_or(false),
        _ => false,
    };
    Ok(HelperOutcome::Bool(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> HelperMeta {
        HelperMeta {
            emptiness: veneer_engine::is_empty(&value),
            value,
            scope_name: "test".into(),
            index: None,
        }
    }

    #[test]
    fn is_compares_structurally() {
        let value = json!({ "a": 1 });
        let outcome = is(&value, &[json!({ "a": 1 })], &meta(value.clone())).unwrap();
        assert_eq!(outcome, HelperOutcome::Bool(true));
    }

    #[test]
    fn not_without_arguments_tests_emptiness() {
        let value = json!("");
        let outcome = not(&value, &[], &meta(value.clone())).unwrap();
        assert_eq!(outcome, HelperOutcome::Bool(true));
        let value = json!("x");
        let outcome = not(&value, &[], &meta(value.clone())).unwrap();
        assert_eq!(outcome, HelperOutcome::Bool(false));
    }

    #[test]
    fn comparisons_fail_closed_on_non_numbers() {
        let value = json!("nope");
        let outcome = gt(&value, &[json!(1)], &meta(value.clone())).unwrap();
        assert_eq!(outcome, HelperOutcome::Bool(false));
    }

    #[test]
    fn has_checks_membership_per_shape() {
        let m = meta(Value::Null);
        assert_eq!(
            has(&json!("hello"), &[json!("ell")], &m).unwrap(),
            HelperOutcome::Bool(true)
        );
        assert_eq!(
            has(&json!([1, 2]), &[json!(2)], &m).unwrap(),
            HelperOutcome::Bool(true)
        );
        assert_eq!(
            has(&json!({ "k": 1 }), &[json!("k")], &m).unwrap(),
            HelperOutcome::Bool(true)
        );
        assert_eq!(
            has(&json!(5), &[json!(5)], &m).unwrap(),
            HelperOutcome::Bool(false)
        );
    }
}
