// SPDX-License-Identifier: Apache-2.0 OR MIT
use serde_json::Value;

use crate::ast::{Argument, HelperCall};
use crate::error::Error;
use crate::registry::{HelperMeta, HelperOutcome, HelperRegistry};
use crate::scope::Scope;

/// Result of running a helper chain segment over a working value.
#[derive(Debug, Clone)]
pub struct ChainResult {
    /// The working value after all transforms.
    pub value: Value,
    /// `false` when a helper returned `Bool(false)` and the chain
    /// short-circuited: the renderer uses the else-body (aggregate) or
    /// skips the entry (per-item).
    pub proceed: bool,
}

/// Runs an ordered list of helpers against a working value.
///
/// Each helper may replace the value (`HelperOutcome::Value`) or vote on
/// continuation (`HelperOutcome::Bool`); exactly `false` stops the chain on
/// the spot. Unknown helper names are no-ops — the value passes through
/// unchanged.
pub fn run_chain(
    calls: &[HelperCall],
    value: Value,
    meta: &HelperMeta,
    scope: &Scope,
    helpers: &HelperRegistry,
) -> Result<ChainResult, Error> {
    let mut working = value;

    for call in calls {
        let Some(helper) = helpers.get(&call.name) else {
            continue;
        };
        let args = materialize_args(&call.args, scope);
        match helper(&working, &args, meta)? {
            HelperOutcome::Bool(false) => {
                return Ok(ChainResult {
                    value: working,
                    proceed: false,
                });
            }
            HelperOutcome::Bool(true) => {}
            HelperOutcome::Value(next) => working = next,
        }
    }

    Ok(ChainResult {
        value: working,
        proceed: true,
    })
}

/// Per-item chain application: same semantics as [`run_chain`], but the
/// working value is a single iterated entry. An entry whose chain
/// short-circuits is skipped entirely — no output and no else-body for that
/// entry. (Rendering the iterate tag's else-body for skipped entries was
/// considered and rejected; "skip with no output" is the contract.)
pub fn run_per_item(
    calls: &[HelperCall],
    item: Value,
    meta: &HelperMeta,
    scope: &Scope,
    helpers: &HelperRegistry,
) -> Result<ChainResult, Error> {
    run_chain(calls, item, meta, scope, helpers)
}

/// Resolves invocation arguments to concrete values. Context-key arguments
/// resolve against the current scope; a key that misses becomes `null`.
fn materialize_args(args: &[Argument], scope: &Scope) -> Vec<Value> {
    args.iter()
        .map(|arg| match arg {
            Argument::Str(text) => Value::String(text.clone()),
            Argument::Int(value) => Value::Number((*value).into()),
            Argument::Bool(flag) => Value::Bool(*flag),
            Argument::Null => Value::Null,
            Argument::Key(key) => scope.resolve(key).unwrap_or(Value::Null),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::KeyPath;
    use serde_json::json;

    fn meta_for(value: &Value) -> HelperMeta {
        HelperMeta {
            value: value.clone(),
            emptiness: crate::value::is_empty(value),
            scope_name: "test".into(),
            index: None,
        }
    }

    fn registry() -> HelperRegistry {
        let mut builder = HelperRegistry::builder();
        builder.register("double", |value, _args, _meta| {
            let n = value.as_i64().unwrap_or(0);
            Ok(HelperOutcome::Value(json!(n * 2)))
        });
        builder.register("positive", |value, _args, _meta| {
            Ok(HelperOutcome::Bool(value.as_i64().unwrap_or(0) > 0))
        });
        builder.build()
    }

    #[test]
    fn helpers_transform_in_order() {
        let calls = vec![
            HelperCall::new("double", vec![]),
            HelperCall::new("double", vec![]),
        ];
        let scope = Scope::top(&json!({}));
        let value = json!(3);
        let result = run_chain(&calls, value.clone(), &meta_for(&value), &scope, &registry()).unwrap();
        assert!(result.proceed);
        assert_eq!(result.value, json!(12));
    }

    #[test]
    fn false_short_circuits_and_keeps_value() {
        let calls = vec![
            HelperCall::new("positive", vec![]),
            HelperCall::new("double", vec![]),
        ];
        let scope = Scope::top(&json!({}));
        let value = json!(-1);
        let result = run_chain(&calls, value.clone(), &meta_for(&value), &scope, &registry()).unwrap();
        assert!(!result.proceed);
        assert_eq!(result.value, json!(-1));
    }

    #[test]
    fn unknown_helper_is_a_noop() {
        let calls = vec![HelperCall::new("mystery", vec![])];
        let scope = Scope::top(&json!({}));
        let value = json!("kept");
        let result = run_chain(&calls, value.clone(), &meta_for(&value), &scope, &registry()).unwrap();
        assert!(result.proceed);
        assert_eq!(result.value, json!("kept"));
    }

    #[test]
    fn key_arguments_resolve_against_scope() {
        let mut builder = HelperRegistry::builder();
        builder.register("first_arg", |_value, args, _meta| {
            Ok(HelperOutcome::Value(args.first().cloned().unwrap_or(Value::Null)))
        });
        let helpers = builder.build();

        let calls = vec![HelperCall::new(
            "first_arg",
            vec![Argument::Key(KeyPath::current(vec!["limit".to_string()]))],
        )];
        let scope = Scope::top(&json!({"limit": 5}));
        let value = Value::Null;
        let result = run_chain(&calls, value.clone(), &meta_for(&value), &scope, &helpers).unwrap();
        assert_eq!(result.value, json!(5));
    }
}
