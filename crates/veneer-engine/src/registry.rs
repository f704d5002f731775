// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;

/// Signature implemented by named helpers invoked from templates.
///
/// A helper receives the working value, its invocation arguments (already
/// materialized against the current scope), and per-invocation metadata.
pub type Helper =
    dyn Fn(&Value, &[Value], &HelperMeta) -> Result<HelperOutcome, Error> + Send + Sync;

/// Metadata handed to every helper invocation.
#[derive(Debug, Clone)]
pub struct HelperMeta {
    /// The value the tag originally bound, before any chain transforms.
    pub value: Value,
    /// Whether the bound value satisfied the emptiness predicate.
    pub emptiness: bool,
    /// Name of the tag the chain is attached to.
    pub scope_name: String,
    /// Zero-based entry index when running per-item, `None` otherwise.
    pub index: Option<usize>,
}

/// What a helper did with the working value.
///
/// `Bool(false)` short-circuits the chain: the renderer switches to the
/// else-body (aggregate) or skips the entry (per-item). `Bool(true)` passes
/// the working value through unchanged. `Value` replaces it for the next
/// helper in the chain.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum HelperOutcome {
    Bool(bool),
    Value(Value),
}

/// Registry that maps helper names to callable transforms.
///
/// Registries are immutable once built and cheap to clone; concurrent render
/// calls only ever read them. Mutation happens through the builder (or the
/// `Engine` façade, which rebuilds on registration).
#[derive(Clone, Default)]
pub struct HelperRegistry {
    map: Arc<HashMap<String, Arc<Helper>>>,
}

impl HelperRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            map: Arc::new(HashMap::new()),
        }
    }

    /// Returns a new builder for constructing registries.
    pub fn builder() -> HelperRegistryBuilder {
        HelperRegistryBuilder::new()
    }

    /// Fetches a helper by name.
    pub fn get(&self, name: &str) -> Option<Arc<Helper>> {
        self.map.get(name).cloned()
    }

    /// Reports whether the registry contains no helpers.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns a sorted list of the registered helper names.
    pub fn helper_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Accumulates helpers before freezing them into an immutable registry.
#[derive(Default)]
pub struct HelperRegistryBuilder {
    map: HashMap<String, Arc<Helper>>,
}

impl HelperRegistryBuilder {
    /// Creates a new, empty builder.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Registers a helper under the provided name. Last write wins.
    pub fn register<F>(&mut self, name: impl Into<String>, helper: F) -> &mut Self
    where
        F: Fn(&Value, &[Value], &HelperMeta) -> Result<HelperOutcome, Error>
            + Send
            + Sync
            + 'static,
    {
        self.map.insert(name.into(), Arc::new(helper));
        self
    }

    /// Extends the builder with all helpers from an existing registry.
    pub fn extend(&mut self, other: &HelperRegistry) -> &mut Self {
        for (name, helper) in other.map.iter() {
            self.map.insert(name.clone(), helper.clone());
        }
        self
    }

    /// Finalises the builder into an immutable registry.
    pub fn build(self) -> HelperRegistry {
        HelperRegistry {
            map: Arc::new(self.map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> HelperMeta {
        HelperMeta {
            value: Value::Null,
            emptiness: true,
            scope_name: "test".into(),
            index: None,
        }
    }

    #[test]
    fn registers_and_invokes_helpers() {
        let mut builder = HelperRegistry::builder();
        builder.register("shout", |value, _args, _meta| {
            Ok(HelperOutcome::Value(json!(format!("{}!", value.as_str().unwrap_or("")))))
        });
        let registry = builder.build();

        let helper = registry.get("shout").expect("helper registered");
        let outcome = helper(&json!("hey"), &[], &meta()).unwrap();
        assert_eq!(outcome, HelperOutcome::Value(json!("hey!")));
        assert!(registry.get("whisper").is_none());
    }

    #[test]
    fn extend_copies_and_overwrites() {
        let mut first = HelperRegistry::builder();
        first.register("a", |_, _, _| Ok(HelperOutcome::Bool(true)));
        first.register("b", |_, _, _| Ok(HelperOutcome::Bool(true)));
        let base = first.build();

        let mut second = HelperRegistry::builder();
        second.extend(&base);
        second.register("b", |_, _, _| Ok(HelperOutcome::Bool(false)));
        let merged = second.build();

        assert_eq!(merged.helper_names(), vec!["a".to_string(), "b".to_string()]);
        let replaced = merged.get("b").unwrap();
        assert_eq!(
            replaced(&Value::Null, &[], &meta()).unwrap(),
            HelperOutcome::Bool(false)
        );
    }
}
