// SPDX-License-Identifier: Apache-2.0 OR MIT
use serde_json::Value;

use crate::ast::{Fallback, KeyOrigin, KeyPath};

/// Reserved key under which a loop entry's value is stored in its scope.
pub const DOT_KEY: &str = ".";
/// Reserved zero-based iteration index key.
pub const INDEX_KEY: &str = "@index";
/// Reserved one-based iteration count key.
pub const COUNT_KEY: &str = "@count";

/// Three-reference scope chain used to resolve keys.
///
/// `current` is the innermost data, `parent` the enclosing scope (for `../`
/// traversal), and `root` the outermost data (for `$root.` traversal).
/// Scopes are built per block iteration and dropped after rendering.
#[derive(Debug, Clone)]
pub struct Scope {
    pub current: Value,
    pub parent: Value,
    pub root: Value,
}

impl Scope {
    /// Top-level scope where all three references point at the input data.
    pub fn top(data: &Value) -> Self {
        Self {
            current: data.clone(),
            parent: data.clone(),
            root: data.clone(),
        }
    }

    /// Child scope for a block body: `current` becomes the block's value,
    /// the outer current becomes `parent`, and `root` is carried through.
    pub fn child(&self, current: Value) -> Self {
        Self {
            current,
            parent: self.current.clone(),
            root: self.root.clone(),
        }
    }

    /// Resolves a key against the chain. Returns `None` at the first
    /// missing segment; nothing is implicitly created.
    pub fn resolve(&self, key: &KeyPath) -> Option<Value> {
        let origin = match key.origin {
            KeyOrigin::Current => &self.current,
            KeyOrigin::Parent => &self.parent,
            KeyOrigin::Root => &self.root,
        };

        if key.is_dot() {
            // A bare `.` refers to the loop entry when the scope carries
            // one, otherwise to the scope value itself.
            if let Value::Object(map) = origin {
                if let Some(item) = map.get(DOT_KEY) {
                    return Some(item.clone());
                }
            }
            return Some(origin.clone());
        }
        if key.segments.is_empty() {
            // A lone `../` or `$root.` addresses that scope value.
            return Some(origin.clone());
        }

        let mut value = origin;
        for segment in &key.segments {
            value = project_segment(value, segment)?;
        }
        Some(value.clone())
    }

    /// Resolves `key`, falling back to the supplied expression when the key
    /// is missing. Quoted-literal fallbacks yield the literal; key fallbacks
    /// resolve against this same scope, exactly one hop deep — a fallback
    /// never consults another fallback.
    pub fn resolve_with_fallback(&self, key: &KeyPath, fallback: Option<&Fallback>) -> Option<Value> {
        self.resolve_bounded(key, fallback, 0)
    }

    fn resolve_bounded(
        &self,
        key: &KeyPath,
        fallback: Option<&Fallback>,
        depth: u8,
    ) -> Option<Value> {
        if let Some(value) = self.resolve(key) {
            return Some(value);
        }
        if depth >= 1 {
            return None;
        }
        match fallback {
            Some(Fallback::Literal(text)) => Some(Value::String(text.clone())),
            Some(Fallback::Key(other)) => self.resolve_bounded(other, None, depth + 1),
            None => None,
        }
    }
}

fn project_segment<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}
