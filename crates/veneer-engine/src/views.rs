// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::parser::{find_tag_end, find_tag_start};

/// A named template fragment, stored verbatim or produced on demand.
#[derive(Clone)]
pub enum ViewSource {
    Static(String),
    Dynamic(Arc<dyn Fn() -> String + Send + Sync>),
}

impl ViewSource {
    /// Materializes the fragment's current content.
    pub fn content(&self) -> String {
        match self {
            ViewSource::Static(text) => text.clone(),
            ViewSource::Dynamic(producer) => producer(),
        }
    }
}

impl fmt::Debug for ViewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewSource::Static(text) => f.debug_tuple("Static").field(text).finish(),
            ViewSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Registry that maps view names to template fragments.
///
/// Like [`crate::HelperRegistry`], view registries are immutable once built
/// and cheap to clone, so render calls only ever read them.
#[derive(Clone, Default)]
pub struct ViewRegistry {
    map: Arc<HashMap<String, ViewSource>>,
}

impl ViewRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            map: Arc::new(HashMap::new()),
        }
    }

    /// Returns a new builder for constructing registries.
    pub fn builder() -> ViewRegistryBuilder {
        ViewRegistryBuilder::new()
    }

    /// Fetches a view's current content by name.
    pub fn get(&self, name: &str) -> Option<String> {
        self.map.get(name).map(ViewSource::content)
    }

    /// Reports whether a view is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Returns a sorted list of the registered view names.
    pub fn view_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Accumulates views before freezing them into an immutable registry.
#[derive(Default)]
pub struct ViewRegistryBuilder {
    map: HashMap<String, ViewSource>,
}

impl ViewRegistryBuilder {
    /// Creates a new, empty builder.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Registers a static view. Last write wins.
    pub fn register(&mut self, name: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.map
            .insert(name.into(), ViewSource::Static(content.into()));
        self
    }

    /// Registers a view whose content is produced by a function at lookup.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, producer: F) -> &mut Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.map
            .insert(name.into(), ViewSource::Dynamic(Arc::new(producer)));
        self
    }

    /// Extends the builder with all views from an existing registry.
    pub fn extend(&mut self, other: &ViewRegistry) -> &mut Self {
        for (name, view) in other.map.iter() {
            self.map.insert(name.clone(), view.clone());
        }
        self
    }

    /// Finalises the builder into an immutable registry.
    pub fn build(self) -> ViewRegistry {
        ViewRegistry {
            map: Arc::new(self.map),
        }
    }
}

/// Splices `{{ >name }}` inclusion markers with registered view content,
/// recursively, before the template is parsed. Unknown names expand to the
/// empty string. A partial that transitively includes itself is a parse
/// error; the expansion path is tracked explicitly so the check is exact
/// rather than a pass-count heuristic.
pub fn expand_views(source: &str, views: &ViewRegistry) -> Result<String, Error> {
    let mut out = String::with_capacity(source.len());
    let mut path: Vec<String> = Vec::new();
    expand_into(&mut out, source, views, &mut path)?;
    Ok(out)
}

fn expand_into(
    out: &mut String,
    source: &str,
    views: &ViewRegistry,
    path: &mut Vec<String>,
) -> Result<(), Error> {
    let bytes = source.as_bytes();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        let Some(open) = find_tag_start(bytes, cursor) else {
            out.push_str(&source[cursor..]);
            break;
        };
        out.push_str(&source[cursor..open]);

        let Some(close) = find_tag_end(bytes, open + 2) else {
            // Unterminated tag window; emit the rest verbatim and let the
            // parser handle it as literal text.
            out.push_str(&source[open..]);
            break;
        };

        let body = source[open + 2..close].trim();
        if let Some(name) = body.strip_prefix('>') {
            let name = name.trim();
            if path.iter().any(|seen| seen == name) {
                return Err(Error::parse(
                    format!("partial \"{name}\" includes itself"),
                    None,
                ));
            }
            if let Some(content) = views.get(name) {
                path.push(name.to_string());
                expand_into(out, &content, views, path)?;
                path.pop();
            }
            // Unknown partials expand to nothing.
        } else {
            out.push_str(&source[open..close + 2]);
        }
        cursor = close + 2;
    }

    Ok(())
}
