#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Template language parser and renderer for the Veneer view stack.
//!
//! Templates interleave literal text with `{{ }}` tags: interpolations with
//! fallbacks and helper chains, block sections with else bodies, `each`
//! iteration, partial inclusion, and a verbatim escape block. Parsing is
//! structural (tokenizer plus an explicit section stack), helpers and views
//! live in explicit registries passed into the render call, and malformed
//! tag pairs degrade to literal text so partial output stays usable.

pub mod ast;
pub mod chain;
mod error;
pub mod lexer;
mod parser;
mod registry;
mod scope;
pub mod value;
mod views;

pub use ast::{
    Argument, Ast, Block, EscapeNode, Fallback, HelperCall, HelperChain, InterpolationNode,
    KeyOrigin, KeyPath, Node, SectionNode, Span, TextNode,
};
pub use error::Error;
pub use parser::{EACH_HELPER, ESCAPE_TAG, RAW_HELPER};
pub use registry::{Helper, HelperMeta, HelperOutcome, HelperRegistry, HelperRegistryBuilder};
pub use scope::{Scope, COUNT_KEY, DOT_KEY, INDEX_KEY};
pub use value::{html_escape, is_empty, value_to_string};
pub use views::{expand_views, ViewRegistry, ViewRegistryBuilder, ViewSource};

use serde_json::{Map, Value};
use std::fmt;

use chain::run_chain;

/// Depth cap for re-rendering resolved strings that contain tag markers.
/// Past the cap the text is emitted literally, which bounds fragments that
/// keep producing themselves.
const MAX_FRAGMENT_DEPTH: usize = 16;

/// Parsed template with associated AST and original source.
#[derive(Clone)]
pub struct Template {
    name: String,
    source: String,
    ast: Ast,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

impl Template {
    /// Parses template source with no partial inclusion available.
    pub fn parse_str(name: &str, source: &str) -> Result<Self, Error> {
        Self::parse(name, source, &ViewRegistry::empty())
    }

    /// Parses template source, splicing `{{ >name }}` inclusion markers
    /// from the given view registry first.
    pub fn parse(name: &str, source: &str, views: &ViewRegistry) -> Result<Self, Error> {
        let expanded = views::expand_views(source, views)?;
        let ast = parser::parse_template(name, &expanded)?;
        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            ast,
        })
    }

    /// Returns the template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the original (pre-expansion) template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns a reference to the parsed AST.
    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Renders the template against the provided data.
    pub fn render(&self, data: &Value, helpers: &HelperRegistry) -> Result<String, Error> {
        let renderer = Renderer { helpers, depth: 0 };
        let scope = Scope::top(data);
        let mut output = String::new();
        renderer.render_block(&self.ast.root, &scope, &mut output)?;
        Ok(output)
    }
}

struct Renderer<'a> {
    helpers: &'a HelperRegistry,
    depth: usize,
}

impl Renderer<'_> {
    fn render_block(&self, block: &Block, scope: &Scope, out: &mut String) -> Result<(), Error> {
        for node in &block.nodes {
            match node {
                Node::Text(text) => out.push_str(&text.text),
                Node::Escape(escape) => out.push_str(&escape.text),
                Node::Interpolation(node) => self.render_interpolation(node, scope, out)?,
                Node::Section(node) => self.render_section(node, scope, out)?,
            }
        }
        Ok(())
    }

    fn render_section(
        &self,
        node: &SectionNode,
        scope: &Scope,
        out: &mut String,
    ) -> Result<(), Error> {
        let bound = scope.resolve(&node.key).unwrap_or(Value::Null);
        let meta = HelperMeta {
            value: bound.clone(),
            emptiness: is_empty(&bound),
            scope_name: node.name.clone(),
            index: None,
        };

        let aggregate = run_chain(&node.chain.aggregate, bound, &meta, scope, self.helpers)?;
        if !aggregate.proceed {
            return self.render_else(node, scope, out);
        }
        let value = aggregate.value;

        if node.chain.iterate {
            if is_empty(&value) {
                return self.render_else(node, scope, out);
            }
            return self.render_entries(node, &value, scope, out);
        }

        if is_empty(&value) {
            return self.render_else(node, scope, out);
        }

        let child = scope.child(synthetic_scope(&value, None, 0));
        self.render_block(&node.inner, &child, out)
    }

    /// The else-body renders with the unchanged outer context.
    fn render_else(&self, node: &SectionNode, scope: &Scope, out: &mut String) -> Result<(), Error> {
        match &node.else_body {
            Some(body) => self.render_block(body, scope, out),
            None => Ok(()),
        }
    }

    fn render_entries(
        &self,
        node: &SectionNode,
        value: &Value,
        scope: &Scope,
        out: &mut String,
    ) -> Result<(), Error> {
        let entries: Vec<(Option<String>, Value)> = match value {
            Value::Array(items) => items.iter().map(|item| (None, item.clone())).collect(),
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| (Some(key.clone()), item.clone()))
                .collect(),
            // Scalars have no own-enumerable entries; nothing iterates.
            _ => Vec::new(),
        };

        for (position, (key, item)) in entries.into_iter().enumerate() {
            let meta = HelperMeta {
                value: item.clone(),
                emptiness: is_empty(&item),
                scope_name: node.name.clone(),
                index: Some(position),
            };
            let per_item =
                chain::run_per_item(&node.chain.per_item, item, &meta, scope, self.helpers)?;
            if !per_item.proceed {
                // Skipped entry: no output, no else-body.
                continue;
            }
            let child = scope.child(synthetic_scope(&per_item.value, key.as_deref(), position));
            self.render_block(&node.inner, &child, out)?;
        }
        Ok(())
    }

    fn render_interpolation(
        &self,
        node: &InterpolationNode,
        scope: &Scope,
        out: &mut String,
    ) -> Result<(), Error> {
        let Some(resolved) = scope.resolve_with_fallback(&node.key, node.fallback.as_ref()) else {
            return Ok(());
        };

        let meta = HelperMeta {
            value: resolved.clone(),
            emptiness: is_empty(&resolved),
            scope_name: node.key.to_string(),
            index: None,
        };
        let result = run_chain(&node.chain.aggregate, resolved, &meta, scope, self.helpers)?;
        if !result.proceed {
            return Ok(());
        }

        if let Value::String(text) = &result.value {
            // Server-composed fragments: a resolved string carrying tag
            // markers renders recursively against the same scope.
            if text.contains("{{") && self.depth < MAX_FRAGMENT_DEPTH {
                let template = Template::parse_str("fragment", text)?;
                let nested = Renderer {
                    helpers: self.helpers,
                    depth: self.depth + 1,
                };
                return nested.render_block(&template.ast.root, scope, out);
            }
        }

        let text = value_to_string(&result.value);
        if node.chain.raw {
            out.push_str(&text);
        } else {
            out.push_str(&html_escape(&text));
        }
        Ok(())
    }
}

/// Builds the scope value for a block body or loop entry: the entry itself
/// under the dot-key, the reserved index/count keys, and — when the entry is
/// an object — its own properties merged in so they are directly
/// addressable inside the body.
fn synthetic_scope(item: &Value, key: Option<&str>, position: usize) -> Value {
    let mut map = Map::new();
    if let Value::Object(props) = item {
        for (name, value) in props {
            map.insert(name.clone(), value.clone());
        }
    }
    map.insert(DOT_KEY.to_string(), item.clone());
    match key {
        Some(key) => map.insert(INDEX_KEY.to_string(), Value::String(key.to_string())),
        None => map.insert(INDEX_KEY.to_string(), Value::Number(position.into())),
    };
    map.insert(COUNT_KEY.to_string(), Value::Number((position + 1).into()));
    Value::Object(map)
}

/// Owning façade over the helper and view registries.
///
/// Registration takes `&mut self` while rendering takes `&self`, so the
/// single-writer discipline the registries need falls out of the borrow
/// rules; wrap the engine in a lock if registration must happen while other
/// threads render.
#[derive(Clone, Default)]
pub struct Engine {
    helpers: HelperRegistry,
    views: ViewRegistry,
}

impl Engine {
    /// Creates an engine with empty registries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine from pre-built registries.
    pub fn with_registries(helpers: HelperRegistry, views: ViewRegistry) -> Self {
        Self { helpers, views }
    }

    /// Returns the current helper registry.
    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    /// Returns the current view registry.
    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    /// Registers a single helper. Last write wins.
    pub fn add_helper<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&Value, &[Value], &HelperMeta) -> Result<HelperOutcome, Error>
            + Send
            + Sync
            + 'static,
    {
        let mut builder = HelperRegistry::builder();
        builder.extend(&self.helpers);
        builder.register(name, helper);
        self.helpers = builder.build();
    }

    /// Bulk helper registration through a builder callback.
    pub fn install_helpers(&mut self, install: impl FnOnce(&mut HelperRegistryBuilder)) {
        let mut builder = HelperRegistry::builder();
        builder.extend(&self.helpers);
        install(&mut builder);
        self.helpers = builder.build();
    }

    /// Registers a single static view. Last write wins.
    pub fn add_view(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let mut builder = ViewRegistry::builder();
        builder.extend(&self.views);
        builder.register(name, content);
        self.views = builder.build();
    }

    /// Registers many static views at once.
    pub fn add_views<N, C>(&mut self, entries: impl IntoIterator<Item = (N, C)>)
    where
        N: Into<String>,
        C: Into<String>,
    {
        let mut builder = ViewRegistry::builder();
        builder.extend(&self.views);
        for (name, content) in entries {
            builder.register(name, content);
        }
        self.views = builder.build();
    }

    /// Registers a view whose content is produced by a function.
    pub fn add_view_fn<F>(&mut self, name: impl Into<String>, producer: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        let mut builder = ViewRegistry::builder();
        builder.extend(&self.views);
        builder.register_fn(name, producer);
        self.views = builder.build();
    }

    /// Renders a template string — or, when the argument names a registered
    /// view, that view's content — against the provided data.
    pub fn render(&self, template_or_view: &str, data: &Value) -> Result<String, Error> {
        let (name, source) = match self.views.get(template_or_view) {
            Some(content) => (template_or_view, content),
            None => ("inline", template_or_view.to_string()),
        };
        let template = Template::parse(name, &source, &self.views)?;
        template.render(data, &self.helpers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, data: Value) -> String {
        Engine::new().render(template, &data).unwrap()
    }

    #[test]
    fn tagless_template_is_returned_unchanged() {
        let text = "plain <b>markup</b> & text";
        assert_eq!(render(text, json!({})), text);
    }

    #[test]
    fn interpolation_resolves_dotted_keys() {
        assert_eq!(render("{{ a.b }}", json!({"a": {"b": "deep"}})), "deep");
        assert_eq!(render("{{ a.b }}", json!({})), "");
    }

    #[test]
    fn interpolation_escapes_by_default() {
        let data = json!({"name": "<s>&</s>"});
        assert_eq!(render("{{ name }}", data.clone()), "&lt;s&gt;&amp;&lt;/s&gt;");
        assert_eq!(render("{{ name | raw }}", data), "<s>&</s>");
    }

    #[test]
    fn fallback_literal_and_key() {
        assert_eq!(render("{{ missing || \"x\" }}", json!({})), "x");
        assert_eq!(render("{{ missing || other }}", json!({"other": "y"})), "y");
    }

    #[test]
    fn section_renders_inner_or_else_by_emptiness() {
        let template = "{{ #value }}in{{ :value }}out{{ /value }}";
        for empty in [json!(""), json!(false), Value::Null, json!({})] {
            assert_eq!(render(template, json!({"value": empty})), "out");
        }
        for full in [json!(0), json!("x"), json!([1]), json!({"k": 1})] {
            assert_eq!(render(template, json!({"value": full})), "in");
        }
        assert_eq!(render(template, json!({})), "out");
    }

    #[test]
    fn each_renders_per_entry_with_indices() {
        let template = "{{ #items|each }}{{ @index }}:{{ . }};{{ /items }}";
        let output = render(template, json!({"items": ["a", "b", "c"]}));
        assert_eq!(output, "0:a;1:b;2:c;");

        let counted = render(
            "{{ #items|each }}{{ @count }}{{ /items }}",
            json!({"items": ["x", "y"]}),
        );
        assert_eq!(counted, "12");
    }

    #[test]
    fn each_over_object_exposes_keys_and_merged_props() {
        let template = "{{ #users|each }}{{ @index }}={{ name }};{{ /users }}";
        let output = render(
            template,
            json!({"users": {"u1": {"name": "Ada"}, "u2": {"name": "Brin"}}}),
        );
        assert_eq!(output, "u1=Ada;u2=Brin;");
    }

    #[test]
    fn each_empty_collection_uses_else_body() {
        let template = "{{ #items|each }}x{{ :items }}none{{ /items }}";
        assert_eq!(render(template, json!({"items": []})), "none");
    }

    #[test]
    fn block_scope_reaches_parent_and_root() {
        let template = "{{ #inner }}{{ ../label }}/{{ $root.site }}{{ /inner }}";
        let data = json!({"inner": {"x": 1}, "label": "up", "site": "top"});
        assert_eq!(render(template, data), "up/top");
    }

    #[test]
    fn aggregate_helper_false_switches_to_else() {
        let mut engine = Engine::new();
        engine.add_helper("is", |value, args, _meta| {
            Ok(HelperOutcome::Bool(args.first() == Some(value)))
        });
        let template = "{{ #flag|is(true) }}yes{{ :flag }}no{{ /flag }}";
        assert_eq!(engine.render(template, &json!({"flag": false})).unwrap(), "no");
        assert_eq!(engine.render(template, &json!({"flag": true})).unwrap(), "yes");
    }

    #[test]
    fn per_item_helper_false_skips_the_entry() {
        let mut engine = Engine::new();
        engine.add_helper("positive", |value, _args, _meta| {
            Ok(HelperOutcome::Bool(value.as_i64().unwrap_or(0) > 0))
        });
        let template = "{{ #nums|each|positive }}{{ . }};{{ /nums }}";
        let output = engine
            .render(template, &json!({"nums": [2, -1, 3]}))
            .unwrap();
        assert_eq!(output, "2;3;");
    }

    #[test]
    fn escape_block_round_trips_tag_syntax() {
        let template = "{{ #~ }}{{ #items|each }}{{ . }}{{ /items }}{{ /~ }}";
        let output = render(template, json!({"items": [1]}));
        assert_eq!(output, "{{ #items|each }}{{ . }}{{ /items }}");
    }

    #[test]
    fn view_name_renders_registered_content() {
        let mut engine = Engine::new();
        engine.add_view("greeting", "hi {{ name }}");
        assert_eq!(
            engine.render("greeting", &json!({"name": "sam"})).unwrap(),
            "hi sam"
        );
    }

    #[test]
    fn partial_marker_splices_view() {
        let mut engine = Engine::new();
        engine.add_views([("row", "<li>{{ . }}</li>")]);
        let template = "{{ #items|each }}{{ >row }}{{ /items }}";
        let output = engine.render(template, &json!({"items": ["a", "b"]})).unwrap();
        assert_eq!(output, "<li>a</li><li>b</li>");
    }

    #[test]
    fn self_including_partial_fails_the_render_call() {
        let mut engine = Engine::new();
        engine.add_view("loop", "{{ >loop }}");
        let err = engine.render("loop", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn dynamic_fragment_renders_recursively() {
        let data = json!({"banner": "[{{ title }}]", "title": "news"});
        assert_eq!(render("{{ banner }}", data), "[news]");
    }

    #[test]
    fn self_producing_fragment_is_depth_bounded() {
        let data = json!({"veneer": "{{ veneer }}"});
        // Sixteen levels deep the marker is emitted literally instead of
        // recursing forever.
        assert_eq!(render("{{ veneer }}", data), "{{ veneer }}");
    }

    #[test]
    fn malformed_pair_keeps_remainder_as_text() {
        let output = render("a{{ #open }}b", json!({}));
        assert_eq!(output, "a{{ #open }}b");
    }
}
