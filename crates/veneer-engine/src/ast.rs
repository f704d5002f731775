// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use smallvec::SmallVec;

/// Byte offsets into the original template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Root AST structure for a parsed template.
#[derive(Debug, Clone)]
pub struct Ast {
    pub name: String,
    pub root: Block,
}

impl Ast {
    pub fn new(name: impl Into<String>, root: Block) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }
}

/// A sequential block of nodes.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub nodes: Vec<Node>,
}

impl Block {
    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }
}

/// Node types recognised by the parser.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Node {
    Text(TextNode),
    Interpolation(InterpolationNode),
    Section(SectionNode),
    Escape(EscapeNode),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(node) => node.span,
            Node::Interpolation(node) => node.span,
            Node::Section(node) => node.span,
            Node::Escape(node) => node.span,
        }
    }
}

/// Raw text literal.
#[derive(Debug, Clone)]
pub struct TextNode {
    pub span: Span,
    pub text: String,
}

impl TextNode {
    pub fn new(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }
}

/// Dotted key with an optional scope-switch prefix (`$root.` or `../`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    pub origin: KeyOrigin,
    /// Path segments after the prefix. Empty for the bare dot key.
    pub segments: SmallVec<[String; 4]>,
}

/// Which scope reference a key starts resolving from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyOrigin {
    Current,
    Parent,
    Root,
}

impl KeyPath {
    pub fn current(segments: impl IntoIterator<Item = String>) -> Self {
        Self {
            origin: KeyOrigin::Current,
            segments: segments.into_iter().collect(),
        }
    }

    /// The bare `.` key referring to the scope's current value.
    pub fn dot() -> Self {
        Self {
            origin: KeyOrigin::Current,
            segments: SmallVec::new(),
        }
    }

    pub fn is_dot(&self) -> bool {
        self.origin == KeyOrigin::Current && self.segments.is_empty()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            KeyOrigin::Current => {}
            KeyOrigin::Parent => f.write_str("../")?,
            KeyOrigin::Root => f.write_str("$root.")?,
        }
        if self.segments.is_empty() {
            if self.origin == KeyOrigin::Current {
                f.write_str(".")?;
            }
            return Ok(());
        }
        f.write_str(&self.segments.join("."))
    }
}

/// Literal or key argument inside a helper invocation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Argument {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
    Key(KeyPath),
}

/// A single named transform in a helper chain.
#[derive(Debug, Clone)]
pub struct HelperCall {
    pub name: String,
    pub args: Vec<Argument>,
}

impl HelperCall {
    pub fn new(name: impl Into<String>, args: Vec<Argument>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Ordered helper chain attached to a tag, split at the `each` mode switch.
///
/// `aggregate` helpers run once against the whole bound value; `per_item`
/// helpers run once per iterated entry. Without the mode switch `per_item`
/// is empty and the block stays in single-value mode.
#[derive(Debug, Clone, Default)]
pub struct HelperChain {
    pub aggregate: SmallVec<[HelperCall; 2]>,
    pub per_item: SmallVec<[HelperCall; 2]>,
    pub iterate: bool,
    pub raw: bool,
}

impl HelperChain {
    pub fn is_noop(&self) -> bool {
        self.aggregate.is_empty() && self.per_item.is_empty() && !self.iterate
    }
}

/// Single-value interpolation (`{{ key || fallback | helpers }}`).
#[derive(Debug, Clone)]
pub struct InterpolationNode {
    pub span: Span,
    pub key: KeyPath,
    pub fallback: Option<Fallback>,
    pub chain: HelperChain,
}

/// Fallback expression after `||`: a quoted literal or another key.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Fallback {
    Literal(String),
    Key(KeyPath),
}

/// Block tag with an inner body and optional else body.
#[derive(Debug, Clone)]
pub struct SectionNode {
    pub span: Span,
    pub name: String,
    pub key: KeyPath,
    pub chain: HelperChain,
    pub inner: Block,
    pub else_body: Option<Block>,
}

/// Escape block whose content is emitted verbatim, tag syntax included.
#[derive(Debug, Clone)]
pub struct EscapeNode {
    pub span: Span,
    pub text: String,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(node) => write!(f, "Text({:?})", node.text),
            Node::Interpolation(node) => write!(f, "Interpolation({})", node.key),
            Node::Section(node) => write!(f, "Section({})", node.name),
            Node::Escape(_) => write!(f, "Escape"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_path_display_includes_prefix() {
        let mut key = KeyPath::current(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(key.to_string(), "a.b");
        key.origin = KeyOrigin::Root;
        assert_eq!(key.to_string(), "$root.a.b");
        key.origin = KeyOrigin::Parent;
        assert_eq!(key.to_string(), "../a.b");
        assert_eq!(KeyPath::dot().to_string(), ".");
    }

    #[test]
    fn chain_without_helpers_is_noop() {
        let chain = HelperChain::default();
        assert!(chain.is_noop());
    }
}
