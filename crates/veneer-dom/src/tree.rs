// SPDX-License-Identifier: Apache-2.0 OR MIT
use smallvec::SmallVec;

/// Attribute that gives a node stable identity across reconciliation.
///
/// Within one reconciliation pass a key value must designate one logical
/// entity and must not appear twice among siblings on either side; that is
/// a caller contract, not a checked condition.
pub const KEY_ATTR: &str = "data-key";

/// Stable handle to a node in a [`Document`] arena.
///
/// Handles are never reused within a document, so a handle held across a
/// reconciliation still names the same logical node — this is what "node
/// identity is preserved" means here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Element or text payload of a node.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

/// Element payload: tag, ordered attributes, and the live widget state that
/// is not attribute-backed (checked state, current input value, option
/// selection). The reconciler copies that state separately from attributes.
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    pub tag: String,
    pub attrs: SmallVec<[(String, String); 4]>,
    pub checked: bool,
    pub value: Option<String>,
    pub selected: bool,
}

#[derive(Debug)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Arena owning every node of both the live tree and any parsed target
/// trees. Nodes are addressed by [`NodeId`] handles; detached nodes stay in
/// the arena (the arena is scoped to the live tree's lifetime, so released
/// nodes are reclaimed when the document is dropped).
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached element node.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.into(),
            ..ElementData::default()
        }))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("document node limit"));
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Returns the node's payload.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Returns the element payload, or `None` for text nodes.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.index()].kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    /// Mutable element payload access.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    /// Returns the element's tag name, or `None` for text nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|data| data.tag.as_str())
    }

    /// Returns the text content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.index()].kind {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element(_) => None,
        }
    }

    /// Overwrites a text node's content. No-op on elements.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let NodeKind::Text(current) = &mut self.nodes[id.index()].kind {
            *current = text.into();
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.index()].kind, NodeKind::Element(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.index()].kind, NodeKind::Text(_))
    }

    /// Returns the node's parent, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Returns the node's children in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Detaches `child` from its current parent (if any) and appends it.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Detaches `child` and inserts it at `index` among `parent`'s
    /// children, clamped to the end.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.index()].parent = Some(parent);
        let children = &mut self.nodes[parent.index()].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Removes the node from its parent's child list. The node itself (and
    /// its subtree) stays alive in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|child| *child != id);
        }
    }

    /// Puts `new` in `old`'s position and detaches `old`. No-op when `old`
    /// has no parent.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        let index = self.position_of(parent, old).unwrap_or(0);
        self.detach(old);
        self.insert(parent, index, new);
    }

    /// Index of `child` among `parent`'s children.
    pub fn position_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Returns an attribute value.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, replacing any existing value. No-op on text nodes.
    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(element) = self.element_mut(id) {
            if let Some(slot) = element.attrs.iter_mut().find(|(attr, _)| *attr == name) {
                slot.1 = value;
            } else {
                element.attrs.push((name, value));
            }
        }
    }

    /// Removes an attribute if present.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attrs.retain(|(attr, _)| attr != name);
        }
    }

    /// The node's identity, read from [`KEY_ATTR`].
    pub fn key(&self, id: NodeId) -> Option<&str> {
        self.attr(id, KEY_ATTR)
    }
}
