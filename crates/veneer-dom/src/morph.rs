// SPDX-License-Identifier: Apache-2.0 OR MIT
//! In-place reconciliation of a live tree against a freshly parsed target.
//!
//! The live tree is mutated to match the target's shape while keeping as
//! many existing nodes as possible, so node identity (and with it widget
//! state such as focus, scroll position, and input values) survives a
//! re-render. Target nodes are consumed: whatever the live tree lacks is
//! moved out of the target subtree rather than copied.

use std::collections::HashMap;

use crate::tree::{Document, NodeId};

/// Reconciles `live` against `target`, both nodes of `doc`. Returns the
/// node that now stands where `live` stood — usually `live` itself, but a
/// replacement when the roots are incompatible.
///
/// Sibling keys are assumed unique; with duplicates the first occurrence
/// wins and later ones are treated as unkeyed.
pub fn reconcile(doc: &mut Document, live: NodeId, target: NodeId) -> NodeId {
    let mut pass = MorphPass::default();
    let root = pass.morph_root(doc, live, target);
    pass.discard_unclaimed(doc);
    root
}

/// Bookkeeping for keyed nodes that are displaced mid-pass.
#[derive(Default)]
struct MorphPass {
    /// Keyed live nodes scanned past without a match, available for
    /// reclaim when their key shows up later in the target.
    saved: HashMap<String, NodeId>,
    /// Keyed target nodes spliced in before their live counterpart was
    /// reached; a displaced live node with the same key swaps into their
    /// place.
    unmatched: HashMap<String, NodeId>,
}

impl MorphPass {
    fn morph_root(&mut self, doc: &mut Document, live: NodeId, target: NodeId) -> NodeId {
        if doc.is_text(live) != doc.is_text(target) {
            doc.detach(target);
            if doc.parent(live).is_some() {
                doc.replace(live, target);
            }
            return target;
        }
        if doc.is_text(live) {
            let text = doc.text(target).unwrap_or_default().to_string();
            doc.set_text(live, text);
            return live;
        }
        if doc.tag(live) != doc.tag(target) {
            // Keep the children; only the root element itself is rebuilt.
            let tag = doc.tag(target).unwrap_or_default().to_string();
            let shell = doc.create_element(tag);
            for child in doc.children(live).to_vec() {
                doc.append(shell, child);
            }
            if doc.parent(live).is_some() {
                doc.replace(live, shell);
            }
            self.morph_element(doc, shell, target);
            return shell;
        }
        self.morph_element(doc, live, target);
        live
    }

    /// Matched pair of the same kind (and, for elements, the same tag).
    fn morph_node(&mut self, doc: &mut Document, live: NodeId, target: NodeId) {
        if doc.is_text(live) {
            let text = doc.text(target).unwrap_or_default().to_string();
            doc.set_text(live, text);
        } else {
            self.morph_element(doc, live, target);
        }
    }

    fn morph_element(&mut self, doc: &mut Document, live: NodeId, target: NodeId) {
        sync_attributes(doc, live, target);
        self.morph_children(doc, live, target);
        sync_widget_state(doc, live, target);
    }

    /// A single left-to-right pass over the target's children, pairing
    /// them against the live children in order.
    fn morph_children(&mut self, doc: &mut Document, live: NodeId, target: NodeId) {
        let wanted = doc.children(target).to_vec();
        let mut index = 0usize;

        for t in wanted {
            let present = doc.children(live).to_vec();
            let found = present[index..]
                .iter()
                .position(|l| compatible(doc, *l, t))
                .map(|offset| index + offset);

            if let Some(at) = found {
                for skipped in &present[index..at] {
                    self.stash(doc, *skipped);
                }
                let matched = present[at];
                self.morph_node(doc, matched, t);
                index += 1;
                continue;
            }

            if let Some(key) = doc.key(t).map(str::to_string) {
                let reclaimable = self
                    .saved
                    .get(&key)
                    .is_some_and(|saved| doc.tag(*saved) == doc.tag(t));
                if reclaimable {
                    let reclaimed = self.saved.remove(&key).expect("checked above");
                    doc.insert(live, index, reclaimed);
                    self.morph_node(doc, reclaimed, t);
                    index += 1;
                    continue;
                }
                // No live counterpart yet; splice the target node in and
                // remember it in case one is displaced later.
                doc.insert(live, index, t);
                self.unmatched.insert(key, t);
                index += 1;
                continue;
            }

            doc.insert(live, index, t);
            index += 1;
        }

        for leftover in doc.children(live)[index..].to_vec() {
            self.stash(doc, leftover);
        }
    }

    /// Removes a live node that found no match. Keyed nodes (and keyed
    /// descendants of unkeyed ones) stay reclaimable; everything else is
    /// dropped.
    fn stash(&mut self, doc: &mut Document, node: NodeId) {
        doc.detach(node);
        if let Some(key) = doc.key(node).map(str::to_string) {
            let swappable = self
                .unmatched
                .get(&key)
                .is_some_and(|placeholder| doc.tag(*placeholder) == doc.tag(node));
            if swappable {
                let placeholder = self.unmatched.remove(&key).expect("checked above");
                self.swap_into_place(doc, node, placeholder);
            } else if let std::collections::hash_map::Entry::Vacant(slot) =
                self.saved.entry(key)
            {
                slot.insert(node);
            }
            return;
        }
        for child in doc.children(node).to_vec() {
            if doc.key(child).is_some() {
                self.stash(doc, child);
            } else if doc.is_element(child) {
                self.salvage_keyed_descendants(doc, child);
            }
        }
    }

    fn salvage_keyed_descendants(&mut self, doc: &mut Document, node: NodeId) {
        for child in doc.children(node).to_vec() {
            if doc.key(child).is_some() {
                self.stash(doc, child);
            } else if doc.is_element(child) {
                self.salvage_keyed_descendants(doc, child);
            }
        }
    }

    /// A displaced live node takes over the spot of an earlier-inserted
    /// target placeholder, then morphs to the placeholder's content.
    fn swap_into_place(&mut self, doc: &mut Document, node: NodeId, placeholder: NodeId) {
        doc.replace(placeholder, node);
        self.morph_node(doc, node, placeholder);
    }

    fn discard_unclaimed(&mut self, doc: &mut Document) {
        for (_, node) in self.saved.drain() {
            doc.detach(node);
        }
        self.unmatched.clear();
    }
}

fn compatible(doc: &Document, live: NodeId, target: NodeId) -> bool {
    if doc.is_text(live) || doc.is_text(target) {
        return doc.is_text(live) && doc.is_text(target);
    }
    if doc.tag(live) != doc.tag(target) {
        return false;
    }
    match (doc.key(live), doc.key(target)) {
        (None, None) => true,
        (live_key, target_key) => live_key == target_key,
    }
}

fn sync_attributes(doc: &mut Document, live: NodeId, target: NodeId) {
    let wanted: Vec<(String, String)> = doc
        .element(target)
        .map(|e| e.attrs.iter().cloned().collect())
        .unwrap_or_default();
    let present: Vec<String> = doc
        .element(live)
        .map(|e| e.attrs.iter().map(|(n, _)| n.clone()).collect())
        .unwrap_or_default();

    for name in &present {
        if !wanted.iter().any(|(n, _)| n == name) {
            doc.remove_attr(live, name);
        }
    }
    for (name, value) in wanted {
        if doc.attr(live, &name) != Some(value.as_str()) {
            doc.set_attr(live, name, value);
        }
    }
}

/// Form controls carry state outside their attributes; the target's state
/// (derived from its markup) overrules whatever the live control held.
fn sync_widget_state(doc: &mut Document, live: NodeId, target: NodeId) {
    let Some(tag) = doc.tag(live).map(str::to_string) else {
        return;
    };
    match tag.as_str() {
        "input" => {
            let (checked, value) = doc
                .element(target)
                .map(|e| (e.checked, e.value.clone()))
                .unwrap_or_default();
            if let Some(element) = doc.element_mut(live) {
                element.checked = checked;
                element.value = value;
            }
        }
        "option" => {
            let selected = doc.element(target).map(|e| e.selected).unwrap_or_default();
            if let Some(element) = doc.element_mut(live) {
                element.selected = selected;
            }
        }
        "textarea" => {
            let value = doc
                .element(target)
                .and_then(|e| e.value.clone())
                .unwrap_or_default();
            let first_text = doc
                .children(live)
                .iter()
                .copied()
                .find(|child| doc.is_text(*child));
            if let Some(text) = first_text {
                doc.set_text(text, value.clone());
            }
            if let Some(element) = doc.element_mut(live) {
                element.value = Some(value);
            }
        }
        _ => {}
    }
}
