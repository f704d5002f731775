// SPDX-License-Identifier: Apache-2.0 OR MIT
//! An arena-backed markup tree with a keyed reconciler.
//!
//! [`Document`] owns every node; [`NodeId`] handles are plain copyable
//! integers that stay valid for the document's lifetime, which is what
//! lets [`reconcile`] promise identity preservation — a node kept across
//! a morph keeps its handle.
//!
//! The usual flow: [`parse_fragment`] the current markup once to get a
//! live tree, then for each re-render parse the new markup and
//! [`reconcile`] the live root against it.

#![forbid(unsafe_code)]

mod morph;
mod parse;
mod serialize;
mod tree;

pub use morph::reconcile;
pub use parse::{parse_fragment, parse_root};
pub use serialize::{serialize, serialize_children};
pub use tree::{Document, ElementData, NodeId, NodeKind, KEY_ATTR};
