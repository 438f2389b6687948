#![forbid(unsafe_code)]

//! The backend contract.
//!
//! A [`RenderStrategy`] owns a concrete node representation and the
//! primitive mutations the engine needs. Every required operation is a trait
//! method without a default, so a backend missing one fails to compile.
//!
//! # Invariants
//!
//! 1. [`insert_before`](RenderStrategy::insert_before) and
//!    [`append_child`](RenderStrategy::append_child) *move* a node that is
//!    already attached somewhere.
//! 2. [`remove_child`](RenderStrategy::remove_child) on a detached node is a
//!    no-op.
//! 3. [`try_reuse_node`](RenderStrategy::try_reuse_node) either applies the
//!    whole patch and returns `true`, or changes nothing and returns `false`.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::value::Value;

/// An in-place update the engine proposes to a backend.
#[derive(Debug, Clone, Copy)]
pub enum NodePatch<'a> {
    /// Replace the content of a text node.
    Text { old: &'a str, new: &'a str },
    /// Update the props of an element with an unchanged tag.
    Element {
        tag: &'a str,
        removed: &'a [Rc<str>],
        changed: &'a [(Rc<str>, Value)],
    },
}

impl NodePatch<'_> {
    /// Whether applying the patch would change nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Text { old, new } => old == new,
            Self::Element {
                removed, changed, ..
            } => removed.is_empty() && changed.is_empty(),
        }
    }
}

/// Backend adapter: node creation and tree mutation primitives.
pub trait RenderStrategy {
    /// Backend node handle. Cloning must yield a handle to the same node and
    /// equality must be node identity.
    type Node: Clone + Eq + Hash + fmt::Debug + 'static;

    fn create_text(&mut self, value: &str) -> Self::Node;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// Detach `node` from its parent.
    fn remove_child(&mut self, node: &Self::Node);

    /// Put `new` where `old` is, detaching `old`.
    fn replace_node(&mut self, old: &Self::Node, new: &Self::Node);

    /// Insert `node` under `parent` before `reference`, or at the end.
    fn insert_before(&mut self, parent: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>);

    fn set_property(&mut self, node: &Self::Node, key: &str, value: &Value);

    /// Apply `patch` to `node` in place. The default declines, which makes
    /// the engine build a replacement node instead.
    fn try_reuse_node(&mut self, node: &Self::Node, patch: &NodePatch<'_>) -> bool {
        let _ = (node, patch);
        false
    }

    /// Current parent of `node`. Only consulted for the nodes of a dynamic
    /// root rendered with [`Engine::render`](crate::Engine::render); a backend
    /// answering `None` leaves such nodes where they are.
    fn parent_of(&self, node: &Self::Node) -> Option<Self::Node> {
        let _ = node;
        None
    }

    /// Sibling directly after `node` under its parent.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        let _ = node;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_detection() {
        assert!(NodePatch::Text { old: "a", new: "a" }.is_noop());
        assert!(!NodePatch::Text { old: "a", new: "b" }.is_noop());
        let changed: [(Rc<str>, Value); 1] = [(Rc::from("x"), Value::from(1))];
        let patch = NodePatch::Element {
            tag: "div",
            removed: &[],
            changed: &changed,
        };
        assert!(!patch.is_noop());
    }
}
