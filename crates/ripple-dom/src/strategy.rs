#![forbid(unsafe_code)]

//! [`RenderStrategy`] over the in-memory document.
//!
//! # Property mapping
//!
//! | Prop value                   | Effect                          |
//! |------------------------------|---------------------------------|
//! | callback, name `on<event>`   | listener for `<event>`          |
//! | `Null` / `false`             | attribute removed               |
//! | `true`                       | attribute present, empty value  |
//! | string / number              | attribute set to its text       |
//! | element, misnamed callback   | ignored with a warning          |
//!
//! Reuse is supported: text patches overwrite content only when it differs
//! and element patches touch only the listed props, so focus-like node
//! identity survives updates.

use std::fmt;

use ripple_render::{NodePatch, RenderStrategy, Value};

use crate::node::{Document, DomNode};

/// Counts of backend mutations, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub created: usize,
    pub inserted: usize,
    pub removed: usize,
    pub replaced: usize,
    pub text_writes: usize,
    pub prop_writes: usize,
}

impl MutationStats {
    /// Mutations that change the tree after nodes exist.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.removed + self.replaced + self.text_writes + self.prop_writes
    }
}

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomMutation {
    Create(DomNode),
    Insert { parent: DomNode, node: DomNode },
    Remove(DomNode),
    Replace { old: DomNode, new: DomNode },
    Text { node: DomNode, content: String },
    Prop { node: DomNode, key: String },
}

pub struct DomStrategy {
    document: Document,
    stats: MutationStats,
    log: Option<Vec<DomMutation>>,
}

impl DomStrategy {
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            document,
            stats: MutationStats::default(),
            log: None,
        }
    }

    /// Also keep a log of every mutation.
    #[must_use]
    pub fn recording(mut self) -> Self {
        self.log = Some(Vec::new());
        self
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn stats(&self) -> MutationStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = MutationStats::default();
    }

    /// Drain the mutation log. Empty unless built with [`recording`](Self::recording).
    pub fn take_log(&mut self) -> Vec<DomMutation> {
        self.log.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn record(&mut self, mutation: impl FnOnce() -> DomMutation) {
        if let Some(log) = &mut self.log {
            log.push(mutation());
        }
    }

    fn apply_prop(&mut self, node: &DomNode, key: &str, value: &Value) {
        self.stats.prop_writes += 1;
        self.record(|| DomMutation::Prop {
            node: node.clone(),
            key: key.to_owned(),
        });
        if let Some(event) = key.strip_prefix("on") {
            match value {
                Value::Callback(cb) => {
                    node.set_listener(event, cb.clone());
                    return;
                }
                Value::Null => {
                    node.remove_listener(event);
                    return;
                }
                _ => {}
            }
        }
        match value {
            Value::Null | Value::Bool(false) => node.remove_attr(key),
            Value::Bool(true) => node.set_attr(key, ""),
            Value::Callback(_) | Value::Element(_) => {
                tracing::warn!(
                    prop = key,
                    kind = value.kind_name(),
                    "value cannot be set as an attribute"
                );
            }
            other => {
                if let Some(text) = other.as_text() {
                    node.set_attr(key, &text);
                }
            }
        }
    }
}

impl fmt::Debug for DomStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomStrategy")
            .field("stats", &self.stats)
            .field("recording", &self.log.is_some())
            .finish()
    }
}

impl RenderStrategy for DomStrategy {
    type Node = DomNode;

    fn create_text(&mut self, value: &str) -> DomNode {
        let node = self.document.create_text(value);
        self.stats.created += 1;
        self.record(|| DomMutation::Create(node.clone()));
        node
    }

    fn create_element(&mut self, tag: &str) -> DomNode {
        let node = self.document.create_element(tag);
        self.stats.created += 1;
        self.record(|| DomMutation::Create(node.clone()));
        node
    }

    fn append_child(&mut self, parent: &DomNode, child: &DomNode) {
        self.insert_before(parent, child, None);
    }

    fn remove_child(&mut self, node: &DomNode) {
        if node.parent().is_none() {
            return;
        }
        self.stats.removed += 1;
        self.record(|| DomMutation::Remove(node.clone()));
        node.detach();
    }

    fn replace_node(&mut self, old: &DomNode, new: &DomNode) {
        self.stats.replaced += 1;
        self.record(|| DomMutation::Replace {
            old: old.clone(),
            new: new.clone(),
        });
        old.replace_with(new);
    }

    fn insert_before(&mut self, parent: &DomNode, node: &DomNode, reference: Option<&DomNode>) {
        self.stats.inserted += 1;
        self.record(|| DomMutation::Insert {
            parent: parent.clone(),
            node: node.clone(),
        });
        parent.insert_before(node, reference);
    }

    fn set_property(&mut self, node: &DomNode, key: &str, value: &Value) {
        self.apply_prop(node, key, value);
    }

    fn parent_of(&self, node: &DomNode) -> Option<DomNode> {
        node.parent()
    }

    fn next_sibling(&self, node: &DomNode) -> Option<DomNode> {
        node.next_sibling()
    }

    fn try_reuse_node(&mut self, node: &DomNode, patch: &NodePatch<'_>) -> bool {
        match *patch {
            NodePatch::Text { old, new } => {
                if !node.is_text() {
                    return false;
                }
                if old != new {
                    self.stats.text_writes += 1;
                    self.record(|| DomMutation::Text {
                        node: node.clone(),
                        content: new.to_owned(),
                    });
                    node.set_text(new);
                }
                true
            }
            NodePatch::Element {
                tag,
                removed,
                changed,
            } => {
                if node.tag().as_deref() != Some(tag) {
                    return false;
                }
                for key in removed {
                    self.apply_prop(node, key, &Value::Null);
                }
                for (key, value) in changed {
                    self.apply_prop(node, key, value);
                }
                true
            }
        }
    }
}
