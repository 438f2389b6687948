#![forbid(unsafe_code)]

//! Mutation-recording wrapper around any [`RenderStrategy`].
//!
//! [`Spy`] forwards every call to the wrapped backend and records it as a
//! [`Mutation`], so tests can assert on exactly which backend operations an
//! update performed. The log serializes to JSONL for postmortem diffs.

use std::fmt;

use ripple_render::{NodePatch, RenderStrategy, Value};

/// One backend call, as the engine issued it.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<N> {
    CreateText { node: N, text: String },
    CreateElement { node: N, tag: String },
    Append { parent: N, child: N },
    Insert { parent: N, node: N, before: Option<N> },
    Remove { node: N },
    Replace { old: N, new: N },
    SetProperty { node: N, key: String, value: Value },
    /// A reuse offer and whether the backend accepted it.
    Reuse { node: N, accepted: bool },
}

impl<N> Mutation<N> {
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::CreateText { .. } => "create_text",
            Self::CreateElement { .. } => "create_element",
            Self::Append { .. } => "append",
            Self::Insert { .. } => "insert",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::SetProperty { .. } => "set_property",
            Self::Reuse { .. } => "reuse",
        }
    }

    /// Whether this call created, moved, or dropped a node.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::SetProperty { .. } | Self::Reuse { .. })
    }
}

pub struct Spy<S: RenderStrategy> {
    inner: S,
    log: Vec<Mutation<S::Node>>,
}

impl<S: RenderStrategy> Spy<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            log: Vec::new(),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    #[must_use]
    pub fn log(&self) -> &[Mutation<S::Node>] {
        &self.log
    }

    pub fn take(&mut self) -> Vec<Mutation<S::Node>> {
        std::mem::take(&mut self.log)
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// Calls that created, moved, or dropped a node.
    #[must_use]
    pub fn structural_count(&self) -> usize {
        self.log.iter().filter(|m| m.is_structural()).count()
    }

    #[must_use]
    pub fn count(&self, op: &str) -> usize {
        self.log.iter().filter(|m| m.op() == op).count()
    }

    /// Serialize the log as JSONL (one JSON object per line).
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        let node = |n: &S::Node| format!("{n:?}");
        let mut out = String::new();
        for (seq, m) in self.log.iter().enumerate() {
            let line = match m {
                Mutation::CreateText { node: n, text } => {
                    serde_json::json!({"seq": seq, "op": m.op(), "node": node(n), "text": text})
                }
                Mutation::CreateElement { node: n, tag } => {
                    serde_json::json!({"seq": seq, "op": m.op(), "node": node(n), "tag": tag})
                }
                Mutation::Append { parent, child } => serde_json::json!({
                    "seq": seq, "op": m.op(), "parent": node(parent), "node": node(child)
                }),
                Mutation::Insert {
                    parent,
                    node: n,
                    before,
                } => serde_json::json!({
                    "seq": seq,
                    "op": m.op(),
                    "parent": node(parent),
                    "node": node(n),
                    "before": before.as_ref().map(node),
                }),
                Mutation::Remove { node: n } => {
                    serde_json::json!({"seq": seq, "op": m.op(), "node": node(n)})
                }
                Mutation::Replace { old, new } => serde_json::json!({
                    "seq": seq, "op": m.op(), "old": node(old), "new": node(new)
                }),
                Mutation::SetProperty {
                    node: n,
                    key,
                    value,
                } => serde_json::json!({
                    "seq": seq,
                    "op": m.op(),
                    "node": node(n),
                    "key": key,
                    "kind": value.kind_name(),
                    "value": value.as_text(),
                }),
                Mutation::Reuse { node: n, accepted } => serde_json::json!({
                    "seq": seq, "op": m.op(), "node": node(n), "accepted": accepted
                }),
            };
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&line.to_string());
        }
        out
    }
}

impl<S: RenderStrategy + fmt::Debug> fmt::Debug for Spy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spy")
            .field("inner", &self.inner)
            .field("recorded", &self.log.len())
            .finish()
    }
}

impl<S: RenderStrategy> RenderStrategy for Spy<S> {
    type Node = S::Node;

    fn create_text(&mut self, value: &str) -> Self::Node {
        let node = self.inner.create_text(value);
        self.log.push(Mutation::CreateText {
            node: node.clone(),
            text: value.to_owned(),
        });
        node
    }

    fn create_element(&mut self, tag: &str) -> Self::Node {
        let node = self.inner.create_element(tag);
        self.log.push(Mutation::CreateElement {
            node: node.clone(),
            tag: tag.to_owned(),
        });
        node
    }

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) {
        self.log.push(Mutation::Append {
            parent: parent.clone(),
            child: child.clone(),
        });
        self.inner.append_child(parent, child);
    }

    fn remove_child(&mut self, node: &Self::Node) {
        self.log.push(Mutation::Remove { node: node.clone() });
        self.inner.remove_child(node);
    }

    fn replace_node(&mut self, old: &Self::Node, new: &Self::Node) {
        self.log.push(Mutation::Replace {
            old: old.clone(),
            new: new.clone(),
        });
        self.inner.replace_node(old, new);
    }

    fn insert_before(&mut self, parent: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>) {
        self.log.push(Mutation::Insert {
            parent: parent.clone(),
            node: node.clone(),
            before: reference.cloned(),
        });
        self.inner.insert_before(parent, node, reference);
    }

    fn set_property(&mut self, node: &Self::Node, key: &str, value: &Value) {
        self.log.push(Mutation::SetProperty {
            node: node.clone(),
            key: key.to_owned(),
            value: value.clone(),
        });
        self.inner.set_property(node, key, value);
    }

    fn try_reuse_node(&mut self, node: &Self::Node, patch: &NodePatch<'_>) -> bool {
        let accepted = self.inner.try_reuse_node(node, patch);
        self.log.push(Mutation::Reuse {
            node: node.clone(),
            accepted,
        });
        accepted
    }

    fn parent_of(&self, node: &Self::Node) -> Option<Self::Node> {
        self.inner.parent_of(node)
    }

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        self.inner.next_sibling(node)
    }
}
