#![forbid(unsafe_code)]

//! [`RenderStrategy`] over a retained terminal node tree.
//!
//! Terminal cells have no identity worth preserving, so this backend never
//! reuses a node: every text or prop change the engine cannot apply through a
//! signal prop arrives as a fresh node plus [`RenderStrategy::replace_node`].
//! The tree is painted into a [`CellBuffer`] on demand.
//!
//! # Invariants
//!
//! 1. A removed or replaced node is freed together with its subtree; the
//!    engine never reinserts a node it has removed.
//! 2. The screen root is never freed.

use ahash::AHashMap;
use indexmap::IndexMap;
use ripple_render::{RenderStrategy, Value};

use crate::cell::CellBuffer;
use crate::paint::Painter;

/// Handle to a terminal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TtyNode(u32);

impl TtyNode {
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TtyKind {
    Text(String),
    Element {
        tag: String,
        props: IndexMap<String, Value>,
    },
}

#[derive(Debug)]
pub(crate) struct TtyNodeData {
    pub(crate) kind: TtyKind,
    pub(crate) parent: Option<TtyNode>,
    pub(crate) children: Vec<TtyNode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtyStats {
    pub created: usize,
    pub replaced: usize,
    pub removed: usize,
    pub prop_writes: usize,
}

#[derive(Debug)]
pub struct TtyStrategy {
    nodes: AHashMap<TtyNode, TtyNodeData>,
    next_id: u32,
    screen: TtyNode,
    stats: TtyStats,
}

impl Default for TtyStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TtyStrategy {
    #[must_use]
    pub fn new() -> Self {
        let screen = TtyNode(0);
        let mut nodes = AHashMap::new();
        nodes.insert(
            screen,
            TtyNodeData {
                kind: TtyKind::Element {
                    tag: "screen".to_owned(),
                    props: IndexMap::new(),
                },
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            next_id: 1,
            screen,
            stats: TtyStats::default(),
        }
    }

    /// The container to mount into.
    #[must_use]
    pub fn screen(&self) -> TtyNode {
        self.screen
    }

    #[must_use]
    pub fn stats(&self) -> TtyStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = TtyStats::default();
    }

    /// Live nodes, the screen included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn children(&self, node: TtyNode) -> Vec<TtyNode> {
        self.nodes
            .get(&node)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn text(&self, node: TtyNode) -> Option<&str> {
        match &self.nodes.get(&node)?.kind {
            TtyKind::Text(t) => Some(t),
            TtyKind::Element { .. } => None,
        }
    }

    #[must_use]
    pub fn prop(&self, node: TtyNode, key: &str) -> Option<&Value> {
        match &self.nodes.get(&node)?.kind {
            TtyKind::Element { props, .. } => props.get(key),
            TtyKind::Text(_) => None,
        }
    }

    pub(crate) fn data(&self, node: TtyNode) -> Option<&TtyNodeData> {
        self.nodes.get(&node)
    }

    /// Paint the screen into a buffer `width` columns wide.
    #[must_use]
    pub fn paint(&self, width: usize) -> CellBuffer {
        self.paint_node(self.screen, width)
    }

    #[must_use]
    pub fn paint_node(&self, node: TtyNode, width: usize) -> CellBuffer {
        let span = tracing::trace_span!("ripple.tty.paint", width);
        let _enter = span.enter();
        let mut painter = Painter::new(self, width);
        painter.node(node);
        painter.finish()
    }

    /// Painted screen as trimmed lines.
    #[must_use]
    pub fn lines(&self, width: usize) -> Vec<String> {
        self.paint(width).lines()
    }

    fn alloc(&mut self, kind: TtyKind) -> TtyNode {
        let id = TtyNode(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            TtyNodeData {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        self.stats.created += 1;
        id
    }

    fn detach(&mut self, node: TtyNode) {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|d| d.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
        }
    }

    fn free(&mut self, node: TtyNode) {
        if node == self.screen {
            tracing::warn!("refusing to free the screen node");
            return;
        }
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            if let Some(data) = self.nodes.remove(&next) {
                stack.extend(data.children);
            }
        }
    }
}

impl RenderStrategy for TtyStrategy {
    type Node = TtyNode;

    fn create_text(&mut self, value: &str) -> TtyNode {
        self.alloc(TtyKind::Text(value.to_owned()))
    }

    fn create_element(&mut self, tag: &str) -> TtyNode {
        self.alloc(TtyKind::Element {
            tag: tag.to_owned(),
            props: IndexMap::new(),
        })
    }

    fn append_child(&mut self, parent: &TtyNode, child: &TtyNode) {
        self.insert_before(parent, child, None);
    }

    fn remove_child(&mut self, node: &TtyNode) {
        self.stats.removed += 1;
        self.detach(*node);
        self.free(*node);
    }

    fn replace_node(&mut self, old: &TtyNode, new: &TtyNode) {
        self.stats.replaced += 1;
        self.detach(*new);
        let parent = self.nodes.get(old).and_then(|d| d.parent);
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(&parent)
                && let Some(slot) = p.children.iter_mut().find(|c| **c == *old)
            {
                *slot = *new;
            }
            if let Some(n) = self.nodes.get_mut(new) {
                n.parent = Some(parent);
            }
            if let Some(o) = self.nodes.get_mut(old) {
                o.parent = None;
            }
        }
        self.free(*old);
    }

    fn insert_before(&mut self, parent: &TtyNode, node: &TtyNode, reference: Option<&TtyNode>) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(node) {
            tracing::warn!(?parent, ?node, "insert into or of a freed node");
            return;
        }
        self.detach(*node);
        if let Some(p) = self.nodes.get_mut(parent) {
            let index = reference
                .and_then(|r| p.children.iter().position(|c| c == r))
                .unwrap_or(p.children.len());
            p.children.insert(index, *node);
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = Some(*parent);
        }
    }

    fn set_property(&mut self, node: &TtyNode, key: &str, value: &Value) {
        self.stats.prop_writes += 1;
        let Some(TtyNodeData {
            kind: TtyKind::Element { props, .. },
            ..
        }) = self.nodes.get_mut(node)
        else {
            return;
        };
        if matches!(value, Value::Null) {
            props.shift_remove(key);
        } else {
            props.insert(key.to_owned(), value.clone());
        }
    }

    fn parent_of(&self, node: &TtyNode) -> Option<TtyNode> {
        self.nodes.get(node)?.parent
    }

    fn next_sibling(&self, node: &TtyNode) -> Option<TtyNode> {
        let siblings = &self.nodes.get(&self.parent_of(node)?)?.children;
        let pos = siblings.iter().position(|c| c == node)?;
        siblings.get(pos + 1).copied()
    }
}
