#![forbid(unsafe_code)]

//! Arena of rendered nodes, indexed by stable integer ids.
//!
//! Removal is explicit: a rendered node lives until the engine disposes it on
//! replacement or unmount, and dropping it disposes every subscription it
//! owns.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use ripple_core::Subscription;

use crate::context::ContextOverlay;
use crate::element::{Element, ElementKind, Key};

/// Stable identity of a rendered node within one engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderId(u64);

impl RenderId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

pub(crate) struct RenderedNode<N> {
    pub(crate) element: Element,
    /// `None` for fragments, dynamic markers, components, and providers.
    pub(crate) node: Option<N>,
    /// Mount root: `node` is the caller's container, not ours to detach.
    pub(crate) root: bool,
    pub(crate) parent: Option<RenderId>,
    pub(crate) children: Vec<RenderId>,
    pub(crate) overlay: ContextOverlay,
    pub(crate) subscriptions: Vec<Subscription>,
    pub(crate) prop_bindings: Vec<(Rc<str>, Subscription)>,
    /// Backend children currently attached under `node`, in order.
    pub(crate) attached: Vec<N>,
    /// Parent and following sibling last used for a hostless dynamic
    /// marker's nodes.
    pub(crate) placement: Option<(N, Option<N>)>,
}

impl<N> RenderedNode<N> {
    pub(crate) fn new(element: Element, parent: Option<RenderId>, overlay: ContextOverlay) -> Self {
        Self {
            element,
            node: None,
            root: false,
            parent,
            children: Vec::new(),
            overlay,
            subscriptions: Vec::new(),
            prop_bindings: Vec::new(),
            attached: Vec::new(),
            placement: None,
        }
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.len() + self.prop_bindings.len()
    }

    pub(crate) fn is_host(&self) -> bool {
        self.node.is_some()
    }
}

pub(crate) struct Arena<N> {
    nodes: AHashMap<RenderId, RenderedNode<N>>,
    next: u64,
}

impl<N: Clone> Arena<N> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: AHashMap::new(),
            next: 1,
        }
    }

    pub(crate) fn insert(&mut self, node: RenderedNode<N>) -> RenderId {
        let id = RenderId(self.next);
        self.next += 1;
        self.nodes.insert(id, node);
        id
    }

    pub(crate) fn get(&self, id: RenderId) -> Option<&RenderedNode<N>> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RenderId) -> Option<&mut RenderedNode<N>> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: RenderId) -> Option<RenderedNode<N>> {
        self.nodes.remove(&id)
    }

    pub(crate) fn contains(&self, id: RenderId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.nodes.values().map(RenderedNode::subscription_count).sum()
    }

    pub(crate) fn set_node(&mut self, id: RenderId, node: N) {
        if let Some(n) = self.nodes.get_mut(&id) {
            n.node = Some(node);
        }
    }

    pub(crate) fn set_children(&mut self, id: RenderId, children: Vec<RenderId>) {
        if let Some(n) = self.nodes.get_mut(&id) {
            n.children = children;
        }
    }

    pub(crate) fn push_subscription(&mut self, id: RenderId, sub: Subscription) {
        match self.nodes.get_mut(&id) {
            Some(n) => n.subscriptions.push(sub),
            None => sub.dispose(),
        }
    }

    pub(crate) fn children(&self, id: RenderId) -> Vec<RenderId> {
        self.nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub(crate) fn key_of(&self, id: RenderId) -> Option<Key> {
        self.nodes.get(&id).and_then(|n| n.element.key().cloned())
    }

    /// Backend nodes `id` contributes to its host, in order.
    pub(crate) fn flatten(&self, id: RenderId) -> Vec<N> {
        let mut out = Vec::new();
        self.flatten_into(id, &mut out);
        out
    }

    fn flatten_into(&self, id: RenderId, out: &mut Vec<N>) {
        let Some(n) = self.nodes.get(&id) else {
            return;
        };
        match &n.node {
            Some(node) if !n.root => out.push(node.clone()),
            _ => {
                for child in &n.children {
                    self.flatten_into(*child, out);
                }
            }
        }
    }

    /// Backend nodes that belong directly under host `id`.
    pub(crate) fn flatten_children(&self, id: RenderId) -> Vec<N> {
        let mut out = Vec::new();
        if let Some(n) = self.nodes.get(&id) {
            for child in &n.children {
                self.flatten_into(*child, &mut out);
            }
        }
        out
    }

    /// Nearest ancestor owning a backend node.
    pub(crate) fn host_of(&self, id: RenderId) -> Option<RenderId> {
        let mut cursor = self.nodes.get(&id)?.parent;
        while let Some(p) = cursor {
            let n = self.nodes.get(&p)?;
            if n.is_host() {
                return Some(p);
            }
            cursor = n.parent;
        }
        None
    }

    pub(crate) fn info(&self, id: RenderId) -> Option<RenderedInfo> {
        let n = self.nodes.get(&id)?;
        let kind = if n.root {
            RenderedKind::Root
        } else {
            match n.element.kind() {
                ElementKind::Text(_) => RenderedKind::Text,
                ElementKind::Fragment => RenderedKind::Fragment,
                ElementKind::Dynamic(_) => RenderedKind::Dynamic,
                ElementKind::Tag(tag) => RenderedKind::Element(Rc::clone(tag)),
                ElementKind::Component(c) => RenderedKind::Component(c.name()),
                ElementKind::Provider(_) => RenderedKind::Provider,
            }
        };
        Some(RenderedInfo {
            id,
            kind,
            key: n.element.key().cloned(),
            parent: n.parent,
            children: n.children.clone(),
            subscriptions: n.subscription_count(),
            has_backend_node: n.node.is_some(),
        })
    }
}

/// What a rendered node was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedKind {
    Root,
    Text,
    Fragment,
    Dynamic,
    Element(Rc<str>),
    Component(&'static str),
    Provider,
}

/// Snapshot of one rendered node, for inspection and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedInfo {
    pub id: RenderId,
    pub kind: RenderedKind,
    pub key: Option<Key>,
    pub parent: Option<RenderId>,
    pub children: Vec<RenderId>,
    pub subscriptions: usize,
    pub has_backend_node: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{fragment, text};

    fn leaf(arena: &mut Arena<u32>, parent: Option<RenderId>, node: u32) -> RenderId {
        let mut rn = RenderedNode::new(text("x"), parent, ContextOverlay::new());
        rn.node = Some(node);
        arena.insert(rn)
    }

    #[test]
    fn flatten_descends_through_groupings() {
        let mut arena = Arena::<u32>::new();
        let group = arena.insert(RenderedNode::new(
            fragment(Vec::<Element>::new()),
            None,
            ContextOverlay::new(),
        ));
        let a = leaf(&mut arena, Some(group), 1);
        let inner = arena.insert(RenderedNode::new(
            fragment(Vec::<Element>::new()),
            Some(group),
            ContextOverlay::new(),
        ));
        let b = leaf(&mut arena, Some(inner), 2);
        arena.set_children(inner, vec![b]);
        arena.set_children(group, vec![a, inner]);
        assert_eq!(arena.flatten(group), vec![1, 2]);
        assert_eq!(arena.host_of(b), None);
    }

    #[test]
    fn host_of_finds_nearest_backend_ancestor() {
        let mut arena = Arena::<u32>::new();
        let host = leaf(&mut arena, None, 9);
        let group = arena.insert(RenderedNode::new(
            fragment(Vec::<Element>::new()),
            Some(host),
            ContextOverlay::new(),
        ));
        let child = leaf(&mut arena, Some(group), 3);
        arena.set_children(group, vec![child]);
        arena.set_children(host, vec![group]);
        assert_eq!(arena.host_of(child), Some(host));
        assert_eq!(arena.flatten_children(host), vec![3]);
    }

    #[test]
    fn ids_are_monotonic_and_removal_is_explicit() {
        let mut arena = Arena::<u32>::new();
        let a = leaf(&mut arena, None, 1);
        let b = leaf(&mut arena, None, 2);
        assert!(b > a);
        assert_eq!(arena.len(), 2);
        assert!(arena.remove(a).is_some());
        assert!(!arena.contains(a));
        assert!(arena.remove(a).is_none());
    }

    #[test]
    fn push_subscription_to_missing_node_disposes_it() {
        let mut arena = Arena::<u32>::new();
        let a = leaf(&mut arena, None, 1);
        arena.remove(a);
        let disposed = Rc::new(std::cell::Cell::new(false));
        let d = Rc::clone(&disposed);
        arena.push_subscription(a, Subscription::new(move || d.set(true)));
        assert!(disposed.get());
    }
}
