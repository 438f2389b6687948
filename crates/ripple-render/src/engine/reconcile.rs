#![forbid(unsafe_code)]

//! Re-rendering: in-place patches, keyed child matching, backend placement,
//! and disposal.
//!
//! # Reuse rules
//!
//! When a dynamic marker's value changes, the new element is compared with
//! the rendered child it replaces:
//!
//! 1. Text and text: the backend is offered a text patch.
//! 2. Elements with the same tag: the backend is offered a prop patch; if it
//!    accepts, the children are reconciled against the new ones.
//! 3. Fragments, providers, components (same function), and dynamic markers
//!    (same signal) keep their rendered node and reconcile what is below.
//!    An identical element is skipped only when the context it sees is the
//!    same; otherwise its components and dynamic values are rendered again.
//! 4. Anything else is rebuilt, swapped in, and the old subtree disposed.
//!
//! A backend that declines every patch gets rule 4 for every host node.
//!
//! # Child matching
//!
//! A single left-to-right pass. Keyed new children claim the old child with
//! the same key wherever it was; unkeyed new children claim the remaining
//! unkeyed old children in order. Keyed never matches unkeyed. Old children
//! left unclaimed are disposed. Backend nodes are then moved into order by
//! [`sync_host`](EngineInner::sync_host).

use std::collections::VecDeque;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use ripple_core::ReadSignal;

use super::arena::RenderId;
use super::{EngineInner, EngineState};
use crate::component::{Component, Output};
use crate::context::ContextOverlay;
use crate::cx::Cx;
use crate::element::{Element, ElementKind, Key, Prop, Props};
use crate::strategy::{NodePatch, RenderStrategy};
use crate::value::Value;

type PropDiff = (Vec<Rc<str>>, Vec<(Rc<str>, Value)>);

/// Props removed from `old` and props added or changed in `new`, skipping
/// reserved names.
pub(crate) fn diff_props(old: &Props, new: &Props) -> PropDiff {
    let removed = old
        .forwarded()
        .filter(|(k, _)| !new.contains(k))
        .map(|(k, _)| Rc::clone(k))
        .collect();
    let changed = new
        .forwarded()
        .filter_map(|(k, p)| match (old.get(k), p) {
            (Some(Prop::Static(a)), Prop::Static(b)) if a == b => None,
            (Some(Prop::Signal(a)), Prop::Signal(b)) if a == b => None,
            _ => Some((Rc::clone(k), p.current())),
        })
        .collect();
    (removed, changed)
}

impl<S: RenderStrategy + 'static> EngineInner<S> {
    /// Apply a new value from the signal behind dynamic marker `id`.
    pub(crate) fn update_dynamic(&self, st: &mut EngineState<S>, id: RenderId, value: &Value) {
        let Some(rn) = st.arena.get(id) else {
            tracing::trace!(render_id = %id, "dropping update for disposed node");
            return;
        };
        let overlay = rn.overlay.clone();
        let old = rn.children.first().copied();
        let next = self.coerce(value);
        let host = st.arena.host_of(id);
        let before = if host.is_none() {
            st.arena.flatten(id)
        } else {
            Vec::new()
        };

        let span = tracing::debug_span!("ripple.patch", render_id = %id, reused = tracing::field::Empty);
        let _enter = span.enter();

        if let Some(old) = old
            && self.patch(st, old, &next, &overlay)
        {
            span.record("reused", true);
        } else {
            span.record("reused", false);
            let fresh = self.build(st, &next, &overlay, Some(id));
            st.arena.set_children(id, vec![fresh]);
            if let Some(old) = old {
                if let Some(h) = host {
                    self.swap_in(st, h, old, fresh);
                }
                self.dispose(st, old);
            }
        }

        match host {
            Some(h) => self.sync_host(st, h),
            None => self.sync_detached(st, id, &before),
        }
    }

    /// Swap a lone replaced node for a lone new one in a single backend call.
    /// Other shapes are left to `sync_host`.
    fn swap_in(&self, st: &mut EngineState<S>, host: RenderId, old: RenderId, fresh: RenderId) {
        let old_nodes = st.arena.flatten(old);
        let new_nodes = st.arena.flatten(fresh);
        let ([old_node], [new_node]) = (old_nodes.as_slice(), new_nodes.as_slice()) else {
            return;
        };
        let Some(host_rn) = st.arena.get_mut(host) else {
            return;
        };
        if let Some(slot) = host_rn.attached.iter_mut().find(|n| **n == *old_node) {
            st.strategy.replace_node(old_node, new_node);
            *slot = new_node.clone();
        }
    }

    /// Keep the nodes of a dynamic marker with no host where the caller of
    /// [`Engine::render`](super::Engine::render) placed them.
    ///
    /// The position is the parent of the previous nodes and the sibling
    /// after the last of them. When the marker previously rendered nothing,
    /// the last recorded position is used. Nodes that were never placed stay
    /// detached.
    fn sync_detached(&self, st: &mut EngineState<S>, id: RenderId, before: &[S::Node]) {
        let after = st.arena.flatten(id);
        if before == after.as_slice() {
            return;
        }
        let observed = before.first().and_then(|first| {
            let parent = st.strategy.parent_of(first)?;
            let anchor = before.last().and_then(|last| st.strategy.next_sibling(last));
            Some((parent, anchor))
        });
        let recorded = || {
            let (parent, anchor) = st.arena.get(id)?.placement.clone()?;
            let anchor = anchor.filter(|a| st.strategy.parent_of(a).as_ref() == Some(&parent));
            Some((parent, anchor))
        };
        let Some((parent, anchor)) = observed.or_else(recorded) else {
            tracing::trace!(render_id = %id, "hostless nodes were never placed");
            return;
        };

        if let ([old_node], [new_node]) = (before, after.as_slice()) {
            st.strategy.replace_node(old_node, new_node);
        } else {
            for node in before.iter().filter(|n| !after.contains(n)) {
                st.strategy.remove_child(node);
            }
            for node in &after {
                st.strategy.insert_before(&parent, node, anchor.as_ref());
            }
        }
        if let Some(rn) = st.arena.get_mut(id) {
            rn.placement = Some((parent, anchor));
        }
    }

    /// Try to bring rendered node `id` in line with `next` without rebuilding
    /// it. Returns `false`, having changed nothing, when it cannot.
    ///
    /// On success the caller must `sync_host` the nearest host of `id`.
    pub(crate) fn patch(
        &self,
        st: &mut EngineState<S>,
        id: RenderId,
        next: &Element,
        overlay: &ContextOverlay,
    ) -> bool {
        if !self.config.allow_reuse {
            return false;
        }
        let Some(rn) = st.arena.get(id) else {
            return false;
        };
        let prev = rn.element.clone();
        let node = rn.node.clone();
        let scoped = match next.kind() {
            ElementKind::Provider(entries) => overlay.extend(entries),
            _ => overlay.clone(),
        };
        // Shared element trees can sit under a provider whose values moved.
        let overlay_unchanged = rn.overlay.same_entries(&scoped);
        let unchanged = prev.ptr_eq(next);
        if unchanged && (overlay_unchanged || matches!(next.kind(), ElementKind::Text(_))) {
            return true;
        }
        if !prev.kind().same_variant(next.kind()) {
            return false;
        }

        match (prev.kind(), next.kind()) {
            (ElementKind::Text(old), ElementKind::Text(new)) => {
                let Some(node) = node else {
                    return false;
                };
                if !st
                    .strategy
                    .try_reuse_node(&node, &NodePatch::Text { old: &**old, new: &**new })
                {
                    return false;
                }
            }
            (ElementKind::Tag(old_tag), ElementKind::Tag(new_tag)) => {
                if old_tag != new_tag {
                    return false;
                }
                let Some(node) = node else {
                    return false;
                };
                if !unchanged {
                    let (removed, changed) = diff_props(prev.props(), next.props());
                    let accepted = st.strategy.try_reuse_node(
                        &node,
                        &NodePatch::Element {
                            tag: &**new_tag,
                            removed: &removed,
                            changed: &changed,
                        },
                    );
                    if !accepted {
                        return false;
                    }
                    self.rebind_props(st, id, &removed, &changed, next.props());
                }
                let children = self.reconcile_children(st, id, next.children(), overlay);
                st.arena.set_children(id, children);
                self.sync_host(st, id);
            }
            (ElementKind::Fragment, ElementKind::Fragment) => {
                let children = self.reconcile_children(st, id, next.children(), overlay);
                st.arena.set_children(id, children);
            }
            (ElementKind::Provider(_), ElementKind::Provider(_)) => {
                let children = self.reconcile_children(st, id, next.children(), &scoped);
                st.arena.set_children(id, children);
            }
            (ElementKind::Dynamic(a), ElementKind::Dynamic(b)) => {
                if a != b {
                    return false;
                }
                if !overlay_unchanged {
                    self.refresh_dynamic(st, id, b, &scoped);
                }
            }
            (ElementKind::Component(a), ElementKind::Component(b)) => {
                if !a.ptr_eq(b) {
                    return false;
                }
                self.rerun_component(st, id, b, next, overlay);
            }
            _ => return false,
        }

        if let Some(rn) = st.arena.get_mut(id) {
            rn.element = next.clone();
            rn.overlay = scoped;
        }
        true
    }

    /// Re-render the current value of a dynamic marker under a new overlay.
    /// The enclosing host is synced by the caller.
    fn refresh_dynamic(
        &self,
        st: &mut EngineState<S>,
        id: RenderId,
        source: &ReadSignal<Value>,
        overlay: &ContextOverlay,
    ) {
        let next = self.coerce(&source.peek());
        let old = st.arena.children(id).first().copied();
        if let Some(old) = old
            && self.patch(st, old, &next, overlay)
        {
            return;
        }
        let fresh = self.build(st, &next, overlay, Some(id));
        st.arena.set_children(id, vec![fresh]);
        if let Some(old) = old {
            self.dispose(st, old);
        }
    }

    /// Drop bindings for removed or changed props; bind changed signal props.
    fn rebind_props(
        &self,
        st: &mut EngineState<S>,
        id: RenderId,
        removed: &[Rc<str>],
        changed: &[(Rc<str>, Value)],
        props: &Props,
    ) {
        if let Some(rn) = st.arena.get_mut(id) {
            rn.prop_bindings
                .retain(|(k, _)| !removed.contains(k) && !changed.iter().any(|(c, _)| c == k));
        }
        for (key, _) in changed {
            if let Some(Prop::Signal(source)) = props.get(key) {
                self.bind_signal_prop(st, id, key, source);
            }
        }
    }

    /// Invoke a component again with new props, patching its output into
    /// the existing child where possible.
    fn rerun_component(
        &self,
        st: &mut EngineState<S>,
        id: RenderId,
        component: &Component,
        next: &Element,
        overlay: &ContextOverlay,
    ) {
        let span = tracing::debug_span!("ripple.component", component = component.name(), render_id = %id);
        let _enter = span.enter();
        let cx = Cx::new(component.name(), overlay.clone(), next.children().to_vec());
        let result = component.invoke(next.props(), &cx);
        let old = st.arena.children(id).first().copied();

        let fresh = match result {
            Ok(Output::Element(out)) => {
                if let Some(old) = old
                    && self.patch(st, old, &out, overlay)
                {
                    return;
                }
                self.build(st, &out, overlay, Some(id))
            }
            other => self.build_output(st, id, component.name(), other, overlay),
        };
        st.arena.set_children(id, vec![fresh]);
        if let Some(old) = old {
            self.dispose(st, old);
        }
    }

    /// Match `next` against the current children of `parent`, reusing what
    /// can be reused. Returns the new child list; unclaimed old children are
    /// already disposed.
    pub(crate) fn reconcile_children(
        &self,
        st: &mut EngineState<S>,
        parent: RenderId,
        next: &[Element],
        overlay: &ContextOverlay,
    ) -> Vec<RenderId> {
        let previous = st.arena.children(parent);
        let mut keyed: AHashMap<Key, RenderId> = AHashMap::with_capacity(previous.len());
        let mut unkeyed: VecDeque<RenderId> = VecDeque::new();
        let mut unclaimed: Vec<RenderId> = Vec::new();

        for old in previous {
            match st.arena.key_of(old) {
                Some(key) => {
                    if let Some(shadowed) = keyed.insert(key, old) {
                        tracing::warn!(render_id = %shadowed, "duplicate key among siblings");
                        unclaimed.push(shadowed);
                    }
                }
                None => unkeyed.push_back(old),
            }
        }

        let mut result = Vec::with_capacity(next.len());
        let mut reused = 0usize;
        for child in next {
            let candidate = match child.key() {
                Some(key) => keyed.remove(key),
                None => unkeyed.pop_front(),
            };
            let id = match candidate {
                Some(old) if self.patch(st, old, child, overlay) => {
                    reused += 1;
                    old
                }
                Some(old) => {
                    unclaimed.push(old);
                    self.build(st, child, overlay, Some(parent))
                }
                None => self.build(st, child, overlay, Some(parent)),
            };
            result.push(id);
        }

        unclaimed.extend(keyed.into_values());
        unclaimed.extend(unkeyed);
        tracing::debug!(
            render_id = %parent,
            children = result.len(),
            reused,
            disposed = unclaimed.len(),
            "reconciled children"
        );
        for old in unclaimed {
            self.dispose(st, old);
        }
        result
    }

    /// Make the backend children of host `id` match its rendered children.
    ///
    /// Removes nodes no longer wanted, then walks the wanted list left to
    /// right, moving or inserting each node that is not already in place.
    pub(crate) fn sync_host(&self, st: &mut EngineState<S>, id: RenderId) {
        let desired = st.arena.flatten_children(id);
        let Some(rn) = st.arena.get_mut(id) else {
            self.violation("sync_host on a missing node");
            return;
        };
        let Some(host) = rn.node.clone() else {
            self.violation("sync_host on a node without a backend node");
            return;
        };
        let mut current = std::mem::take(&mut rn.attached);

        let wanted: AHashSet<&S::Node> = desired.iter().collect();
        current.retain(|n| {
            if wanted.contains(n) {
                true
            } else {
                st.strategy.remove_child(n);
                false
            }
        });

        for (index, node) in desired.iter().enumerate() {
            if current.get(index) == Some(node) {
                continue;
            }
            if let Some(pos) = current.iter().position(|n| n == node) {
                current.remove(pos);
            }
            match current.get(index) {
                Some(reference) => st.strategy.insert_before(&host, node, Some(reference)),
                None => st.strategy.append_child(&host, node),
            }
            current.insert(index, node.clone());
        }

        if let Some(rn) = st.arena.get_mut(id) {
            rn.attached = current;
        }
    }

    /// Remove the subtree rooted at `id` from the arena, disposing every
    /// subscription it owns. Backend nodes are left to the caller.
    pub(crate) fn dispose(&self, st: &mut EngineState<S>, id: RenderId) {
        let mut stack = vec![id];
        let mut removed = 0usize;
        while let Some(next) = stack.pop() {
            let Some(rn) = st.arena.remove(next) else {
                continue;
            };
            removed += 1;
            stack.extend(rn.children.iter().copied());
            for sub in &rn.subscriptions {
                sub.dispose();
            }
            for (_, sub) in &rn.prop_bindings {
                sub.dispose();
            }
        }
        tracing::trace!(render_id = %id, removed, "disposed subtree");
    }

    pub(crate) fn unmount(&self, st: &mut EngineState<S>, id: RenderId) {
        let Some(rn) = st.arena.get(id) else {
            return;
        };
        let span = tracing::debug_span!("ripple.unmount", render_id = %id);
        let _enter = span.enter();

        if rn.root {
            let attached = rn.attached.clone();
            for node in &attached {
                st.strategy.remove_child(node);
            }
        } else {
            let parent = rn.parent;
            let nodes = st.arena.flatten(id);
            let host = st.arena.host_of(id);
            if let Some(p) = parent
                && let Some(prn) = st.arena.get_mut(p)
            {
                prn.children.retain(|c| *c != id);
            }
            if let Some(h) = host
                && let Some(hrn) = st.arena.get_mut(h)
            {
                hrn.attached.retain(|n| !nodes.contains(n));
            }
            for node in &nodes {
                st.strategy.remove_child(node);
            }
        }
        self.dispose(st, id);
        tracing::debug!(live = st.arena.len(), "unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::Signal;

    #[test]
    fn diff_props_reports_removed_and_changed() {
        let old = Props::new().with("a", 1).with("b", 2).with("key", 7);
        let new = Props::new().with("b", 3).with("c", 4).with("key", 8);
        let (removed, changed) = diff_props(&old, &new);
        assert_eq!(removed, vec![Rc::from("a")]);
        let names: Vec<_> = changed.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(changed[0].1, Value::from(3));
    }

    #[test]
    fn diff_props_same_signal_is_unchanged() {
        let s = Signal::new(Value::from("x"));
        let old = Props::new().with("title", Prop::signal(s.clone()));
        let new = Props::new().with("title", Prop::signal(s));
        let (removed, changed) = diff_props(&old, &new);
        assert!(removed.is_empty());
        assert!(changed.is_empty());
    }
}
