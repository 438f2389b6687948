#![forbid(unsafe_code)]

//! First render of a descriptor: node creation, prop binding, component
//! invocation, and suspension of async and streaming components.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use futures::{FutureExt, StreamExt};
use ripple_core::{ReadSignal, Signal, Subscription, panic_message};

use super::arena::{RenderId, RenderedNode};
use super::{EngineInner, EngineState, Job};
use crate::component::{Component, ComponentResult, Output};
use crate::context::ContextOverlay;
use crate::cx::Cx;
use crate::element::{Element, ElementKind, Prop, Props, dynamic};
use crate::error::{ComponentError, RenderError};
use crate::strategy::RenderStrategy;
use crate::value::Value;

impl<S: RenderStrategy + 'static> EngineInner<S> {
    pub(crate) fn build(
        &self,
        st: &mut EngineState<S>,
        element: &Element,
        overlay: &ContextOverlay,
        parent: Option<RenderId>,
    ) -> RenderId {
        let id = st
            .arena
            .insert(RenderedNode::new(element.clone(), parent, overlay.clone()));
        match element.kind() {
            ElementKind::Text(content) => {
                let node = st.strategy.create_text(content);
                tracing::trace!(render_id = %id, "create text");
                st.arena.set_node(id, node);
            }
            ElementKind::Tag(tag) => {
                let node = st.strategy.create_element(tag);
                tracing::trace!(render_id = %id, tag = %tag, "create element");
                st.arena.set_node(id, node.clone());
                self.bind_props(st, id, &node, element.props());
                let children = self.build_children(st, element.children(), overlay, id);
                st.arena.set_children(id, children);
                self.sync_host(st, id);
            }
            ElementKind::Fragment => {
                let children = self.build_children(st, element.children(), overlay, id);
                st.arena.set_children(id, children);
            }
            ElementKind::Provider(entries) => {
                let scoped = overlay.extend(entries);
                if let Some(n) = st.arena.get_mut(id) {
                    n.overlay = scoped.clone();
                }
                let children = self.build_children(st, element.children(), &scoped, id);
                st.arena.set_children(id, children);
            }
            ElementKind::Dynamic(source) => self.build_dynamic(st, id, source, overlay),
            ElementKind::Component(component) => {
                let child = self.invoke_component(st, id, component, element, overlay);
                st.arena.set_children(id, vec![child]);
            }
        }
        id
    }

    pub(crate) fn build_children(
        &self,
        st: &mut EngineState<S>,
        children: &[Element],
        overlay: &ContextOverlay,
        parent: RenderId,
    ) -> Vec<RenderId> {
        children
            .iter()
            .map(|child| self.build(st, child, overlay, Some(parent)))
            .collect()
    }

    fn build_dynamic(
        &self,
        st: &mut EngineState<S>,
        id: RenderId,
        source: &ReadSignal<Value>,
        overlay: &ContextOverlay,
    ) {
        // Subscribe before reading so a write during the child's build is
        // not lost.
        let sub = source.subscribe(self.content_listener(id));
        st.arena.push_subscription(id, sub);
        let current = self.coerce(&source.peek());
        let child = self.build(st, &current, overlay, Some(id));
        st.arena.set_children(id, vec![child]);
    }

    /// Element a dynamic value renders as, or the error fallback.
    pub(crate) fn coerce(&self, value: &Value) -> Element {
        match value.coerce() {
            Ok(el) => el,
            Err(err) => {
                tracing::error!(error = %err, "dynamic marker produced an unrenderable value");
                self.config.fallback(&err)
            }
        }
    }

    fn content_listener(&self, id: RenderId) -> impl Fn(&Value) + 'static {
        let weak = self.weak();
        move |value: &Value| {
            if let Some(engine) = weak.upgrade() {
                engine.enqueue(Job::Content {
                    id,
                    value: value.clone(),
                });
            }
        }
    }

    fn prop_listener(&self, id: RenderId, key: Rc<str>) -> impl Fn(&Value) + 'static {
        let weak = self.weak();
        move |value: &Value| {
            if let Some(engine) = weak.upgrade() {
                engine.enqueue(Job::Prop {
                    id,
                    key: Rc::clone(&key),
                    value: value.clone(),
                });
            }
        }
    }

    pub(crate) fn bind_props(&self, st: &mut EngineState<S>, id: RenderId, node: &S::Node, props: &Props) {
        for (key, prop) in props.forwarded() {
            st.strategy.set_property(node, key, &prop.current());
            if let Prop::Signal(source) = prop {
                self.bind_signal_prop(st, id, key, source);
            }
        }
    }

    /// Keep `key` on the node of `id` in step with `source`.
    pub(crate) fn bind_signal_prop(
        &self,
        st: &mut EngineState<S>,
        id: RenderId,
        key: &Rc<str>,
        source: &ReadSignal<Value>,
    ) {
        let sub = source.subscribe(self.prop_listener(id, Rc::clone(key)));
        match st.arena.get_mut(id) {
            Some(n) => n.prop_bindings.push((Rc::clone(key), sub)),
            None => sub.dispose(),
        }
    }

    pub(crate) fn invoke_component(
        &self,
        st: &mut EngineState<S>,
        id: RenderId,
        component: &Component,
        element: &Element,
        overlay: &ContextOverlay,
    ) -> RenderId {
        let span = tracing::debug_span!("ripple.component", component = component.name(), render_id = %id);
        let _enter = span.enter();
        let cx = Cx::new(component.name(), overlay.clone(), element.children().to_vec());
        let result = component.invoke(element.props(), &cx);
        self.build_output(st, id, component.name(), result, overlay)
    }

    /// Render what a component returned, as the single child of `parent`.
    pub(crate) fn build_output(
        &self,
        st: &mut EngineState<S>,
        parent: RenderId,
        name: &'static str,
        result: ComponentResult,
        overlay: &ContextOverlay,
    ) -> RenderId {
        match result {
            Ok(Output::Element(child)) => self.build(st, &child, overlay, Some(parent)),
            Ok(Output::Signal(source)) => self.build(st, &dynamic(source), overlay, Some(parent)),
            Ok(Output::Future(fut)) => {
                tracing::debug!(component = name, "component suspended on future");
                let slot = Signal::new(Value::Element(self.config.placeholder()));
                let writer = slot.clone();
                let fallback = Rc::clone(&self.config.error_fallback);
                let task = async move {
                    let value = match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(Ok(el)) => Value::Element(el),
                        Ok(Err(source)) => {
                            let err = RenderError::ComponentFailed {
                                component: name,
                                source,
                            };
                            tracing::warn!(error = %err, "async component failed");
                            Value::Element(fallback(&err))
                        }
                        Err(payload) => {
                            let err = RenderError::ComponentFailed {
                                component: name,
                                source: ComponentError::Panicked(panic_message(&*payload)),
                            };
                            tracing::error!(error = %err, "async component panicked");
                            Value::Element(fallback(&err))
                        }
                    };
                    writer.set(value);
                };
                self.build_suspended(st, parent, name, slot, task, overlay)
            }
            Ok(Output::Stream(mut stream)) => {
                tracing::debug!(component = name, "component suspended on stream");
                let slot = Signal::new(Value::Element(self.config.placeholder()));
                let writer = slot.clone();
                let fallback = Rc::clone(&self.config.error_fallback);
                let task = async move {
                    loop {
                        let source = match AssertUnwindSafe(stream.next()).catch_unwind().await {
                            Ok(Some(Ok(el))) => {
                                writer.set(Value::Element(el));
                                continue;
                            }
                            Ok(None) => break,
                            Ok(Some(Err(source))) => source,
                            Err(payload) => ComponentError::Panicked(panic_message(&*payload)),
                        };
                        let err = RenderError::StreamFailed {
                            component: name,
                            source,
                        };
                        tracing::warn!(error = %err, "streaming component failed");
                        writer.set(Value::Element(fallback(&err)));
                        break;
                    }
                };
                self.build_suspended(st, parent, name, slot, task, overlay)
            }
            Err(source) => {
                let err = RenderError::ComponentFailed {
                    component: name,
                    source,
                };
                tracing::warn!(error = %err, "component failed");
                let fallback = self.config.fallback(&err);
                self.build(st, &fallback, overlay, Some(parent))
            }
        }
    }

    /// Render `slot` as a dynamic marker and drive `task` to fill it.
    ///
    /// The marker keeps the overlay captured at invocation, so whatever the
    /// task eventually yields renders under that overlay.
    fn build_suspended(
        &self,
        st: &mut EngineState<S>,
        parent: RenderId,
        name: &'static str,
        slot: Signal<Value>,
        task: impl Future<Output = ()> + 'static,
        overlay: &ContextOverlay,
    ) -> RenderId {
        let child = self.build(st, &dynamic(slot.read_only()), overlay, Some(parent));
        match self.scheduler.spawn_abortable(task) {
            Some(handle) => {
                st.arena
                    .push_subscription(child, Subscription::new(move || handle.abort()));
            }
            None => {
                let err = RenderError::SpawnFailed { component: name };
                slot.set(Value::Element(self.config.fallback(&err)));
            }
        }
        child
    }
}
