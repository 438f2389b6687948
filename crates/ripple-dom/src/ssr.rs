#![forbid(unsafe_code)]

//! Server-side string renderer.
//!
//! Walks a descriptor tree once and writes HTML. Nothing is subscribed:
//! signals (dynamic markers, signal props, signal outputs) contribute their
//! current value, and async or streaming components contribute the pending
//! placeholder. Island components are wrapped in a `ripple-island` marker and
//! recorded so a client can hydrate them.
//!
//! # Failure Modes
//!
//! - **Component error or panic**: the error fallback is written in its place.
//! - **Signal value with no element form**: the error fallback is written in
//!   place of that marker.

use std::fmt::Write as _;

use ripple_render::{
    Component, ContextOverlay, Cx, Element, ElementKind, EngineConfig, Output, RenderError,
    Value,
};

use crate::node::{escape, is_void_tag};

/// A component rendered inside an island marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandRecord {
    /// Pre-order index, matching the marker's `data-island-id`.
    pub id: usize,
    pub component: &'static str,
    /// Forwarded props with a textual form, in declaration order.
    pub props: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsrOutput {
    pub html: String,
    pub islands: Vec<IslandRecord>,
}

/// Render `element` with the default configuration and no context.
#[must_use]
pub fn render_to_string(element: &Element) -> SsrOutput {
    render_to_string_with(element, &ContextOverlay::new(), &EngineConfig::default())
}

#[must_use]
pub fn render_to_string_with(
    element: &Element,
    overlay: &ContextOverlay,
    config: &EngineConfig,
) -> SsrOutput {
    let span = tracing::debug_span!("ripple.ssr", kind = element.kind().name());
    let _enter = span.enter();
    let mut writer = SsrWriter {
        config,
        out: SsrOutput::default(),
    };
    writer.element(element, overlay);
    tracing::debug!(
        bytes = writer.out.html.len(),
        islands = writer.out.islands.len(),
        "rendered to string"
    );
    writer.out
}

struct SsrWriter<'a> {
    config: &'a EngineConfig,
    out: SsrOutput,
}

impl SsrWriter<'_> {
    fn element(&mut self, element: &Element, overlay: &ContextOverlay) {
        match element.kind() {
            ElementKind::Text(content) => self.out.html.push_str(&escape(content)),
            ElementKind::Fragment => self.children(element, overlay),
            ElementKind::Provider(entries) => {
                let inner = overlay.extend(entries);
                self.children(element, &inner);
            }
            ElementKind::Tag(tag) => self.tag(tag, element, overlay),
            ElementKind::Dynamic(source) => self.value(&source.peek(), overlay),
            ElementKind::Component(component) => {
                if component.is_island() {
                    self.island(component, element, overlay);
                } else {
                    self.component(component, element, overlay);
                }
            }
        }
    }

    fn children(&mut self, element: &Element, overlay: &ContextOverlay) {
        for child in element.children() {
            self.element(child, overlay);
        }
    }

    fn tag(&mut self, tag: &str, element: &Element, overlay: &ContextOverlay) {
        self.out.html.push('<');
        self.out.html.push_str(tag);
        for (name, prop) in element.props().forwarded() {
            match prop.current() {
                Value::Null | Value::Bool(false) | Value::Callback(_) | Value::Element(_) => {}
                Value::Bool(true) => {
                    let _ = write!(self.out.html, " {name}");
                }
                other => {
                    if let Some(text) = other.as_text() {
                        let _ = write!(self.out.html, " {name}=\"{}\"", escape(&text));
                    }
                }
            }
        }
        self.out.html.push('>');
        if is_void_tag(tag) {
            return;
        }
        self.children(element, overlay);
        let _ = write!(self.out.html, "</{tag}>");
    }

    fn value(&mut self, value: &Value, overlay: &ContextOverlay) {
        match value.coerce() {
            Ok(el) => self.element(&el, overlay),
            Err(err) => {
                tracing::warn!(error = %err, "dynamic value has no element form");
                let fallback = self.config.fallback(&err);
                self.element(&fallback, overlay);
            }
        }
    }

    fn component(&mut self, component: &Component, element: &Element, overlay: &ContextOverlay) {
        let cx = Cx::new(component.name(), overlay.clone(), element.children().to_vec());
        match component.invoke(element.props(), &cx) {
            Ok(Output::Element(el)) => self.element(&el, overlay),
            Ok(Output::Signal(source)) => self.value(&source.peek(), overlay),
            Ok(pending @ (Output::Future(_) | Output::Stream(_))) => {
                tracing::debug!(
                    component = component.name(),
                    output = pending.kind_name(),
                    "async component rendered as placeholder"
                );
                let placeholder = self.config.placeholder();
                self.element(&placeholder, overlay);
            }
            Err(source) => {
                let err = RenderError::ComponentFailed {
                    component: component.name(),
                    source,
                };
                tracing::warn!(error = %err, "component failed");
                let fallback = self.config.fallback(&err);
                self.element(&fallback, overlay);
            }
        }
    }

    fn island(&mut self, component: &Component, element: &Element, overlay: &ContextOverlay) {
        let id = self.out.islands.len();
        let props = element
            .props()
            .forwarded()
            .filter_map(|(name, prop)| Some((name.to_string(), prop.current().as_text()?)))
            .collect();
        self.out.islands.push(IslandRecord {
            id,
            component: component.name(),
            props,
        });
        let _ = write!(
            self.out.html,
            "<ripple-island data-island=\"{}\" data-island-id=\"{id}\">",
            escape(component.name())
        );
        self.component(component, element, overlay);
        self.out.html.push_str("</ripple-island>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ripple_core::Signal;
    use ripple_render::{Callback, ComponentError, ContextKey, dynamic, el, fragment, text};

    fn html(element: &Element) -> String {
        render_to_string(element).html
    }

    #[test]
    fn static_tree() {
        let view = el("ul")
            .prop("class", "list")
            .child(el("li").child("a"))
            .child(el("li").child("b"))
            .build();
        assert_eq!(html(&view), "<ul class=\"list\"><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let view = el("p").prop("title", "a\"b").child("<x> & y").build();
        assert_eq!(html(&view), "<p title=\"a&quot;b\">&lt;x&gt; &amp; y</p>");
    }

    #[test]
    fn attribute_value_mapping() {
        let view = el("input")
            .key(1)
            .prop("checked", true)
            .prop("hidden", false)
            .prop("value", Value::Null)
            .prop("size", 4)
            .prop("oninput", Callback::new(|_| {}))
            .build();
        assert_eq!(html(&view), "<input checked size=\"4\">");
    }

    #[test]
    fn signals_contribute_current_value() {
        let count = Signal::new(Value::from(3));
        let class = Signal::new(Value::from("on"));
        let view = el("p")
            .signal_prop("class", class.clone())
            .child(dynamic(count.clone()))
            .build();
        assert_eq!(html(&view), "<p class=\"on\">3</p>");
        assert_eq!(count.listener_count(), 0);
        assert_eq!(class.listener_count(), 0);
    }

    #[test]
    fn components_and_context() {
        let theme = ContextKey::new("theme", String::from("light"));
        let key = theme.clone();
        let badge = Component::new("Badge", move |props, cx| {
            let label = props.value("label").and_then(|v| v.as_text()).unwrap_or_default();
            Ok(el("span")
                .prop("class", cx.inject(&key))
                .child(label)
                .children(cx.children().iter().cloned()))
        });
        let view = fragment([
            badge.element().prop("label", "a").build(),
            theme.provide(
                "dark".into(),
                [badge.element().prop("label", "b").child(text("!")).build()],
            ),
        ]);
        assert_eq!(
            html(&view),
            "<span class=\"light\">a</span><span class=\"dark\">b!</span>"
        );
    }

    #[test]
    fn async_component_writes_placeholder() {
        let slow = Component::new("Slow", |_, _| Ok(Output::future(async { Ok(text("late")) })));
        let config = EngineConfig::default().with_pending_placeholder(|| text("…"));
        let out = render_to_string_with(&slow.element().build(), &ContextOverlay::new(), &config);
        assert_eq!(out.html, "…");
    }

    #[test]
    fn failing_component_writes_fallback() {
        let broken = Component::new("Broken", |_, _| -> Result<Element, ComponentError> {
            Err("no data".into())
        });
        let config = EngineConfig::default().with_error_fallback(|err| text(err.summary()));
        let view = el("div").child(broken.element()).child("ok").build();
        let out = render_to_string_with(&view, &ContextOverlay::new(), &config);
        assert!(out.html.starts_with("<div>"));
        assert!(out.html.ends_with("ok</div>"));
        assert!(out.html.contains("no data"));
    }

    #[test]
    fn islands_are_marked_in_pre_order() {
        let counter = Component::island("Counter", |props, _| {
            let start = props.value("start").and_then(|v| v.as_text()).unwrap_or_default();
            Ok(el("button").child(start))
        });
        let view = el("main")
            .child(counter.element().prop("start", 1))
            .child(counter.element().prop("start", 5).prop("onclick", Callback::new(|_| {})))
            .build();
        let out = render_to_string(&view);
        assert_eq!(
            out.html,
            "<main>\
             <ripple-island data-island=\"Counter\" data-island-id=\"0\"><button>1</button></ripple-island>\
             <ripple-island data-island=\"Counter\" data-island-id=\"1\"><button>5</button></ripple-island>\
             </main>"
        );
        assert_eq!(
            out.islands,
            vec![
                IslandRecord {
                    id: 0,
                    component: "Counter",
                    props: vec![("start".into(), "1".into())],
                },
                IslandRecord {
                    id: 1,
                    component: "Counter",
                    props: vec![("start".into(), "5".into())],
                },
            ]
        );
    }
}
