#![forbid(unsafe_code)]

//! Components: named functions from props to [`Output`].
//!
//! A component may answer synchronously with an element or a signal, or
//! asynchronously with a future or a stream of elements. The engine renders
//! a placeholder until an async output settles; see
//! [`EngineConfig::pending_placeholder`](crate::EngineConfig).
//!
//! # Failure Modes
//!
//! - **Component returns `Err`**: the engine renders the error fallback in
//!   its place.
//! - **Component panics**: caught by [`Component::invoke`] and reported as
//!   [`ComponentError::Panicked`].

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::stream::LocalBoxStream;
use futures::{FutureExt, Stream, StreamExt};
use ripple_core::{ReadSignal, panic_message};

use crate::cx::Cx;
use crate::element::{self, Element, ElementBuilder, Props};
use crate::error::ComponentError;
use crate::value::Value;

/// What a component produced.
pub enum Output {
    Element(Element),
    Future(LocalBoxFuture<'static, Result<Element, ComponentError>>),
    Stream(LocalBoxStream<'static, Result<Element, ComponentError>>),
    Signal(ReadSignal<Value>),
}

impl Output {
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Element, ComponentError>> + 'static,
    {
        Self::Future(fut.boxed_local())
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Element, ComponentError>> + 'static,
    {
        Self::Stream(stream.boxed_local())
    }

    pub fn signal(source: impl Into<ReadSignal<Value>>) -> Self {
        Self::Signal(source.into())
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Element(_) => "element",
            Self::Future(_) => "future",
            Self::Stream(_) => "stream",
            Self::Signal(_) => "signal",
        }
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(el) => f.debug_tuple("Element").field(el).finish(),
            other => write!(f, "Output::{}", other.kind_name()),
        }
    }
}

impl From<Element> for Output {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}

impl From<ElementBuilder> for Output {
    fn from(b: ElementBuilder) -> Self {
        Self::Element(b.build())
    }
}

pub type ComponentResult = Result<Output, ComponentError>;

type RenderFn = dyn Fn(&Props, &Cx) -> ComponentResult;

struct ComponentDef {
    name: &'static str,
    island: bool,
    render: Box<RenderFn>,
}

/// A named, identity-compared component function.
#[derive(Clone)]
pub struct Component {
    def: Rc<ComponentDef>,
}

impl Component {
    pub fn new<F, O>(name: &'static str, render: F) -> Self
    where
        F: Fn(&Props, &Cx) -> Result<O, ComponentError> + 'static,
        O: Into<Output>,
    {
        Self::build(name, false, render)
    }

    /// A component the string renderer wraps in an island marker.
    pub fn island<F, O>(name: &'static str, render: F) -> Self
    where
        F: Fn(&Props, &Cx) -> Result<O, ComponentError> + 'static,
        O: Into<Output>,
    {
        Self::build(name, true, render)
    }

    fn build<F, O>(name: &'static str, island: bool, render: F) -> Self
    where
        F: Fn(&Props, &Cx) -> Result<O, ComponentError> + 'static,
        O: Into<Output>,
    {
        Self {
            def: Rc::new(ComponentDef {
                name,
                island,
                render: Box::new(move |props, cx| render(props, cx).map(Into::into)),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    #[must_use]
    pub fn is_island(&self) -> bool {
        self.def.island
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.def, &other.def)
    }

    /// Element builder invoking this component.
    pub fn element(&self) -> ElementBuilder {
        element::component(self)
    }

    /// Call the component, converting a panic into an error.
    pub fn invoke(&self, props: &Props, cx: &Cx) -> ComponentResult {
        match catch_unwind(AssertUnwindSafe(|| (self.def.render)(props, cx))) {
            Ok(result) => result,
            Err(payload) => Err(ComponentError::Panicked(panic_message(&*payload))),
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.def.name)
            .field("island", &self.def.island)
            .finish()
    }
}

/// Adapt a stream of plain elements into a component stream output.
pub fn element_stream<S>(stream: S) -> Output
where
    S: Stream<Item = Element> + 'static,
{
    Output::stream(stream.map(Ok))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{el, text};

    #[test]
    fn invoke_returns_element() {
        let hello = Component::new("Hello", |props, _cx| {
            let name = props
                .value("name")
                .and_then(|v| v.as_text())
                .unwrap_or_default();
            Ok(el("p").child(format!("hi {name}")))
        });
        let out = hello
            .invoke(&Props::new().with("name", "ada"), &Cx::detached("Hello"))
            .unwrap();
        let Output::Element(e) = out else {
            panic!("expected element output");
        };
        assert_eq!(e.tag(), Some("p"));
    }

    #[test]
    fn panic_becomes_error() {
        let broken = Component::new("Broken", |_, _| -> Result<Element, ComponentError> {
            panic!("render exploded")
        });
        let err = broken
            .invoke(&Props::new(), &Cx::detached("Broken"))
            .unwrap_err();
        match err {
            ComponentError::Panicked(msg) => assert!(msg.contains("render exploded")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn identity_and_island_flag() {
        let a = Component::new("A", |_, _| Ok(text("a")));
        let b = Component::island("A", |_, _| Ok(text("a")));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(!a.is_island());
        assert!(b.is_island());
    }

    #[test]
    fn output_kind_names() {
        let fut = Output::future(async { Ok(text("x")) });
        assert_eq!(fut.kind_name(), "future");
        let stream = element_stream(futures::stream::iter(vec![text("x")]));
        assert_eq!(stream.kind_name(), "stream");
    }
}
