#![forbid(unsafe_code)]

//! Reference components and mount helpers shared by the e2e suites.
//!
//! The async fixtures hand the test a controller: [`Deferred`] resolves the
//! futures its component returned, oldest first, and [`Ticker`] pushes
//! elements into the streams its component returned.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::{mpsc, oneshot};
use ripple_core::Signal;
use ripple_dom::{Document, DomNode, DomStrategy};
use ripple_render::{
    Component, ComponentError, Element, Engine, EngineConfig, Output, RenderId, Value, dynamic, el,
    fragment,
};
use ripple_tty::TtyStrategy;

use crate::spy::Spy;

// ---------------------------------------------------------------------------
// Mount helpers
// ---------------------------------------------------------------------------

/// An engine over a spied document, mounted into `body`.
pub struct DomFixture {
    pub engine: Engine<Spy<DomStrategy>>,
    pub body: DomNode,
    pub root: RenderId,
}

impl DomFixture {
    #[must_use]
    pub fn mount(view: &Element) -> Self {
        Self::mount_with(view, EngineConfig::default())
    }

    #[must_use]
    pub fn mount_with(view: &Element, config: EngineConfig) -> Self {
        let doc = Document::new();
        let body = doc.body();
        let engine = Engine::with_config(Spy::new(DomStrategy::new(doc)), config);
        let root = engine.mount(body.clone(), view);
        engine.with_strategy(Spy::clear);
        Self { engine, body, root }
    }

    #[must_use]
    pub fn html(&self) -> String {
        self.body.inner_html()
    }

    /// Structural backend calls since the last [`clear`](Self::clear).
    #[must_use]
    pub fn structural(&self) -> usize {
        self.engine.with_strategy(|s| s.structural_count())
    }

    pub fn clear(&self) {
        self.engine.with_strategy(Spy::clear);
    }
}

/// An engine over a spied terminal tree.
pub struct TtyFixture {
    pub engine: Engine<Spy<TtyStrategy>>,
    pub root: RenderId,
}

impl TtyFixture {
    #[must_use]
    pub fn mount(view: &Element) -> Self {
        let tty = TtyStrategy::new();
        let screen = tty.screen();
        let engine = Engine::new(Spy::new(tty));
        let root = engine.mount(screen, view);
        engine.with_strategy(Spy::clear);
        Self { engine, root }
    }

    #[must_use]
    pub fn lines(&self, width: usize) -> Vec<String> {
        self.engine.with_strategy(|s| s.inner().lines(width))
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// `<li>` keyed by `key` with text `item <key>`.
#[must_use]
pub fn keyed_item(key: i64) -> Element {
    el("li").key(key).child(format!("item {key}")).build()
}

/// A fragment of [`keyed_item`]s.
#[must_use]
pub fn keyed_list(keys: &[i64]) -> Element {
    fragment(keys.iter().map(|k| keyed_item(*k)))
}

/// Expected markup of a `<ul>` holding [`keyed_list`]`(keys)`.
#[must_use]
pub fn keyed_list_html(keys: &[i64]) -> String {
    let items: String = keys.iter().map(|k| format!("<li>item {k}</li>")).collect();
    format!("<ul>{items}</ul>")
}

/// `<ul>` whose items follow `items`.
#[must_use]
pub fn list_view(items: &Signal<Value>) -> Element {
    el("ul").child(dynamic(items.clone())).build()
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Renders `<span>{label}: {count}</span>` from its `label` and `count` props.
#[must_use]
pub fn counter() -> Component {
    Component::new("Counter", |props, _cx| {
        let label = props.value("label").and_then(|v| v.as_text()).unwrap_or_default();
        let count = props.value("count").and_then(|v| v.as_text()).unwrap_or_default();
        Ok(el("span").child(format!("{label}: {count}")))
    })
}

/// Always fails with `message`.
#[must_use]
pub fn failing(message: &'static str) -> Component {
    Component::new("Failing", move |_, _| -> Result<Element, ComponentError> {
        Err(ComponentError::msg(message))
    })
}

/// Always panics with `message`.
#[must_use]
pub fn panicking(message: &'static str) -> Component {
    Component::new("Panicking", move |_, _| -> Result<Element, ComponentError> {
        panic!("{message}")
    })
}

type Pending = oneshot::Sender<Result<Element, ComponentError>>;

/// Controller for the futures returned by a [`deferred`] component.
#[derive(Clone, Default)]
pub struct Deferred {
    pending: Rc<RefCell<VecDeque<Pending>>>,
}

impl Deferred {
    /// Resolve the oldest unresolved future. Returns `false` when none is
    /// waiting or its task was cancelled.
    pub fn resolve(&self, result: Result<Element, ComponentError>) -> bool {
        let next = self.pending.borrow_mut().pop_front();
        match next {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Resolve the most recently handed-out future.
    pub fn resolve_newest(&self, result: Result<Element, ComponentError>) -> bool {
        let next = self.pending.borrow_mut().pop_back();
        match next {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Futures handed out and not yet resolved, cancelled ones included.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Handed-out futures whose task has been dropped.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.pending.borrow().iter().filter(|tx| tx.is_canceled()).count()
    }
}

/// A component returning a future the test resolves through [`Deferred`].
#[must_use]
pub fn deferred(name: &'static str) -> (Component, Deferred) {
    let control = Deferred::default();
    let pending = Rc::clone(&control.pending);
    let component = Component::new(name, move |_, _| {
        let (tx, rx) = oneshot::channel();
        pending.borrow_mut().push_back(tx);
        Ok(Output::future(rx.map(|r| {
            r.unwrap_or_else(|_| Err(ComponentError::msg("resolver dropped")))
        })))
    });
    (component, control)
}

type Feed = mpsc::UnboundedSender<Result<Element, ComponentError>>;

/// Controller for the streams returned by a [`ticker`] component.
#[derive(Clone, Default)]
pub struct Ticker {
    feeds: Rc<RefCell<Vec<Feed>>>,
}

impl Ticker {
    /// Push `item` into every open stream. Returns how many accepted it.
    pub fn push(&self, item: Result<Element, ComponentError>) -> usize {
        let mut feeds = self.feeds.borrow_mut();
        feeds.retain(|tx| !tx.is_closed());
        feeds
            .iter()
            .filter(|tx| tx.unbounded_send(item.clone()).is_ok())
            .count()
    }

    /// Streams still being consumed.
    #[must_use]
    pub fn open(&self) -> usize {
        self.feeds.borrow().iter().filter(|tx| !tx.is_closed()).count()
    }

    /// End every stream.
    pub fn close(&self) {
        for tx in self.feeds.borrow_mut().drain(..) {
            tx.close_channel();
        }
    }
}

/// A component returning a stream the test feeds through [`Ticker`].
#[must_use]
pub fn ticker(name: &'static str) -> (Component, Ticker) {
    let control = Ticker::default();
    let feeds = Rc::clone(&control.feeds);
    let component = Component::new(name, move |_, _| {
        let (tx, rx) = mpsc::unbounded();
        feeds.borrow_mut().push(tx);
        Ok(Output::stream(rx))
    });
    (component, control)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_list_html_matches_mount() {
        let items = Signal::new(Value::from(keyed_list(&[2, 1])));
        let fx = DomFixture::mount(&list_view(&items));
        assert_eq!(fx.html(), keyed_list_html(&[2, 1]));
    }

    #[test]
    fn counter_renders_props() {
        let view = counter().element().prop("label", "n").prop("count", 4).build();
        let fx = DomFixture::mount(&view);
        assert_eq!(fx.html(), "<span>n: 4</span>");
    }

    #[test]
    fn deferred_without_waiters_reports_false() {
        let (_c, control) = deferred("Slow");
        assert!(!control.resolve(Ok(el("p").build())));
        assert_eq!(control.waiting(), 0);
    }
}
