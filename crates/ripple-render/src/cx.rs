#![forbid(unsafe_code)]

//! Invocation context (`Cx`) handed to every component.
//!
//! `Cx` is cheaply cloneable (`Rc` inside) and immutable. It captures the
//! context overlay in effect where the component was placed, so a clone
//! moved into an async block resolves context exactly as the synchronous
//! part of the component did, no matter when the block resumes.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::{ContextKey, ContextOverlay};
use crate::element::{Element, fragment};

static NEXT_CX_ID: AtomicU64 = AtomicU64::new(1);

fn next_cx_id() -> u64 {
    NEXT_CX_ID.fetch_add(1, Ordering::Relaxed)
}

struct CxInner {
    id: u64,
    component: &'static str,
    overlay: ContextOverlay,
    children: Vec<Element>,
}

/// Component invocation handle.
#[derive(Clone)]
pub struct Cx {
    inner: Rc<CxInner>,
}

impl Cx {
    /// Context for invoking `component` under `overlay` with `children`.
    #[must_use]
    pub fn new(component: &'static str, overlay: ContextOverlay, children: Vec<Element>) -> Self {
        Self {
            inner: Rc::new(CxInner {
                id: next_cx_id(),
                component,
                overlay,
                children,
            }),
        }
    }

    /// Context with an empty overlay and no children.
    #[must_use]
    pub fn detached(component: &'static str) -> Self {
        Self::new(component, ContextOverlay::new(), Vec::new())
    }

    /// Value provided for `key` by the nearest enclosing provider, or the
    /// key's default.
    #[must_use]
    pub fn inject<T: Clone + 'static>(&self, key: &ContextKey<T>) -> T {
        self.inner.overlay.resolve(key)
    }

    /// Like [`inject`](Self::inject), but `None` when no provider encloses
    /// the component.
    #[must_use]
    pub fn try_inject<T: Clone + 'static>(&self, key: &ContextKey<T>) -> Option<T> {
        self.inner.overlay.get(key)
    }

    /// Children passed to the component element.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.inner.children
    }

    /// The children wrapped in a fragment.
    #[must_use]
    pub fn children_fragment(&self) -> Element {
        fragment(self.inner.children.iter().cloned())
    }

    #[must_use]
    pub fn overlay(&self) -> &ContextOverlay {
        &self.inner.overlay
    }

    #[must_use]
    pub fn component(&self) -> &'static str {
        self.inner.component
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }
}

impl fmt::Debug for Cx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx")
            .field("id", &self.inner.id)
            .field("component", &self.inner.component)
            .field("overlay", &self.inner.overlay)
            .field("children", &self.inner.children.len())
            .finish()
    }
}
