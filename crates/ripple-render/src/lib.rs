#![forbid(unsafe_code)]

//! Descriptors, components, context, and the reconciliation engine.
//!
//! # Architecture
//!
//! - [`element`]: immutable [`Element`] descriptors and their builders.
//! - [`component`]: [`Component`] functions and their [`Output`].
//! - [`context`] / [`cx`]: typed context keys, the persistent overlay, and
//!   the [`Cx`] handle components read it through.
//! - [`strategy`]: the [`RenderStrategy`] contract every backend implements.
//! - [`engine`]: the [`Engine`] that renders descriptors through a strategy
//!   and keeps them in step with their signals.
//!
//! # Example
//!
//! ```ignore
//! use ripple_render::{Engine, el, dynamic, Value};
//! use ripple_core::Signal;
//!
//! let count = Signal::new(Value::from(0));
//! let view = el("p").child("count: ").child(dynamic(count.clone())).build();
//! let engine = Engine::new(backend);
//! let root = engine.mount(container, &view);
//! count.set(Value::from(1)); // the text node is patched in place
//! ```

pub mod component;
pub mod config;
pub mod context;
pub mod cx;
pub mod element;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod strategy;
pub mod value;

pub use component::{Component, ComponentResult, Output, element_stream};
pub use config::EngineConfig;
pub use context::{ContextEntry, ContextKey, ContextOverlay, provide_many};
pub use cx::Cx;
pub use element::{
    Element, ElementBuilder, ElementKind, Key, Prop, Props, component, dynamic, el, fragment,
    is_reserved_prop, keyed_fragment, text,
};
pub use engine::{Engine, RenderId, RenderedInfo, RenderedKind};
pub use error::{ComponentError, RenderError};
pub use scheduler::Scheduler;
pub use strategy::{NodePatch, RenderStrategy};
pub use value::{Callback, Value};
