#![forbid(unsafe_code)]

//! Document backend for ripple.
//!
//! - [`node`]: an in-memory document of identity-compared [`DomNode`]s.
//! - [`strategy`]: [`DomStrategy`], a reuse-capable
//!   [`RenderStrategy`](ripple_render::RenderStrategy) over that document.
//! - [`ssr`]: a one-shot HTML string renderer with island markers.
//!
//! # Example
//!
//! ```ignore
//! use ripple_dom::{Document, DomStrategy};
//! use ripple_render::{Engine, el};
//!
//! let doc = Document::new();
//! let body = doc.body();
//! let engine = Engine::new(DomStrategy::new(doc));
//! engine.mount(body.clone(), &el("p").child("hi").build());
//! assert_eq!(body.inner_html(), "<p>hi</p>");
//! ```

pub mod node;
pub mod ssr;
pub mod strategy;

pub use node::{Document, DomNode, escape, is_void_tag};
pub use ssr::{IslandRecord, SsrOutput, render_to_string, render_to_string_with};
pub use strategy::{DomMutation, DomStrategy, MutationStats};
