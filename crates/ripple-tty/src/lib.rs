#![forbid(unsafe_code)]

//! Terminal backend for ripple.
//!
//! - [`strategy`]: [`TtyStrategy`], a retained node tree that never reuses
//!   nodes in place.
//! - [`paint`]: flow layout of that tree into cells.
//! - [`cell`]: the [`CellBuffer`] grid and [`StyleFlags`].
//!
//! # Example
//!
//! ```ignore
//! use ripple_render::{Engine, el};
//! use ripple_tty::TtyStrategy;
//!
//! let tty = TtyStrategy::new();
//! let screen = tty.screen();
//! let engine = Engine::new(tty);
//! engine.mount(screen, &el("p").child("hello").build());
//! let lines = engine.with_strategy(|t| t.lines(80));
//! assert_eq!(lines, vec!["hello"]);
//! ```

pub mod cell;
pub mod paint;
pub mod strategy;

pub use cell::{Cell, CellBuffer, CellContent, StyleFlags, grapheme_width};
pub use paint::is_inline_tag;
pub use strategy::{TtyNode, TtyStats, TtyStrategy};
