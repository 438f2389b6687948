#![forbid(unsafe_code)]

//! ripple public facade crate.
//!
//! Re-exports the reactive core, the renderer, and the enabled backends, and
//! installs the log subscriber (see [`logging`]).
//!
//! # Example
//!
//! ```ignore
//! use ripple::prelude::*;
//!
//! ripple::logging::init();
//! let count = Signal::new(Value::from(0));
//! let doc = Document::new();
//! let engine = Engine::new(DomStrategy::new(doc.clone()));
//! engine.mount(doc.body(), &el("p").child(dynamic(count.clone())).build());
//! count.set(Value::from(1));
//! ```

pub mod logging;

pub use ripple_core as core;
#[cfg(feature = "dom")]
pub use ripple_dom as dom;
pub use ripple_render as render;
#[cfg(feature = "tty")]
pub use ripple_tty as tty;

pub mod prelude {
    pub use ripple_core::{
        Computed, Effect, ReadSignal, Readable, Signal, Subscription, batch, computed, effect,
        untracked,
    };
    pub use ripple_render::{
        Callback, Component, ComponentError, ContextKey, Cx, Element, Engine, EngineConfig, Key,
        Output, RenderStrategy, Value, component, dynamic, el, fragment, keyed_fragment, text,
    };

    #[cfg(feature = "dom")]
    pub use ripple_dom::{Document, DomNode, DomStrategy, render_to_string};
    #[cfg(feature = "tty")]
    pub use ripple_tty::{TtyNode, TtyStrategy};
}
