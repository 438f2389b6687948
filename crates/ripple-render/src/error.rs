#![forbid(unsafe_code)]

//! Error types for rendering and component invocation.
//!
//! Nothing in this crate surfaces these errors to the caller of
//! [`Engine::render`](crate::Engine::render). A failure is contained to the
//! subtree that produced it: the engine logs it and renders the configured
//! error fallback in its place (see [`EngineConfig`](crate::EngineConfig)).

use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Result of a fallible rendering step.
pub type Result<T> = std::result::Result<T, RenderError>;

/// A failure observed while turning a descriptor into backend nodes.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// A dynamic marker produced a value with no element coercion.
    #[error("signal produced a {kind} value, which cannot be rendered")]
    InvalidSignalValue { kind: &'static str },

    /// A component returned an error or panicked, either during invocation
    /// or inside the future it suspended on.
    #[error("component `{component}` failed: {source}")]
    ComponentFailed {
        component: &'static str,
        #[source]
        source: ComponentError,
    },

    /// A streaming component yielded an error or panicked mid-stream.
    #[error("component `{component}` stream failed: {source}")]
    StreamFailed {
        component: &'static str,
        #[source]
        source: ComponentError,
    },

    /// A task for an async component could not be spawned.
    #[error("component `{component}` could not be scheduled: executor is gone")]
    SpawnFailed { component: &'static str },

    /// The engine's job queue did not drain within the configured bound.
    #[error("update queue did not settle after {limit} jobs")]
    FlushOverflow { limit: usize },
}

impl RenderError {
    /// Short human-readable message used by error fallbacks.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::ComponentFailed { source, .. } | Self::StreamFailed { source, .. } => {
                source.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Error produced by a component function or the future/stream it returns.
#[derive(Clone, Error)]
pub enum ComponentError {
    #[error("{0}")]
    Message(String),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Source(Rc<dyn StdError + 'static>),
}

impl ComponentError {
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an arbitrary error value.
    #[must_use]
    pub fn from_error(err: impl StdError + 'static) -> Self {
        Self::Source(Rc::new(err))
    }
}

impl fmt::Debug for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(m) => f.debug_tuple("Message").field(m).finish(),
            Self::Panicked(m) => f.debug_tuple("Panicked").field(m).finish(),
            Self::Source(e) => f.debug_tuple("Source").field(&e.to_string()).finish(),
        }
    }
}

impl From<String> for ComponentError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for ComponentError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}
