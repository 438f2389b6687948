#![forbid(unsafe_code)]

//! Log subscriber setup.
//!
//! The filter comes from `RIPPLE_LOG` (standard `EnvFilter` directives, for
//! example `ripple_render=debug`) and defaults to `warn`. With the
//! `tracing-json` feature, `RIPPLE_LOG_FORMAT=json` switches to one JSON
//! object per line.
//!
//! Span names emitted by the renderer: `ripple.render`, `ripple.mount`,
//! `ripple.patch`, `ripple.component`, `ripple.unmount`, `ripple.ssr`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RIPPLE_LOG";
pub const FORMAT_ENV: &str = "RIPPLE_LOG_FORMAT";
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Filter for `directives`, or the default when absent or unparsable.
#[must_use]
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Filter from `RIPPLE_LOG`.
#[must_use]
pub fn env_filter() -> EnvFilter {
    filter_from(std::env::var(LOG_ENV).ok().as_deref())
}

/// Install a global stderr subscriber. Returns `false` when one was already
/// installed.
pub fn init() -> bool {
    let installed = install(env_filter());
    if installed {
        tracing::debug!(env = LOG_ENV, "ripple logging initialized");
    }
    installed
}

#[cfg(feature = "tracing-json")]
fn install(filter: EnvFilter) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let json = std::env::var(FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

#[cfg(not(feature = "tracing-json"))]
fn install(filter: EnvFilter) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
