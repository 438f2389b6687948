#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! Defaults suit production. [`EngineConfig::from_env`] layers the
//! `RIPPLE_*` environment variables on top:
//!
//! | Variable                | Field            |
//! |-------------------------|------------------|
//! | `RIPPLE_ALLOW_REUSE`    | `allow_reuse`    |
//! | `RIPPLE_STRICT`         | `strict`         |
//! | `RIPPLE_MAX_FLUSH_JOBS` | `max_flush_jobs` |

use std::env;
use std::fmt;
use std::rc::Rc;

use crate::element::{Element, el, text};
use crate::error::RenderError;

type PlaceholderFn = Rc<dyn Fn() -> Element>;
type FallbackFn = Rc<dyn Fn(&RenderError) -> Element>;

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Clone)]
pub struct EngineConfig {
    /// Offer in-place patches to the backend before replacing nodes.
    pub allow_reuse: bool,
    /// Panic on internal bookkeeping inconsistencies instead of logging them.
    pub strict: bool,
    /// Upper bound on update jobs processed in one drain.
    pub max_flush_jobs: usize,
    /// Rendered while an async or streaming component has not yielded yet.
    pub pending_placeholder: PlaceholderFn,
    /// Rendered in place of a subtree that failed.
    pub error_fallback: FallbackFn,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_reuse: true,
            strict: cfg!(debug_assertions),
            max_flush_jobs: 10_000,
            pending_placeholder: Rc::new(|| text("")),
            error_fallback: Rc::new(default_error_fallback),
        }
    }
}

fn default_error_fallback(err: &RenderError) -> Element {
    el("ripple-error")
        .prop("role", "alert")
        .child(text(format!("⚠ {}", err.summary())))
        .build()
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => Some(true),
        v if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") => Some(false),
        _ => None,
    }
}

impl EngineConfig {
    /// Defaults overridden by `RIPPLE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().apply_env(|name| env::var(name).ok())
    }

    /// Apply overrides from `lookup`; unparsable values are ignored with a
    /// warning.
    #[must_use]
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("RIPPLE_ALLOW_REUSE") {
            match parse_flag(&val) {
                Some(b) => self.allow_reuse = b,
                None => tracing::warn!(value = %val, "ignoring invalid RIPPLE_ALLOW_REUSE"),
            }
        }
        if let Some(val) = lookup("RIPPLE_STRICT") {
            match parse_flag(&val) {
                Some(b) => self.strict = b,
                None => tracing::warn!(value = %val, "ignoring invalid RIPPLE_STRICT"),
            }
        }
        if let Some(val) = lookup("RIPPLE_MAX_FLUSH_JOBS")
            && let Ok(n) = val.trim().parse::<usize>()
            && n > 0
        {
            self.max_flush_jobs = n;
        }
        self
    }

    #[must_use]
    pub fn with_reuse(mut self, enabled: bool) -> Self {
        self.allow_reuse = enabled;
        self
    }

    #[must_use]
    pub fn with_strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    #[must_use]
    pub fn with_max_flush_jobs(mut self, limit: usize) -> Self {
        self.max_flush_jobs = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_pending_placeholder(mut self, f: impl Fn() -> Element + 'static) -> Self {
        self.pending_placeholder = Rc::new(f);
        self
    }

    #[must_use]
    pub fn with_error_fallback(mut self, f: impl Fn(&RenderError) -> Element + 'static) -> Self {
        self.error_fallback = Rc::new(f);
        self
    }

    #[must_use]
    pub fn placeholder(&self) -> Element {
        (self.pending_placeholder)()
    }

    #[must_use]
    pub fn fallback(&self, err: &RenderError) -> Element {
        (self.error_fallback)(err)
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("allow_reuse", &self.allow_reuse)
            .field("strict", &self.strict)
            .field("max_flush_jobs", &self.max_flush_jobs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert!(cfg.allow_reuse);
        assert_eq!(cfg.strict, cfg!(debug_assertions));
        assert_eq!(cfg.max_flush_jobs, 10_000);
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = EngineConfig::default().apply_env(lookup(&[
            ("RIPPLE_ALLOW_REUSE", "false"),
            ("RIPPLE_STRICT", "1"),
            ("RIPPLE_MAX_FLUSH_JOBS", "64"),
        ]));
        assert!(!cfg.allow_reuse);
        assert!(cfg.strict);
        assert_eq!(cfg.max_flush_jobs, 64);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let cfg = EngineConfig::default().apply_env(lookup(&[
            ("RIPPLE_ALLOW_REUSE", "maybe"),
            ("RIPPLE_MAX_FLUSH_JOBS", "0"),
        ]));
        assert!(cfg.allow_reuse);
        assert_eq!(cfg.max_flush_jobs, 10_000);
    }

    #[test]
    fn default_fallback_shows_message() {
        let cfg = EngineConfig::default();
        let el = cfg.fallback(&RenderError::InvalidSignalValue { kind: "callback" });
        assert_eq!(el.tag(), Some("ripple-error"));
        match el.children()[0].kind() {
            ElementKind::Text(t) => assert!(t.starts_with("⚠ signal produced a callback")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn builders_chain() {
        let cfg = EngineConfig::default()
            .with_reuse(false)
            .with_strict(false)
            .with_max_flush_jobs(0)
            .with_pending_placeholder(|| text("loading"));
        assert!(!cfg.allow_reuse);
        assert_eq!(cfg.max_flush_jobs, 1);
        assert!(matches!(cfg.placeholder().kind(), ElementKind::Text(t) if &**t == "loading"));
    }
}
