#![forbid(unsafe_code)]

//! Typed context keys and the immutable overlay that carries them.
//!
//! A [`ContextKey`] is an opaque identity plus a default value. Provider
//! elements extend the current [`ContextOverlay`] for their subtree; a
//! component reads it through [`Cx::inject`](crate::Cx::inject).
//!
//! # Invariants
//!
//! 1. Overlays are persistent: extending one never changes what holders of
//!    the original observe. This is what lets an async component read the
//!    context it was invoked under after it resumes.
//! 2. Lookups resolve to the nearest enclosing provider for the key, or to
//!    the key's default when none encloses it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::element::{Element, provider};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_context_id() -> u64 {
    NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Typed, opaque context identity with a default value.
pub struct ContextKey<T> {
    id: u64,
    name: &'static str,
    default: Rc<T>,
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name,
            default: Rc::clone(&self.default),
        }
    }
}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl<T: Clone + 'static> ContextKey<T> {
    /// A fresh key, distinct from every other key including ones with the
    /// same name.
    #[must_use]
    pub fn new(name: &'static str, default: T) -> Self {
        Self {
            id: next_context_id(),
            name,
            default: Rc::new(default),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn default_value(&self) -> T {
        (*self.default).clone()
    }

    /// Pair this key with a value, for [`provide_many`].
    #[must_use]
    pub fn entry(&self, value: T) -> ContextEntry {
        ContextEntry {
            id: self.id,
            name: self.name,
            value: Rc::new(value),
        }
    }

    /// Provider element making `value` visible to `children`.
    pub fn provide<I>(&self, value: T, children: I) -> Element
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        provide_many([self.entry(value)], children)
    }
}

/// A key/value pair held by a provider element.
#[derive(Clone)]
pub struct ContextEntry {
    id: u64,
    name: &'static str,
    value: Rc<dyn Any>,
}

impl fmt::Debug for ContextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Provider element for several keys at once.
pub fn provide_many<E, I>(entries: E, children: I) -> Element
where
    E: IntoIterator<Item = ContextEntry>,
    I: IntoIterator,
    I::Item: Into<Element>,
{
    let entries: Rc<[ContextEntry]> = entries.into_iter().collect();
    provider(entries).children(children).build()
}

/// Persistent map from context identity to value.
#[derive(Clone, Default)]
pub struct ContextOverlay {
    map: im::HashMap<u64, Rc<dyn Any>>,
}

impl ContextOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this overlay with `entries` layered on top.
    #[must_use]
    pub fn extend(&self, entries: &[ContextEntry]) -> Self {
        let mut map = self.map.clone();
        for entry in entries {
            map.insert(entry.id, Rc::clone(&entry.value));
        }
        Self { map }
    }

    /// Builder form: layer a single value.
    #[must_use]
    pub fn with<T: Clone + 'static>(&self, key: &ContextKey<T>, value: T) -> Self {
        self.extend(&[key.entry(value)])
    }

    /// Provided value for `key`, if an enclosing provider set one.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self, key: &ContextKey<T>) -> Option<T> {
        let value = self.map.get(&key.id)?;
        match value.downcast_ref::<T>() {
            Some(v) => Some(v.clone()),
            None => {
                tracing::error!(
                    context = key.name,
                    "context value has a different type than its key"
                );
                None
            }
        }
    }

    /// Provided value for `key`, or the key's default.
    #[must_use]
    pub fn resolve<T: Clone + 'static>(&self, key: &ContextKey<T>) -> T {
        self.get(key).unwrap_or_else(|| key.default_value())
    }

    #[must_use]
    pub fn contains<T>(&self, key: &ContextKey<T>) -> bool {
        self.map.contains_key(&key.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// True when both overlays resolve every key to the same provided value.
    #[must_use]
    pub fn same_entries(&self, other: &ContextOverlay) -> bool {
        if self.map.ptr_eq(&other.map) {
            return true;
        }
        self.map.len() == other.map.len()
            && self
                .map
                .iter()
                .all(|(id, value)| other.map.get(id).is_some_and(|v| Rc::ptr_eq(v, value)))
    }
}

impl fmt::Debug for ContextOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOverlay")
            .field("entries", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKind, text};

    #[test]
    fn absent_key_resolves_to_default() {
        let theme = ContextKey::new("theme", "light");
        let overlay = ContextOverlay::new();
        assert_eq!(overlay.get(&theme), None);
        assert_eq!(overlay.resolve(&theme), "light");
    }

    #[test]
    fn extension_does_not_mutate_original() {
        let theme = ContextKey::new("theme", "light");
        let base = ContextOverlay::new().with(&theme, "dark");
        let inner = base.with(&theme, "contrast");
        assert_eq!(base.resolve(&theme), "dark");
        assert_eq!(inner.resolve(&theme), "contrast");
    }

    #[test]
    fn keys_with_same_name_are_distinct() {
        let a = ContextKey::new("user", 1);
        let b = ContextKey::new("user", 2);
        let overlay = ContextOverlay::new().with(&a, 10);
        assert_eq!(overlay.resolve(&a), 10);
        assert_eq!(overlay.resolve(&b), 2);
        assert!(!overlay.contains(&b));
    }

    #[test]
    fn provide_builds_provider_element() {
        let lang = ContextKey::new("lang", String::from("en"));
        let el = lang.provide(String::from("fr"), [text("hello")]);
        match el.kind() {
            ElementKind::Provider(entries) => assert_eq!(entries.len(), 1),
            other => panic!("expected provider, got {other:?}"),
        }
        assert_eq!(el.children().len(), 1);
    }

    #[test]
    fn provide_many_layers_all_entries() {
        let a = ContextKey::new("a", 0u8);
        let b = ContextKey::new("b", 0u8);
        let el = provide_many([a.entry(1), b.entry(2)], [text("x")]);
        let ElementKind::Provider(entries) = el.kind() else {
            panic!("expected provider");
        };
        let overlay = ContextOverlay::new().extend(entries);
        assert_eq!((overlay.resolve(&a), overlay.resolve(&b)), (1, 2));
    }

    #[test]
    fn same_entries_compares_provided_values_by_identity() {
        let theme = ContextKey::new("theme", "light");
        let dark = [theme.entry("dark")];
        let base = ContextOverlay::new();
        assert!(base.extend(&dark).same_entries(&base.extend(&dark)));
        assert!(base.same_entries(&base.clone()));
        // Equal values from separate entries are different provisions.
        assert!(!base.extend(&dark).same_entries(&base.with(&theme, "dark")));
        assert!(!base.extend(&dark).same_entries(&base));
    }
}
