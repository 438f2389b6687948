#![forbid(unsafe_code)]

//! Immutable element descriptors.
//!
//! An [`Element`] describes what should be rendered; it owns no backend
//! state. Descriptors are cheap to clone (`Rc` inside) and compare by
//! identity.
//!
//! # Kinds
//!
//! | Kind        | Renders as                                        |
//! |-------------|---------------------------------------------------|
//! | `Text`      | one backend text node                             |
//! | `Fragment`  | its children, flattened into the parent           |
//! | `Dynamic`   | the coerced current value of a signal             |
//! | `Tag`       | one backend element with props and children       |
//! | `Component` | whatever the component returns                    |
//! | `Provider`  | its children, with additional context entries     |
//!
//! # Props
//!
//! Prop values are either static [`Value`]s or signals. The names `key`,
//! `ref` and `children` are reserved and never forwarded to a backend.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use ripple_core::ReadSignal;

use crate::component::Component;
use crate::context::ContextEntry;
use crate::value::Value;

/// Prop names the engine never forwards to a backend.
pub const RESERVED_PROPS: [&str; 3] = ["key", "ref", "children"];

#[must_use]
pub fn is_reserved_prop(name: &str) -> bool {
    RESERVED_PROPS.contains(&name)
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Identity hint for matching children across renders.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Key {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

// ---------------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum Prop {
    Static(Value),
    Signal(ReadSignal<Value>),
}

impl Prop {
    /// Current value, without registering a dependency.
    #[must_use]
    pub fn current(&self) -> Value {
        match self {
            Self::Static(v) => v.clone(),
            Self::Signal(s) => s.peek(),
        }
    }

    #[must_use]
    pub fn signal(source: impl Into<ReadSignal<Value>>) -> Self {
        Self::Signal(source.into())
    }
}

impl<T: Into<Value>> From<T> for Prop {
    fn from(v: T) -> Self {
        Self::Static(v.into())
    }
}

/// Ordered prop map. Insertion order is preserved, which keeps backend
/// property writes deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<Rc<str>, Prop>,
}

impl Props {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: &str, prop: impl Into<Prop>) -> Self {
        self.insert(name, prop);
        self
    }

    pub fn insert(&mut self, name: &str, prop: impl Into<Prop>) {
        self.entries.insert(Rc::from(name), prop.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.entries.get(name)
    }

    /// Current value of a prop, peeking signals.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).map(Prop::current)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Prop)> {
        self.entries.iter()
    }

    /// Entries a backend should see.
    pub fn forwarded(&self) -> impl Iterator<Item = (&Rc<str>, &Prop)> {
        self.entries.iter().filter(|(k, _)| !is_reserved_prop(k))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum ElementKind {
    Text(Rc<str>),
    Fragment,
    Dynamic(ReadSignal<Value>),
    Tag(Rc<str>),
    Component(Component),
    Provider(Rc<[ContextEntry]>),
}

impl ElementKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Fragment => "fragment",
            Self::Dynamic(_) => "dynamic",
            Self::Tag(_) => "tag",
            Self::Component(_) => "component",
            Self::Provider(_) => "provider",
        }
    }

    /// Whether two kinds are the same variant, ignoring payloads.
    #[must_use]
    pub fn same_variant(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

struct ElementData {
    kind: ElementKind,
    props: Props,
    children: Vec<Element>,
    key: Option<Key>,
}

/// An immutable, identity-compared render descriptor.
#[derive(Clone)]
pub struct Element {
    data: Rc<ElementData>,
}

impl Element {
    fn from_parts(kind: ElementKind, props: Props, children: Vec<Element>, key: Option<Key>) -> Self {
        Self {
            data: Rc::new(ElementData {
                kind,
                props,
                children,
                key,
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &ElementKind {
        &self.data.kind
    }

    #[must_use]
    pub fn props(&self) -> &Props {
        &self.data.props
    }

    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.data.children
    }

    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.data.key.as_ref()
    }

    /// Tag name, for `Tag` elements.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match &self.data.kind {
            ElementKind::Tag(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Copy of this descriptor with a different key.
    #[must_use]
    pub fn with_key(&self, key: impl Into<Key>) -> Self {
        Self::from_parts(
            self.data.kind.clone(),
            self.data.props.clone(),
            self.data.children.clone(),
            Some(key.into()),
        )
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Element");
        match &self.data.kind {
            ElementKind::Text(s) => d.field("text", s),
            ElementKind::Tag(t) => d.field("tag", t),
            ElementKind::Component(c) => d.field("component", &c.name()),
            other => d.field("kind", &other.name()),
        };
        if let Some(key) = &self.data.key {
            d.field("key", key);
        }
        if !self.data.props.is_empty() {
            d.field("props", &self.data.props.len());
        }
        if !self.data.children.is_empty() {
            d.field("children", &self.data.children);
        }
        d.finish()
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Incremental builder for tag, component, and provider elements.
#[derive(Clone, Debug)]
#[must_use]
pub struct ElementBuilder {
    kind: ElementKind,
    props: Props,
    children: Vec<Element>,
    key: Option<Key>,
}

impl ElementBuilder {
    fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            props: Props::new(),
            children: Vec::new(),
            key: None,
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: &str, value: impl Into<Prop>) -> Self {
        self.props.insert(name, value);
        self
    }

    /// Bind a prop to a signal; the backend sees every change.
    pub fn signal_prop(mut self, name: &str, source: impl Into<ReadSignal<Value>>) -> Self {
        self.props.insert(name, Prop::signal(source));
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        for (name, prop) in props.iter() {
            self.props.insert(name, prop.clone());
        }
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Element {
        Element::from_parts(self.kind, self.props, self.children, self.key)
    }
}

impl From<ElementBuilder> for Element {
    fn from(b: ElementBuilder) -> Self {
        b.build()
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        text(s)
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        text(s)
    }
}

/// A text node descriptor.
#[must_use]
pub fn text(content: impl Into<Rc<str>>) -> Element {
    Element::from_parts(ElementKind::Text(content.into()), Props::new(), Vec::new(), None)
}

/// A tag element builder.
pub fn el(tag: &str) -> ElementBuilder {
    ElementBuilder::new(ElementKind::Tag(Rc::from(tag)))
}

/// A fragment: children rendered in place, with no node of its own.
pub fn fragment<I>(children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Element>,
{
    ElementBuilder::new(ElementKind::Fragment)
        .children(children)
        .build()
}

/// A keyed fragment.
pub fn keyed_fragment<I>(key: impl Into<Key>, children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Element>,
{
    ElementBuilder::new(ElementKind::Fragment)
        .key(key)
        .children(children)
        .build()
}

/// A dynamic marker: renders whatever the signal currently holds.
#[must_use]
pub fn dynamic(source: impl Into<ReadSignal<Value>>) -> Element {
    Element::from_parts(ElementKind::Dynamic(source.into()), Props::new(), Vec::new(), None)
}

/// Element builder invoking `component`.
pub fn component(component: &Component) -> ElementBuilder {
    ElementBuilder::new(ElementKind::Component(component.clone()))
}

pub(crate) fn provider(entries: Rc<[ContextEntry]>) -> ElementBuilder {
    ElementBuilder::new(ElementKind::Provider(entries))
}
