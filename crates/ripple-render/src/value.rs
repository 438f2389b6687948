#![forbid(unsafe_code)]

//! Dynamic values carried by signals, props, and dynamic markers.
//!
//! A [`Value`] is what a dynamic marker's signal produces and what a backend
//! receives in [`RenderStrategy::set_property`](crate::RenderStrategy::set_property).
//!
//! # Equality
//!
//! Scalars and strings compare structurally. Elements and callbacks compare by
//! identity: two separately built descriptors are never equal, even when they
//! describe the same tree.
//!
//! # Coercion
//!
//! [`Value::coerce`] turns a dynamic marker's value into the element that is
//! actually rendered:
//!
//! | Value            | Element                   |
//! |------------------|---------------------------|
//! | `Element`        | itself                    |
//! | `Str`            | text node                 |
//! | `Int` / `Float`  | text node of its decimal  |
//! | `Null` / `Bool`  | empty text node           |
//! | `Callback`       | [`RenderError::InvalidSignalValue`] |

use std::fmt;
use std::rc::Rc;

use crate::element::{Element, text};
use crate::error::{self, RenderError};

/// Event handler or other callable prop value.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Value)>);

impl Callback {
    pub fn new(f: impl Fn(&Value) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, arg: &Value) {
        (self.0)(arg);
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Element(Element),
    Callback(Callback),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => a.ptr_eq(b),
            (Self::Callback(a), Self::Callback(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Value {
    /// Name of the variant, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Element(_) => "element",
            Self::Callback(_) => "callback",
        }
    }

    /// Textual form used by attribute-like backends.
    ///
    /// `None` for values with no textual form (elements, callbacks, null).
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null | Self::Element(_) | Self::Callback(_) => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(format_float(*f)),
            Self::Str(s) => Some(s.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Self::Callback(c) => Some(c),
            _ => None,
        }
    }

    /// Convert to the element a dynamic marker renders.
    pub fn coerce(&self) -> error::Result<Element> {
        match self {
            Self::Element(el) => Ok(el.clone()),
            Self::Str(s) => Ok(text(Rc::clone(s))),
            Self::Int(i) => Ok(text(i.to_string())),
            Self::Float(f) => Ok(text(format_float(*f))),
            Self::Null | Self::Bool(_) => Ok(text("")),
            Self::Callback(_) => Err(RenderError::InvalidSignalValue {
                kind: self.kind_name(),
            }),
        }
    }
}

/// Integral floats print without a fractional part.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Self::Int(i64::from(i))
            }
        })*
    };
}

int_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Self::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<Element> for Value {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Self::Callback(cb)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
