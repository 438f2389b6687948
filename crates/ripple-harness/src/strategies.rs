#![forbid(unsafe_code)]

//! Proptest generators for descriptor-level inputs.

use proptest::prelude::*;
use ripple_render::Value;

/// Distinct keys from `0..max`, in arbitrary order, at most `len` of them.
pub fn unique_keys(max: i64, len: usize) -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::hash_set(0..max, 0..=len)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// A sequence of keyed list states to step through.
pub fn keyed_steps(steps: usize) -> impl Strategy<Value = Vec<Vec<i64>>> {
    proptest::collection::vec(unique_keys(16, 10), 1..=steps)
}

/// Values a dynamic marker can render as text.
pub fn text_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
    ]
}

/// Values with and without an element form.
pub fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => text_value(),
        1 => Just(Value::Null),
    ]
}
