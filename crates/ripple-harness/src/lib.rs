#![forbid(unsafe_code)]

//! Test harness for ripple.
//!
//! - [`spy`]: [`Spy`], a recording wrapper for any backend, with JSONL
//!   export of the mutation log.
//! - [`fixtures`]: mount helpers for the document and terminal backends plus
//!   reference components, including test-controlled async and streaming
//!   ones.
//! - [`strategies`]: proptest generators for keyed lists and values.

pub mod fixtures;
pub mod spy;
pub mod strategies;

pub use fixtures::{
    Deferred, DomFixture, Ticker, TtyFixture, counter, deferred, failing, keyed_item, keyed_list,
    keyed_list_html, list_view, panicking, ticker,
};
pub use spy::{Mutation, Spy};
