//! Span records and the trace forests built from them.
//!
//! # Module Organization
//!
//! - [`models`]: [`SpanRecord`] and its extraction from the heap
//! - [`forest`]: grouping by trace id and parent/child linking

pub mod forest;
pub mod models;

pub use forest::{build_traces, ForestEntry, Trace};
pub use models::{extract_spans, SpanRecord};
