//! # tracecritic-trace
//!
//! Data model and structural handling of agent execution traces.
//!
//! ## Key Types
//!
//! - [`Interaction`] - One conversational turn
//! - [`Trace`] - Ordered interactions of one run
//! - [`Span`] - A target assistant turn plus its preceding context
//! - [`SpanRecord`] - Stored record, normalized or backend-native
//! - [`TraceStore`] - Keyed JSON file storage

mod error;
mod extract;
mod format;
mod raw;
mod store;
mod types;

pub use error::TraceError;
pub use extract::{extract, Span, Trace};
pub use format::{format_interaction, format_many};
pub use raw::normalize_payload;
pub use store::{TraceStore, DEFAULT_DATA_DIR};
pub use types::{Interaction, Payload, Role, SpanRecord, ToolCall};
