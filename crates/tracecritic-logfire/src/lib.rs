//! # tracecritic-logfire
//!
//! Read-only access to agent traces stored in Logfire.
//!
//! - [`TraceBackend`] - Query capability consumed by the pipeline
//! - [`LogfireClient`] - HTTP implementation
//! - [`LookbackAge`] - Validated query window (1 minute to 7 days)

mod age;
mod client;
mod error;
mod schema;

pub use age::{validate_age, LookbackAge, MAX_AGE_MINUTES};
pub use client::{trace_query, LogfireClient, TraceBackend, DEFAULT_BASE_URL};
pub use error::QueryError;
pub use schema::{build_schema_description, SchemaRow};
