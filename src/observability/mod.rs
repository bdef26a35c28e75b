//! Observability infrastructure.
//!
//! Provides structured tracing with a text or JSON formatter.

pub mod tracing;
