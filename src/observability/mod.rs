//! Observability subsystem.
//!
//! Structured logging only. Each forwarded request runs inside a span that
//! carries a generated request id; the id is never sent upstream.

pub mod logging;
