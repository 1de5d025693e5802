//! HTTP middleware shared by every service router.

pub mod metrics;
pub mod security_headers;
pub mod tracing;
