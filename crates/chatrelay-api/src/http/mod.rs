//! HTTP layer for chatrelay.
//!
//! One chat trigger route plus a health probe, with CORS and request
//! tracing middleware.

pub mod error;
pub mod handlers;
pub mod router;
