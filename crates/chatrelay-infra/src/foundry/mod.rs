//! Hosted agent runtime adapter.
//!
//! Client-credentials authentication against Entra ID plus the thread, message
//! and run endpoints of an AI project.

pub mod auth;
pub mod runtime;

pub use runtime::FoundryRuntime;
