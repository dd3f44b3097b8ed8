//! SQLite storage layer.
//!
//! Local document container backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod container;
pub mod pool;
