//! Adapters that live inside the domain crate for convenience.
//!
//! The in-memory store backs unit tests, local demos and the reference run of
//! the contract suite. Real backends (SQLite) live in separate crates.

pub mod memory_repo;
