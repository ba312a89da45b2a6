//! Adapters that live inside the domain crate for convenience.
//!
//! The in-memory repository backs unit tests and local runs without a
//! database. Real adapters (PostgreSQL, MongoDB) live in separate crates.

pub mod memory_repo;
