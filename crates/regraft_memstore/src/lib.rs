//! # Regraft Memstore
//!
//! In-memory reference store for Regraft.
//!
//! This crate provides:
//! - `MemoryStore`: entity rows, owned-children index, and link rows behind
//!   a shared lock
//! - `MemoryUnitOfWork`: buffered staging with atomic commit and surrogate
//!   key assignment for transient inserts
//! - `BaselineSource` and `UnitOfWork` implementations, making it a drop-in
//!   collaborator for the reconciler in tests and examples

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod memory;

pub use memory::{MemoryStore, MemoryUnitOfWork};
