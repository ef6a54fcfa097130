//! # Regraft Model
//!
//! Detached entity graph model for Regraft.
//!
//! This crate provides:
//! - `ScalarValue` for dynamic scalar fields
//! - `EntityNode` / `Relation` for detached entity graphs
//! - `EntityKey` / `KeySpec` for single and composite identity
//! - Transient-entity classification via type sentinels
//!
//! A detached graph is an entity and its related entities held in memory
//! with no connection to any store. Identity within one reconciliation call
//! is always by logical key, never by reference: the graph is a plain owned
//! value, so a logical cycle shows up as a repeated key.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod key;
mod value;

pub use entity::{EntityNode, Relation};
pub use error::{ModelError, ModelResult};
pub use key::{EntityKey, KeySpec, KeyState};
pub use value::ScalarValue;
