//! # Regraft Core
//!
//! Detached graph reconciliation engine.
//!
//! This crate provides:
//! - Mapping trees declaring per-relationship ownership and cardinality
//! - The graph reconciler (detached vs. baseline diff by logical key)
//! - Staged mutation records and plans
//! - The mutation applier and the store collaborator traits
//!
//! ## Architecture
//!
//! A caller supplies a detached root entity and a mapping tree. The
//! reconciler loads the persisted baseline through a [`BaselineSource`],
//! walks both graphs in lock-step, and produces an ordered [`MutationPlan`].
//! [`apply_mutations`] stages the plan against a caller-owned [`UnitOfWork`];
//! the caller commits.
//!
//! ## Key Invariants
//!
//! - Identity is by logical key, never by instance
//! - A relationship absent from the mapping tree is never touched
//! - Associated entities are linked and unlinked, never mutated or deleted
//! - Inserts run parent-before-child, deletes child-before-parent
//! - Each distinct key is processed at most once per call
//! - A failed call stages nothing

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod error;
mod mapping;
mod mutation;
mod reconcile;
mod store;

pub use applier::apply_mutations;
pub use error::{ReconcileError, ReconcileResult, StoreError, StoreResult};
pub use mapping::{MappingBuilder, MappingNode, RelationKind, RelationMapping};
pub use mutation::{
    EntityRef, InsertId, InsertRecord, Mutation, MutationPlan, NodeRef, ParentLink,
};
pub use reconcile::Reconciler;
pub use store::{BaselineSource, UnitOfWork};
