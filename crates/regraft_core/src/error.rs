//! Error types for reconciliation.

use regraft_model::{EntityKey, ModelError};
use thiserror::Error;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Result type for store collaborator operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reconciling a detached graph.
///
/// Every variant is fatal: the plan under construction is discarded and no
/// mutation reaches the store.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A node's declared key could not be extracted.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// An owned single relationship's detached child key differs from the
    /// baseline child key. Owned single relationships assume one persisted
    /// counterpart at a time; re-parenting is a caller configuration error,
    /// not something to guess about.
    #[error("owned single relation `{relation}` cannot be re-pointed: baseline child is {expected}, detached child is {actual}")]
    MappingMismatch {
        /// The relation name.
        relation: String,
        /// Key of the persisted child.
        expected: EntityKey,
        /// Key of the detached child, rendered as text ("transient" when the
        /// detached child has no key yet).
        actual: String,
    },

    /// No baseline exists for a non-transient root: there is nothing to
    /// reconcile against.
    #[error("no persisted baseline for root entity `{entity_type}` with key {key}")]
    RootNotFound {
        /// The root entity type.
        entity_type: String,
        /// The root key that was looked up.
        key: EntityKey,
    },

    /// An associated relationship references a transient node. Association
    /// never manages the target's lifecycle, so there is no key to link to.
    #[error("associated relation `{relation}` on `{entity_type}` references a transient entity")]
    UnkeyedAssociation {
        /// The entity type carrying the relation.
        entity_type: String,
        /// The relation name.
        relation: String,
    },

    /// Store collaborator failure, propagated verbatim.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Creates a mapping mismatch error for a persisted detached child.
    pub fn mapping_mismatch(
        relation: impl Into<String>,
        expected: EntityKey,
        actual: &EntityKey,
    ) -> Self {
        Self::MappingMismatch {
            relation: relation.into(),
            expected,
            actual: actual.to_string(),
        }
    }

    /// Creates a mapping mismatch error for a transient detached child.
    pub fn mapping_mismatch_transient(relation: impl Into<String>, expected: EntityKey) -> Self {
        Self::MappingMismatch {
            relation: relation.into(),
            expected,
            actual: "transient".to_string(),
        }
    }

    /// Creates an unkeyed association error.
    pub fn unkeyed_association(
        entity_type: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self::UnkeyedAssociation {
            entity_type: entity_type.into(),
            relation: relation.into(),
        }
    }
}

/// Errors surfaced by a store collaborator.
///
/// The reconciler never retries these; transient failures are the
/// collaborator's concern and the caller owns transaction rollback.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced row does not exist.
    #[error("entity not found in store")]
    NotFound,

    /// A staged mutation violates a store constraint.
    #[error("constraint violation: {message}")]
    ConstraintViolation {
        /// Description of the violated constraint.
        message: String,
    },

    /// Another writer touched the same rows.
    #[error("concurrency conflict: {message}")]
    ConcurrencyConflict {
        /// Description of the conflict.
        message: String,
    },

    /// Backend-specific failure.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a constraint violation error.
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Creates a concurrency conflict error.
    pub fn concurrency_conflict(message: impl Into<String>) -> Self {
        Self::ConcurrencyConflict {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
