//! Store collaborator traits.
//!
//! The persistent store is external to the reconciler. The core consumes
//! exactly two seams: a read side that loads the baseline subgraph for a root
//! key, and a write side that accepts staged mutations inside one
//! caller-owned unit of work. Everything else about the store (transactions,
//! constraint enforcement, timeouts) stays on the collaborator's side.

use crate::error::StoreResult;
use crate::mapping::MappingNode;
use crate::mutation::{EntityRef, InsertRecord, NodeRef};
use regraft_model::{EntityKey, EntityNode, ScalarValue};
use std::collections::BTreeMap;

/// Read side of the store: fetches the persisted comparison baseline.
pub trait BaselineSource {
    /// Loads the persisted subgraph for the given root key, shaped exactly
    /// like the mapping tree: declared relationships populated, undeclared
    /// ones absent.
    ///
    /// Returns `Ok(None)` when no row exists for the key.
    fn load_baseline(
        &self,
        key: &EntityKey,
        mapping: &MappingNode,
    ) -> StoreResult<Option<EntityNode>>;
}

/// Write side of the store: one unit of work.
///
/// Mutations are staged, not applied; nothing becomes visible to other
/// readers until [`commit`](UnitOfWork::commit). The reconciliation call that
/// stages mutations never commits itself — the caller does, so the whole
/// reconciliation is atomic from the store's perspective. A dropped unit of
/// work discards its staged mutations.
pub trait UnitOfWork {
    /// Stages a row insert. When `record.key` is `None` the store assigns a
    /// key and must remember it under `record.id` so later mutations in the
    /// same plan can refer to the new row via [`NodeRef::Inserted`].
    fn stage_insert(&mut self, record: &InsertRecord) -> StoreResult<()>;

    /// Stages a field update on an existing row.
    fn stage_update(
        &mut self,
        target: &EntityRef,
        changed: &BTreeMap<String, ScalarValue>,
    ) -> StoreResult<()>;

    /// Stages a row delete.
    fn stage_delete(&mut self, target: &EntityRef) -> StoreResult<()>;

    /// Stages a link-row insert for an associated relationship.
    fn stage_link(&mut self, relation: &str, parent: &NodeRef, child: &EntityRef)
        -> StoreResult<()>;

    /// Stages a link-row delete for an associated relationship.
    fn stage_unlink(
        &mut self,
        relation: &str,
        parent: &EntityRef,
        child: &EntityRef,
    ) -> StoreResult<()>;

    /// Atomically applies everything staged so far.
    fn commit(&mut self) -> StoreResult<()>;
}
