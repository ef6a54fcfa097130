//! Mutation application.
//!
//! Executes a staged [`MutationPlan`] against a store's unit of work, in plan
//! order. The plan's order already encodes referential dependencies: parents
//! are inserted before their new children and owned children are deleted
//! before their former owners, so application is a straight dispatch loop.
//!
//! The applier never commits. It stages everything against the caller's unit
//! of work and returns; the caller performs the commit, which keeps the whole
//! reconciliation atomic from the store's perspective. Store failures are
//! propagated verbatim, never retried.

use crate::error::StoreResult;
use crate::mutation::{Mutation, MutationPlan};
use crate::store::UnitOfWork;
use tracing::{debug, trace};

/// Stages every mutation of the plan against the unit of work, in order.
pub fn apply_mutations(plan: &MutationPlan, uow: &mut dyn UnitOfWork) -> StoreResult<()> {
    debug!(mutations = plan.len(), "applying mutation plan");

    for mutation in plan.iter() {
        match mutation {
            Mutation::Insert(record) => {
                trace!(entity_type = record.entity_type.as_str(), id = %record.id, "stage insert");
                uow.stage_insert(record)?;
            }
            Mutation::Update { target, changed } => {
                trace!(%target, fields = changed.len(), "stage update");
                uow.stage_update(target, changed)?;
            }
            Mutation::Delete { target } => {
                trace!(%target, "stage delete");
                uow.stage_delete(target)?;
            }
            Mutation::Link {
                relation,
                parent,
                child,
            } => {
                trace!(relation = relation.as_str(), %parent, %child, "stage link");
                uow.stage_link(relation, parent, child)?;
            }
            Mutation::Unlink {
                relation,
                parent,
                child,
            } => {
                trace!(relation = relation.as_str(), %parent, %child, "stage unlink");
                uow.stage_unlink(relation, parent, child)?;
            }
        }
    }

    Ok(())
}
