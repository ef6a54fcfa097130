//! Staged mutation records.
//!
//! A reconciliation call produces an ordered [`MutationPlan`]; the plan's
//! order is semantically meaningful (parents are inserted before their new
//! children, owned children are deleted before their former owners). Plans
//! are exclusively owned by the call that produced them and are never shared
//! across calls.

use regraft_model::{EntityKey, ScalarValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reference to a persisted entity: its type and logical key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// The entity type name.
    pub entity_type: String,
    /// The logical key.
    pub key: EntityKey,
}

impl EntityRef {
    /// Creates an entity reference.
    pub fn new(entity_type: impl Into<String>, key: EntityKey) -> Self {
        Self {
            entity_type: entity_type.into(),
            key,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.entity_type, self.key)
    }
}

/// Plan-local identifier of a staged insert.
///
/// Assigned sequentially in staging order, so a store resolving an
/// [`InsertId`] has always already seen the insert it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InsertId(pub u32);

impl InsertId {
    /// Returns the raw index value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InsertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ins:{}", self.0)
    }
}

/// Reference to a graph node a mutation hangs off: either an entity already
/// persisted, or one inserted earlier in the same plan.
///
/// The second form makes key fixup explicit: a store that generates keys
/// during staging resolves `Inserted` through its own assignments instead of
/// relying on implicit change-tracker wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRef {
    /// An entity with a persisted key.
    Existing(EntityRef),
    /// An entity staged for insert earlier in this plan.
    Inserted(InsertId),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Existing(entity) => write!(f, "{entity}"),
            NodeRef::Inserted(id) => write!(f, "{id}"),
        }
    }
}

/// Parent linkage of a staged insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    /// The relationship the new row belongs to.
    pub relation: String,
    /// The owning node.
    pub parent: NodeRef,
}

/// A row to insert: scalar fields plus graph position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertRecord {
    /// Plan-local identifier, referenced by later mutations in the same plan.
    pub id: InsertId,
    /// The entity type name.
    pub entity_type: String,
    /// The declared key field names, in component order. Lets a store check
    /// key arity and synthesize key columns when it assigns the key itself.
    pub key_fields: Vec<String>,
    /// Key of the row when the detached node already carried one; `None` for
    /// transient nodes, whose key the store assigns.
    pub key: Option<EntityKey>,
    /// The row's scalar fields.
    pub fields: BTreeMap<String, ScalarValue>,
    /// Owning parent, absent for the root of an inserted subtree.
    pub parent: Option<ParentLink>,
}

/// One staged store mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert a new row.
    Insert(InsertRecord),
    /// Update the changed scalar fields of an existing row. Key fields never
    /// appear in the change set.
    Update {
        /// The row to update.
        target: EntityRef,
        /// Changed fields with their new values.
        changed: BTreeMap<String, ScalarValue>,
    },
    /// Delete an existing row.
    Delete {
        /// The row to delete.
        target: EntityRef,
    },
    /// Insert a link row for an associated relationship.
    Link {
        /// The relationship name.
        relation: String,
        /// The linking side.
        parent: NodeRef,
        /// The linked entity; always persisted, association never inserts.
        child: EntityRef,
    },
    /// Delete a link row for an associated relationship.
    Unlink {
        /// The relationship name.
        relation: String,
        /// The linking side.
        parent: EntityRef,
        /// The entity being unlinked. It survives: unlinking never cascades.
        child: EntityRef,
    },
}

/// The ordered mutation list produced by one reconciliation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationPlan {
    mutations: Vec<Mutation>,
    insert_count: u32,
}

impl MutationPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next insert identifier.
    pub(crate) fn next_insert_id(&mut self) -> InsertId {
        let id = InsertId(self.insert_count);
        self.insert_count += 1;
        id
    }

    /// Appends a mutation.
    pub(crate) fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// True when reconciliation found nothing to change.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Number of staged mutations.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Iterates over mutations in staging order.
    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    /// Staged inserts, in staging order.
    pub fn inserts(&self) -> impl Iterator<Item = &InsertRecord> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Insert(record) => Some(record),
            _ => None,
        })
    }

    /// Staged updates as `(target, changed)` pairs, in staging order.
    pub fn updates(&self) -> impl Iterator<Item = (&EntityRef, &BTreeMap<String, ScalarValue>)> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Update { target, changed } => Some((target, changed)),
            _ => None,
        })
    }

    /// Staged delete targets, in staging order.
    pub fn deletes(&self) -> impl Iterator<Item = &EntityRef> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Delete { target } => Some(target),
            _ => None,
        })
    }

    /// Staged links as `(relation, parent, child)`, in staging order.
    pub fn links(&self) -> impl Iterator<Item = (&str, &NodeRef, &EntityRef)> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Link {
                relation,
                parent,
                child,
            } => Some((relation.as_str(), parent, child)),
            _ => None,
        })
    }

    /// Staged unlinks as `(relation, parent, child)`, in staging order.
    pub fn unlinks(&self) -> impl Iterator<Item = (&str, &EntityRef, &EntityRef)> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Unlink {
                relation,
                parent,
                child,
            } => Some((relation.as_str(), parent, child)),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a MutationPlan {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}
