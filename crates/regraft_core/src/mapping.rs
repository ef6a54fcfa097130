//! Declarative relationship mapping.
//!
//! A mapping tree states, for each relationship reachable from the root
//! entity type, whether the related entities are *owned* (their whole
//! lifecycle follows collection membership) or merely *associated* (only the
//! link is managed), and whether the relationship holds one entity or many.
//! A relationship with no mapping entry is never traversed or mutated:
//! absence is the explicit "leave entirely alone" signal, distinct from an
//! empty owned collection, which means "delete the baseline children".

use regraft_model::KeySpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ownership kind and cardinality of a mapped relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    /// One owned child: insert, update, and delete follow the reference.
    OwnedSingle,
    /// Many owned children: lifecycle follows key membership.
    OwnedCollection,
    /// One associated entity: only the link is managed.
    AssociatedSingle,
    /// Many associated entities: only link membership is managed.
    AssociatedCollection,
}

impl RelationKind {
    /// True for owned relationships.
    pub fn is_owned(self) -> bool {
        matches!(self, RelationKind::OwnedSingle | RelationKind::OwnedCollection)
    }

    /// True for collection relationships.
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            RelationKind::OwnedCollection | RelationKind::AssociatedCollection
        )
    }
}

/// One mapped relationship: its kind and the mapping of the target type.
///
/// Associated targets are always leaves (a key spec with no nested
/// relations): association never traverses into the target's own graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMapping {
    kind: RelationKind,
    target: MappingNode,
}

impl RelationMapping {
    /// Returns the relationship kind.
    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Returns the mapping of the target entity type.
    pub fn target(&self) -> &MappingNode {
        &self.target
    }
}

/// A node of the mapping tree: one entity type's key spec and its declared
/// relationships.
///
/// Built once per reconciliation call via [`MappingBuilder`], read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingNode {
    key: KeySpec,
    relations: BTreeMap<String, RelationMapping>,
}

impl MappingNode {
    /// Creates a leaf mapping (key spec only, no relationships).
    pub fn leaf(key: KeySpec) -> Self {
        Self {
            key,
            relations: BTreeMap::new(),
        }
    }

    /// Returns the key spec of this node's entity type.
    pub fn key(&self) -> &KeySpec {
        &self.key
    }

    /// Returns the entity type this node maps.
    pub fn entity_type(&self) -> &str {
        self.key.entity_type()
    }

    /// Looks up a declared relationship.
    pub fn relation(&self, name: &str) -> Option<&RelationMapping> {
        self.relations.get(name)
    }

    /// Iterates over declared relationships in name order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationMapping)> {
        self.relations.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Builder for [`MappingNode`] trees.
///
/// Pure sugar over constructing the immutable tree; building has no side
/// effects on any store.
///
/// # Example
///
/// ```
/// use regraft_core::MappingBuilder;
/// use regraft_model::KeySpec;
///
/// let mapping = MappingBuilder::new("Company", ["id"])
///     .owned_collection(
///         "contacts",
///         MappingBuilder::new("CompanyContact", ["id"])
///             .owned_collection("infos", MappingBuilder::new("ContactInfo", ["id"])),
///     )
///     .associated_collection("stakeholders", KeySpec::new("Company", ["id"]))
///     .build();
///
/// assert!(mapping.relation("contacts").is_some());
/// assert!(mapping.relation("undeclared").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct MappingBuilder {
    node: MappingNode,
}

impl MappingBuilder {
    /// Starts a mapping for an entity type with the given key fields.
    pub fn new<I, S>(entity_type: impl Into<String>, key_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node: MappingNode::leaf(KeySpec::new(entity_type, key_fields)),
        }
    }

    /// Declares an owned single relationship with the child type's mapping.
    #[must_use]
    pub fn owned_single(self, name: impl Into<String>, target: MappingBuilder) -> Self {
        self.relation(name, RelationKind::OwnedSingle, target.build())
    }

    /// Declares an owned collection relationship with the child type's
    /// mapping.
    #[must_use]
    pub fn owned_collection(self, name: impl Into<String>, target: MappingBuilder) -> Self {
        self.relation(name, RelationKind::OwnedCollection, target.build())
    }

    /// Declares an associated single relationship.
    ///
    /// Only the target's key spec is needed: the reconciler never touches an
    /// associated entity's own fields or relationships.
    #[must_use]
    pub fn associated_single(self, name: impl Into<String>, target: KeySpec) -> Self {
        self.relation(name, RelationKind::AssociatedSingle, MappingNode::leaf(target))
    }

    /// Declares an associated collection relationship.
    #[must_use]
    pub fn associated_collection(self, name: impl Into<String>, target: KeySpec) -> Self {
        self.relation(
            name,
            RelationKind::AssociatedCollection,
            MappingNode::leaf(target),
        )
    }

    /// Finishes the tree.
    pub fn build(self) -> MappingNode {
        self.node
    }

    fn relation(mut self, name: impl Into<String>, kind: RelationKind, target: MappingNode) -> Self {
        self.node
            .relations
            .insert(name.into(), RelationMapping { kind, target });
        self
    }
}
