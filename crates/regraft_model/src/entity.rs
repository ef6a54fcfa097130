//! Detached entity graph nodes.

use crate::value::ScalarValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The value of a named relationship on an entity node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// A reference to at most one related entity.
    Single(Option<Box<EntityNode>>),
    /// A set of related entities. Order carries no identity meaning.
    Collection(Vec<EntityNode>),
}

/// A detached entity instance.
///
/// An `EntityNode` holds an entity type name, a map of scalar fields, and a
/// map of named relationships to other nodes. Graphs are plain owned values
/// with no connection to any store; a reference cycle in the logical graph
/// appears as a repeated key, not a repeated allocation.
///
/// # Example
///
/// ```
/// use regraft_model::{EntityNode, ScalarValue};
///
/// let contact = EntityNode::new("CompanyContact")
///     .with_field("id", 1i64)
///     .with_field("first_name", "Bob")
///     .with_field("last_name", "Brown");
///
/// let company = EntityNode::new("Company")
///     .with_field("id", 2i64)
///     .with_field("name", "Company 1")
///     .with_collection("contacts", vec![contact]);
///
/// assert_eq!(company.field("name"), Some(&ScalarValue::Text("Company 1".into())));
/// assert_eq!(company.collection("contacts").len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityNode {
    entity_type: String,
    fields: BTreeMap<String, ScalarValue>,
    relations: BTreeMap<String, Relation>,
}

impl EntityNode {
    /// Creates an empty node of the given entity type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Returns the entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Sets a scalar field, replacing any previous value.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`set_field`](Self::set_field).
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Sets a single-valued relationship.
    pub fn set_single(&mut self, name: impl Into<String>, child: Option<EntityNode>) {
        self.relations
            .insert(name.into(), Relation::Single(child.map(Box::new)));
    }

    /// Builder-style variant of [`set_single`](Self::set_single).
    #[must_use]
    pub fn with_single(mut self, name: impl Into<String>, child: Option<EntityNode>) -> Self {
        self.set_single(name, child);
        self
    }

    /// Sets a collection relationship.
    pub fn set_collection(&mut self, name: impl Into<String>, children: Vec<EntityNode>) {
        self.relations
            .insert(name.into(), Relation::Collection(children));
    }

    /// Builder-style variant of [`set_collection`](Self::set_collection).
    #[must_use]
    pub fn with_collection(mut self, name: impl Into<String>, children: Vec<EntityNode>) -> Self {
        self.set_collection(name, children);
        self
    }

    /// Looks up a scalar field.
    pub fn field(&self, name: &str) -> Option<&ScalarValue> {
        self.fields.get(name)
    }

    /// Iterates over all scalar fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns a clone of the scalar field map.
    pub fn fields_cloned(&self) -> BTreeMap<String, ScalarValue> {
        self.fields.clone()
    }

    /// Looks up a raw relationship value.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Returns the referenced node of a single-valued relationship.
    ///
    /// `None` when the relationship is absent, explicitly empty, or declared
    /// as a collection.
    pub fn single(&self, name: &str) -> Option<&EntityNode> {
        match self.relations.get(name) {
            Some(Relation::Single(child)) => child.as_deref(),
            _ => None,
        }
    }

    /// Returns the members of a collection relationship.
    ///
    /// An absent relationship yields an empty slice; callers that need to
    /// distinguish "absent" from "empty" use [`relation`](Self::relation).
    pub fn collection(&self, name: &str) -> &[EntityNode] {
        match self.relations.get(name) {
            Some(Relation::Collection(children)) => children,
            _ => &[],
        }
    }

    /// Mutable access to the referenced node of a single-valued relationship.
    pub fn single_mut(&mut self, name: &str) -> Option<&mut EntityNode> {
        match self.relations.get_mut(name) {
            Some(Relation::Single(child)) => child.as_deref_mut(),
            _ => None,
        }
    }

    /// Mutable access to the members of a collection relationship.
    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Vec<EntityNode>> {
        match self.relations.get_mut(name) {
            Some(Relation::Collection(children)) => Some(children),
            _ => None,
        }
    }

    /// True when the named relationship was populated on this node.
    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Returns a copy of this node with all relationships stripped.
    ///
    /// Handy for building reference nodes: an associated relationship only
    /// needs the target's key fields, never its own graph.
    pub fn scalar_only(&self) -> EntityNode {
        EntityNode {
            entity_type: self.entity_type.clone(),
            fields: self.fields.clone(),
            relations: BTreeMap::new(),
        }
    }
}
