//! Entity identity: composite keys and key extraction.

use crate::entity::EntityNode;
use crate::error::{ModelError, ModelResult};
use crate::value::ScalarValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The logical identity of a persisted entity.
///
/// An `EntityKey` is an ordered tuple of scalar components. Single surrogate
/// keys have one component; composite keys have one component per declared
/// key field, in declaration order. Equality and hashing operate on the tuple
/// as a unit, so two nodes are identity-equal iff their keys are
/// component-wise equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey(Vec<ScalarValue>);

impl EntityKey {
    /// Creates a key from its components.
    pub fn new(components: Vec<ScalarValue>) -> Self {
        Self(components)
    }

    /// Creates a single-component key.
    pub fn single(component: impl Into<ScalarValue>) -> Self {
        Self(vec![component.into()])
    }

    /// Returns the key components in declaration order.
    pub fn components(&self) -> &[ScalarValue] {
        &self.0
    }

    /// Returns the number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a key with no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{component}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<ScalarValue>> for EntityKey {
    fn from(components: Vec<ScalarValue>) -> Self {
        Self(components)
    }
}

/// Result of extracting a key from a detached node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyState {
    /// Every key component is missing, null, or the type sentinel: the node
    /// has never been persisted and reconciles as an insert.
    Transient,
    /// Every key component is present and non-sentinel.
    Persisted(EntityKey),
}

impl KeyState {
    /// Returns the persisted key, if any.
    pub fn persisted(&self) -> Option<&EntityKey> {
        match self {
            KeyState::Persisted(key) => Some(key),
            KeyState::Transient => None,
        }
    }

    /// True for a transient (never persisted) node.
    pub fn is_transient(&self) -> bool {
        matches!(self, KeyState::Transient)
    }
}

/// Declares how one entity type is identified.
///
/// A `KeySpec` names the entity type and its key fields, in order. The order
/// is significant: it fixes the component order of every extracted
/// [`EntityKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    entity_type: String,
    key_fields: Vec<String>,
}

impl KeySpec {
    /// Creates a key spec for an entity type.
    pub fn new<I, S>(entity_type: impl Into<String>, key_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_type: entity_type.into(),
            key_fields: key_fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the key field names in declaration order.
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// True when the given field participates in the key.
    pub fn is_key_field(&self, field: &str) -> bool {
        self.key_fields.iter().any(|f| f == field)
    }

    /// Extracts the identity of a detached node.
    ///
    /// Classification per component: a component is *unset* when the field is
    /// absent, null, or holds its type sentinel. All components unset means
    /// the node is [`KeyState::Transient`]. All components set yields
    /// [`KeyState::Persisted`]. A mixture is an error: the node is neither
    /// cleanly new nor addressable, so reconciling it would guess.
    pub fn extract(&self, node: &EntityNode) -> ModelResult<KeyState> {
        let mut components = Vec::with_capacity(self.key_fields.len());
        let mut unset_field = None;

        for field in &self.key_fields {
            match node.field(field) {
                Some(value) if !value.is_sentinel() => components.push(value.clone()),
                _ => {
                    if unset_field.is_none() {
                        unset_field = Some(field.clone());
                    }
                }
            }
        }

        match (components.is_empty(), unset_field) {
            (true, _) => Ok(KeyState::Transient),
            (false, None) => Ok(KeyState::Persisted(EntityKey::new(components))),
            (false, Some(field)) => Err(ModelError::missing_key(&self.entity_type, field)),
        }
    }

    /// Extracts the identity of a node that must already be persisted.
    ///
    /// Baseline nodes always have persisted keys; a transient one indicates a
    /// malformed baseline and reports the first key field as missing.
    pub fn extract_persisted(&self, node: &EntityNode) -> ModelResult<EntityKey> {
        match self.extract(node)? {
            KeyState::Persisted(key) => Ok(key),
            KeyState::Transient => {
                let field = self.key_fields.first().cloned().unwrap_or_default();
                Err(ModelError::missing_key(&self.entity_type, field))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_spec() -> KeySpec {
        KeySpec::new("Manager", ["part_key", "part_key2"])
    }

    #[test]
    fn single_key_extraction() {
        let spec = KeySpec::new("Company", ["id"]);
        let node = EntityNode::new("Company").with_field("id", 2i64);

        let state = spec.extract(&node).unwrap();
        assert_eq!(state.persisted(), Some(&EntityKey::single(2i64)));
    }

    #[test]
    fn composite_key_extraction() {
        let node = EntityNode::new("Manager")
            .with_field("part_key", "manager1")
            .with_field("part_key2", 1i64);

        let key = manager_spec().extract_persisted(&node).unwrap();
        assert_eq!(
            key.components(),
            &[ScalarValue::Text("manager1".into()), ScalarValue::Integer(1)]
        );
    }

    #[test]
    fn composite_keys_compare_as_a_unit() {
        let a = EntityKey::new(vec!["manager1".into(), 1i64.into()]);
        let b = EntityKey::new(vec!["manager1".into(), 2i64.into()]);
        let c = EntityKey::new(vec!["manager1".into(), 1i64.into()]);

        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn sentinel_key_is_transient() {
        let spec = KeySpec::new("Company", ["id"]);

        let zeroed = EntityNode::new("Company").with_field("id", 0i64);
        assert!(spec.extract(&zeroed).unwrap().is_transient());

        let absent = EntityNode::new("Company");
        assert!(spec.extract(&absent).unwrap().is_transient());

        let null = EntityNode::new("Company").with_field("id", ());
        assert!(spec.extract(&null).unwrap().is_transient());
    }

    #[test]
    fn fully_unset_composite_key_is_transient() {
        let node = EntityNode::new("Manager")
            .with_field("part_key", "")
            .with_field("part_key2", 0i64);

        assert!(manager_spec().extract(&node).unwrap().is_transient());
    }

    #[test]
    fn partially_set_composite_key_is_an_error() {
        let node = EntityNode::new("Manager").with_field("part_key", "manager1");

        let err = manager_spec().extract(&node).unwrap_err();
        assert!(matches!(
            err,
            ModelError::MissingKey { ref field, .. } if field == "part_key2"
        ));
    }

    #[test]
    fn is_key_field() {
        let spec = manager_spec();
        assert!(spec.is_key_field("part_key"));
        assert!(spec.is_key_field("part_key2"));
        assert!(!spec.is_key_field("first_name"));
    }

    #[test]
    fn key_display() {
        let key = EntityKey::new(vec!["manager1".into(), 1i64.into()]);
        assert_eq!(format!("{key}"), "(\"manager1\", 1)");
    }
}
