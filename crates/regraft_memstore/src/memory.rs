//! In-memory entity store.

use parking_lot::RwLock;
use regraft_core::{
    BaselineSource, EntityRef, InsertId, InsertRecord, MappingNode, NodeRef, RelationKind,
    StoreError, StoreResult, UnitOfWork,
};
use regraft_model::{EntityKey, EntityNode, ScalarValue};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::trace;

type Row = BTreeMap<String, ScalarValue>;

/// Shared store contents.
#[derive(Debug, Default, Clone)]
struct StoreState {
    /// Entity rows by `(type, key)`.
    rows: HashMap<EntityRef, Row>,
    /// Owned children per `(parent, relation)`, in attach order.
    children: HashMap<(EntityRef, String), Vec<EntityRef>>,
    /// Link rows for associated relationships.
    links: BTreeSet<(String, EntityRef, EntityRef)>,
    /// Next surrogate key per entity type.
    next_surrogate: HashMap<String, i64>,
}

/// An in-memory entity store.
///
/// Stores entity rows, an owned-children index, and associated link rows.
/// Suitable for unit tests, integration tests, and as the reference
/// semantics for store implementors: it implements both collaborator seams,
/// [`BaselineSource`] for loading comparison baselines and (through
/// [`begin`](Self::begin)) [`UnitOfWork`] for staged, atomic mutation.
///
/// # Thread Safety
///
/// Handles are cheap clones sharing one state behind a lock. Two units of
/// work against the same store are independent until commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row directly, bypassing any unit of work.
    ///
    /// Fixture setup only; reconciliation goes through [`begin`](Self::begin).
    pub fn put_row(&self, entity_type: impl Into<String>, key: EntityKey, fields: Row) {
        let target = EntityRef::new(entity_type, key);
        let mut state = self.state.write();
        state.bump_surrogate(&target);
        state.rows.insert(target, fields);
    }

    /// Registers an owned child under `(parent, relation)`.
    pub fn attach_child(&self, parent: &EntityRef, relation: impl Into<String>, child: EntityRef) {
        self.state
            .write()
            .children
            .entry((parent.clone(), relation.into()))
            .or_default()
            .push(child);
    }

    /// Inserts an associated link row.
    pub fn add_link(&self, relation: impl Into<String>, parent: EntityRef, child: EntityRef) {
        self.state.write().links.insert((relation.into(), parent, child));
    }

    /// Seeds a whole persisted graph from an entity node shaped like the
    /// mapping: rows and owned-children entries for owned relationships,
    /// link rows for associated ones.
    ///
    /// Every node must carry a persisted key; fixtures assign their own.
    pub fn seed_graph(&self, node: &EntityNode, mapping: &MappingNode) -> StoreResult<EntityRef> {
        let key = mapping
            .key()
            .extract_persisted(node)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let self_ref = EntityRef::new(mapping.entity_type(), key);
        self.put_row(
            mapping.entity_type(),
            self_ref.key.clone(),
            node.fields_cloned(),
        );

        for (name, relation) in mapping.relations() {
            match relation.kind() {
                RelationKind::OwnedSingle => {
                    if let Some(child) = node.single(name) {
                        let child_ref = self.seed_graph(child, relation.target())?;
                        self.attach_child(&self_ref, name, child_ref);
                    }
                }
                RelationKind::OwnedCollection => {
                    for child in node.collection(name) {
                        let child_ref = self.seed_graph(child, relation.target())?;
                        self.attach_child(&self_ref, name, child_ref);
                    }
                }
                RelationKind::AssociatedSingle | RelationKind::AssociatedCollection => {
                    let targets: Vec<&EntityNode> = match relation.kind() {
                        RelationKind::AssociatedSingle => node.single(name).into_iter().collect(),
                        _ => node.collection(name).iter().collect(),
                    };
                    for child in targets {
                        let child_key = relation
                            .target()
                            .key()
                            .extract_persisted(child)
                            .map_err(|e| StoreError::backend(e.to_string()))?;
                        self.add_link(
                            name,
                            self_ref.clone(),
                            EntityRef::new(relation.target().entity_type(), child_key),
                        );
                    }
                }
            }
        }

        Ok(self_ref)
    }

    /// Starts a unit of work against this store.
    #[must_use]
    pub fn begin(&self) -> MemoryUnitOfWork {
        MemoryUnitOfWork {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
            assigned: HashMap::new(),
        }
    }

    /// True when a row exists.
    pub fn contains(&self, target: &EntityRef) -> bool {
        self.state.read().rows.contains_key(target)
    }

    /// Returns a copy of a row's fields.
    pub fn row(&self, target: &EntityRef) -> Option<Row> {
        self.state.read().rows.get(target).cloned()
    }

    /// True when a link row exists.
    pub fn contains_link(&self, relation: &str, parent: &EntityRef, child: &EntityRef) -> bool {
        self.state
            .read()
            .links
            .contains(&(relation.to_string(), parent.clone(), child.clone()))
    }

    /// Linked children of `(relation, parent)`, in key order.
    pub fn linked_children(&self, relation: &str, parent: &EntityRef) -> Vec<EntityRef> {
        self.state
            .read()
            .links
            .iter()
            .filter(|(r, p, _)| r == relation && p == parent)
            .map(|(_, _, c)| c.clone())
            .collect()
    }

    /// Owned children of `(parent, relation)`, in attach order.
    pub fn owned_children(&self, parent: &EntityRef, relation: &str) -> Vec<EntityRef> {
        self.state
            .read()
            .children
            .get(&(parent.clone(), relation.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of rows of an entity type.
    pub fn count(&self, entity_type: &str) -> usize {
        self.state
            .read()
            .rows
            .keys()
            .filter(|r| r.entity_type == entity_type)
            .count()
    }

    fn build_node(
        state: &StoreState,
        target: &EntityRef,
        mapping: &MappingNode,
    ) -> Option<EntityNode> {
        let row = state.rows.get(target)?;
        let mut node = EntityNode::new(mapping.entity_type());
        for (name, value) in row {
            node.set_field(name.clone(), value.clone());
        }
        // Key fields come from the row key, which is authoritative.
        for (field, component) in mapping
            .key()
            .key_fields()
            .iter()
            .zip(target.key.components())
        {
            node.set_field(field.clone(), component.clone());
        }

        for (name, relation) in mapping.relations() {
            match relation.kind() {
                RelationKind::OwnedSingle | RelationKind::OwnedCollection => {
                    let refs = state
                        .children
                        .get(&(target.clone(), name.to_string()))
                        .cloned()
                        .unwrap_or_default();
                    let mut nodes = Vec::with_capacity(refs.len());
                    for child_ref in &refs {
                        if let Some(child) = Self::build_node(state, child_ref, relation.target()) {
                            nodes.push(child);
                        }
                    }
                    if relation.kind() == RelationKind::OwnedSingle {
                        node.set_single(name, nodes.into_iter().next());
                    } else {
                        node.set_collection(name, nodes);
                    }
                }
                RelationKind::AssociatedSingle | RelationKind::AssociatedCollection => {
                    let mut nodes = Vec::new();
                    for (r, p, child_ref) in &state.links {
                        if r == name && p == target {
                            let child = Self::build_node(state, child_ref, relation.target())
                                .unwrap_or_else(|| stub_node(child_ref, relation.target()));
                            nodes.push(child);
                        }
                    }
                    if relation.kind() == RelationKind::AssociatedSingle {
                        node.set_single(name, nodes.into_iter().next());
                    } else {
                        node.set_collection(name, nodes);
                    }
                }
            }
        }

        Some(node)
    }
}

/// Minimal node for a linked entity whose row is not stored: key fields only.
fn stub_node(target: &EntityRef, mapping: &MappingNode) -> EntityNode {
    let mut node = EntityNode::new(mapping.entity_type());
    for (field, component) in mapping
        .key()
        .key_fields()
        .iter()
        .zip(target.key.components())
    {
        node.set_field(field.clone(), component.clone());
    }
    node
}

impl BaselineSource for MemoryStore {
    fn load_baseline(
        &self,
        key: &EntityKey,
        mapping: &MappingNode,
    ) -> StoreResult<Option<EntityNode>> {
        let state = self.state.read();
        let target = EntityRef::new(mapping.entity_type(), key.clone());
        Ok(Self::build_node(&state, &target, mapping))
    }
}

impl StoreState {
    /// Keeps the surrogate counter ahead of externally assigned integer keys.
    fn bump_surrogate(&mut self, target: &EntityRef) {
        if let [ScalarValue::Integer(n)] = target.key.components() {
            let next = self.next_surrogate.entry(target.entity_type.clone()).or_insert(1);
            if *next <= *n {
                *next = *n + 1;
            }
        }
    }

    fn assign_surrogate(&mut self, entity_type: &str) -> EntityKey {
        let next = self.next_surrogate.entry(entity_type.to_string()).or_insert(1);
        let key = EntityKey::single(*next);
        *next += 1;
        key
    }
}

/// One buffered operation, with all node references resolved.
#[derive(Debug)]
enum StagedOp {
    Insert {
        target: EntityRef,
        fields: Row,
        parent: Option<(String, EntityRef)>,
    },
    Update {
        target: EntityRef,
        changed: Row,
    },
    Delete {
        target: EntityRef,
    },
    Link {
        relation: String,
        parent: EntityRef,
        child: EntityRef,
    },
    Unlink {
        relation: String,
        parent: EntityRef,
        child: EntityRef,
    },
}

/// A staged unit of work against a [`MemoryStore`].
///
/// Operations are buffered and become visible only on
/// [`commit`](UnitOfWork::commit), which applies everything under one write
/// lock, all-or-nothing: a commit that fails applies none of its operations.
/// Dropping an uncommitted unit of work discards its staged operations. Keys for transient inserts are assigned at staging time, so
/// later mutations referring to the new row via [`NodeRef::Inserted`]
/// resolve against this unit of work's own assignments.
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    state: Arc<RwLock<StoreState>>,
    staged: Vec<StagedOp>,
    assigned: HashMap<InsertId, EntityRef>,
}

impl MemoryUnitOfWork {
    /// Returns the key assigned to a staged insert, if any.
    pub fn assigned_key(&self, id: InsertId) -> Option<&EntityRef> {
        self.assigned.get(&id)
    }

    /// Number of staged, uncommitted operations.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    fn resolve(&self, node: &NodeRef) -> StoreResult<EntityRef> {
        match node {
            NodeRef::Existing(entity) => Ok(entity.clone()),
            NodeRef::Inserted(id) => self.assigned.get(id).cloned().ok_or_else(|| {
                StoreError::constraint_violation(format!("unknown staged insert {id}"))
            }),
        }
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    fn stage_insert(&mut self, record: &InsertRecord) -> StoreResult<()> {
        let key = match &record.key {
            Some(key) => {
                if key.len() != record.key_fields.len() {
                    return Err(StoreError::constraint_violation(format!(
                        "key arity mismatch for `{}`: {} fields declared, {} components given",
                        record.entity_type,
                        record.key_fields.len(),
                        key.len()
                    )));
                }
                key.clone()
            }
            // Surrogate generation covers single-column integer keys only;
            // composite-keyed entities must arrive with their key set.
            None => {
                if record.key_fields.len() != 1 {
                    return Err(StoreError::constraint_violation(format!(
                        "cannot assign a surrogate key for composite-keyed `{}`",
                        record.entity_type
                    )));
                }
                self.state.write().assign_surrogate(&record.entity_type)
            }
        };
        let target = EntityRef::new(&record.entity_type, key);

        let parent = match &record.parent {
            Some(link) => Some((link.relation.clone(), self.resolve(&link.parent)?)),
            None => None,
        };

        trace!(%target, "staged insert");
        self.assigned.insert(record.id, target.clone());
        self.staged.push(StagedOp::Insert {
            target,
            fields: record.fields.clone(),
            parent,
        });
        Ok(())
    }

    fn stage_update(&mut self, target: &EntityRef, changed: &Row) -> StoreResult<()> {
        self.staged.push(StagedOp::Update {
            target: target.clone(),
            changed: changed.clone(),
        });
        Ok(())
    }

    fn stage_delete(&mut self, target: &EntityRef) -> StoreResult<()> {
        self.staged.push(StagedOp::Delete {
            target: target.clone(),
        });
        Ok(())
    }

    fn stage_link(&mut self, relation: &str, parent: &NodeRef, child: &EntityRef) -> StoreResult<()> {
        let parent = self.resolve(parent)?;
        self.staged.push(StagedOp::Link {
            relation: relation.to_string(),
            parent,
            child: child.clone(),
        });
        Ok(())
    }

    fn stage_unlink(
        &mut self,
        relation: &str,
        parent: &EntityRef,
        child: &EntityRef,
    ) -> StoreResult<()> {
        self.staged.push(StagedOp::Unlink {
            relation: relation.to_string(),
            parent: parent.clone(),
            child: child.clone(),
        });
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        let staged = std::mem::take(&mut self.staged);
        let mut state = self.state.write();

        // All-or-nothing: ops mutate a scratch copy, which replaces the live
        // state only when every op succeeds. A failing op leaves the store
        // exactly as it was.
        let mut next = state.clone();
        for op in staged {
            match op {
                StagedOp::Insert {
                    target,
                    fields,
                    parent,
                } => {
                    if next.rows.contains_key(&target) {
                        return Err(StoreError::constraint_violation(format!(
                            "duplicate row {target}"
                        )));
                    }
                    next.bump_surrogate(&target);
                    next.rows.insert(target.clone(), fields);
                    if let Some((relation, parent)) = parent {
                        next.children.entry((parent, relation)).or_default().push(target);
                    }
                }
                StagedOp::Update { target, changed } => {
                    let row = next.rows.get_mut(&target).ok_or(StoreError::NotFound)?;
                    for (name, value) in changed {
                        row.insert(name, value);
                    }
                }
                StagedOp::Delete { target } => {
                    next.rows.remove(&target).ok_or(StoreError::NotFound)?;
                    next.children
                        .retain(|(parent, _), children| {
                            if parent == &target {
                                return false;
                            }
                            children.retain(|child| child != &target);
                            true
                        });
                    next.links.retain(|(_, p, c)| p != &target && c != &target);
                }
                StagedOp::Link {
                    relation,
                    parent,
                    child,
                } => {
                    if !next.rows.contains_key(&child) {
                        return Err(StoreError::constraint_violation(format!(
                            "link target {child} does not exist"
                        )));
                    }
                    next.links.insert((relation, parent, child));
                }
                StagedOp::Unlink {
                    relation,
                    parent,
                    child,
                } => {
                    if !next.links.remove(&(relation.clone(), parent.clone(), child.clone())) {
                        return Err(StoreError::constraint_violation(format!(
                            "link row ({relation}, {parent}, {child}) does not exist"
                        )));
                    }
                }
            }
        }
        *state = next;

        Ok(())
    }
}
