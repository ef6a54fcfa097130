//! Graph reconciliation.
//!
//! The reconciler walks a detached graph and its persisted baseline in
//! lock-step, following the mapping tree, and classifies every node and edge
//! as insert, update, delete, link, or unlink. The walk is depth-first and
//! strictly sequential: staging order is semantically meaningful, so parents
//! are inserted before their new children and owned children are deleted
//! before their former owners.
//!
//! Identity is always by logical key, never by instance: the detached graph
//! shares no allocations with the baseline. A per-call visited set processes
//! each `(entity type, key)` at most once, which both terminates cyclic
//! graphs and makes the first-visited copy of a duplicated key win.

use crate::error::{ReconcileError, ReconcileResult};
use crate::mapping::{MappingNode, RelationKind};
use crate::mutation::{EntityRef, InsertRecord, Mutation, MutationPlan, NodeRef, ParentLink};
use crate::store::BaselineSource;
use regraft_model::{EntityKey, EntityNode, KeyState, ModelError, Relation, ScalarValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace};

/// Reconciles detached graphs against a baseline source.
///
/// One `Reconciler` may serve many calls; all per-call state (the visited
/// set, the plan under construction) lives on the stack of
/// [`reconcile`](Self::reconcile). The call either returns a complete,
/// internally consistent plan or fails and stages nothing.
pub struct Reconciler<'a, S: BaselineSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: BaselineSource + ?Sized> Reconciler<'a, S> {
    /// Creates a reconciler over a baseline source.
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Computes the mutation plan that makes persisted state match the
    /// detached graph, per the mapping tree.
    ///
    /// A transient root stages an insert subtree (every detached node
    /// becomes an insert, every associated reference a link). A persisted
    /// root is diffed against its baseline; a missing baseline is
    /// [`ReconcileError::RootNotFound`].
    pub fn reconcile(
        &self,
        root: &EntityNode,
        mapping: &MappingNode,
    ) -> ReconcileResult<MutationPlan> {
        let mut walk = Walk::default();

        match mapping.key().extract(root)? {
            KeyState::Transient => {
                debug!(
                    entity_type = mapping.entity_type(),
                    "transient root, staging insert subtree"
                );
                walk.insert_subtree(root, mapping, None)?;
            }
            KeyState::Persisted(key) => {
                let baseline = self.source.load_baseline(&key, mapping)?.ok_or_else(|| {
                    ReconcileError::RootNotFound {
                        entity_type: mapping.entity_type().to_string(),
                        key: key.clone(),
                    }
                })?;
                walk.reconcile_pair(root, &baseline, key, mapping)?;
            }
        }

        debug!(mutations = walk.plan.len(), "reconciliation complete");
        Ok(walk.plan)
    }
}

/// Per-call walk state.
#[derive(Default)]
struct Walk {
    plan: MutationPlan,
    visited: HashSet<(String, EntityKey)>,
}

impl Walk {
    /// Records a key as processed. Returns `false` when it already was.
    fn mark_visited(&mut self, entity_type: &str, key: &EntityKey) -> bool {
        self.visited
            .insert((entity_type.to_string(), key.clone()))
    }

    /// Stages an entire detached subtree as inserts and links.
    ///
    /// Returns the reference later mutations use for this node, or `None`
    /// when the node's key was already processed elsewhere in the walk.
    fn insert_subtree(
        &mut self,
        node: &EntityNode,
        mapping: &MappingNode,
        parent: Option<ParentLink>,
    ) -> ReconcileResult<Option<NodeRef>> {
        let key = match mapping.key().extract(node)? {
            KeyState::Transient => None,
            KeyState::Persisted(key) => {
                if !self.mark_visited(mapping.entity_type(), &key) {
                    trace!(entity_type = mapping.entity_type(), %key, "already visited, skipping insert");
                    return Ok(None);
                }
                Some(key)
            }
        };

        let id = self.plan.next_insert_id();
        let self_ref = match &key {
            Some(key) => NodeRef::Existing(EntityRef::new(mapping.entity_type(), key.clone())),
            None => NodeRef::Inserted(id),
        };

        trace!(entity_type = mapping.entity_type(), %id, "staging insert");
        self.plan.push(Mutation::Insert(InsertRecord {
            id,
            entity_type: mapping.entity_type().to_string(),
            key_fields: mapping.key().key_fields().to_vec(),
            key,
            fields: non_key_fields(node, mapping),
            parent,
        }));

        for (name, relation) in mapping.relations() {
            match relation.kind() {
                RelationKind::OwnedSingle => {
                    if let Some(child) = single_of(node, mapping.entity_type(), name)? {
                        let link = ParentLink {
                            relation: name.to_string(),
                            parent: self_ref.clone(),
                        };
                        self.insert_subtree(child, relation.target(), Some(link))?;
                    }
                }
                RelationKind::OwnedCollection => {
                    for child in collection_of(node, mapping.entity_type(), name)? {
                        let link = ParentLink {
                            relation: name.to_string(),
                            parent: self_ref.clone(),
                        };
                        self.insert_subtree(child, relation.target(), Some(link))?;
                    }
                }
                RelationKind::AssociatedSingle => {
                    if let Some(target) = single_of(node, mapping.entity_type(), name)? {
                        let child = self.associated_ref(mapping, name, relation.target(), target)?;
                        self.stage_link(name, self_ref.clone(), child);
                    }
                }
                RelationKind::AssociatedCollection => {
                    for target in collection_of(node, mapping.entity_type(), name)? {
                        let child = self.associated_ref(mapping, name, relation.target(), target)?;
                        self.stage_link(name, self_ref.clone(), child);
                    }
                }
            }
        }

        Ok(Some(self_ref))
    }

    /// Diffs a detached node against its baseline counterpart of the same
    /// key, then dispatches every declared relationship.
    fn reconcile_pair(
        &mut self,
        detached: &EntityNode,
        baseline: &EntityNode,
        key: EntityKey,
        mapping: &MappingNode,
    ) -> ReconcileResult<()> {
        if !self.mark_visited(mapping.entity_type(), &key) {
            trace!(entity_type = mapping.entity_type(), %key, "already visited, skipping");
            return Ok(());
        }
        let self_ref = EntityRef::new(mapping.entity_type(), key);

        let changed = diff_fields(detached, baseline, mapping);
        if !changed.is_empty() {
            trace!(target = %self_ref, fields = changed.len(), "staging update");
            self.plan.push(Mutation::Update {
                target: self_ref.clone(),
                changed,
            });
        }

        for (name, relation) in mapping.relations() {
            match relation.kind() {
                RelationKind::OwnedSingle => {
                    self.owned_single(detached, baseline, &self_ref, name, relation.target())?;
                }
                RelationKind::OwnedCollection => {
                    self.owned_collection(detached, baseline, &self_ref, name, relation.target())?;
                }
                RelationKind::AssociatedSingle => {
                    self.associated_single(detached, baseline, &self_ref, name, relation.target())?;
                }
                RelationKind::AssociatedCollection => {
                    self.associated_collection(
                        detached,
                        baseline,
                        &self_ref,
                        name,
                        relation.target(),
                    )?;
                }
            }
        }

        Ok(())
    }

    /// Owned single: the child's lifecycle follows the reference. Detached
    /// null deletes the baseline child; a fresh reference inserts a subtree;
    /// matched keys recurse. Differing keys are a mapping mismatch, since an
    /// owned single relationship assumes one persisted counterpart at a time.
    fn owned_single(
        &mut self,
        detached: &EntityNode,
        baseline: &EntityNode,
        parent_ref: &EntityRef,
        name: &str,
        target: &MappingNode,
    ) -> ReconcileResult<()> {
        match (
            single_of(detached, parent_ref.entity_type.as_str(), name)?,
            baseline.single(name),
        ) {
            (None, None) => Ok(()),
            (None, Some(old)) => self.delete_subtree(old, target),
            (Some(new), None) => {
                let link = ParentLink {
                    relation: name.to_string(),
                    parent: NodeRef::Existing(parent_ref.clone()),
                };
                self.insert_subtree(new, target, Some(link))?;
                Ok(())
            }
            (Some(new), Some(old)) => {
                let old_key = target.key().extract_persisted(old)?;
                match target.key().extract(new)? {
                    KeyState::Transient => {
                        Err(ReconcileError::mapping_mismatch_transient(name, old_key))
                    }
                    KeyState::Persisted(new_key) if new_key != old_key => {
                        Err(ReconcileError::mapping_mismatch(name, old_key, &new_key))
                    }
                    KeyState::Persisted(new_key) => {
                        self.reconcile_pair(new, old, new_key, target)
                    }
                }
            }
        }
    }

    /// Owned collection: membership by key drives lifecycle. Baseline-only
    /// keys are deleted (cascading child-first), detached-only nodes are
    /// inserted, matched keys recurse. Element order never matters; within
    /// one collection a duplicated key resolves last-write-wins.
    fn owned_collection(
        &mut self,
        detached: &EntityNode,
        baseline: &EntityNode,
        parent_ref: &EntityRef,
        name: &str,
        target: &MappingNode,
    ) -> ReconcileResult<()> {
        let baseline_children = baseline.collection(name);
        let mut baseline_by_key: HashMap<EntityKey, &EntityNode> = HashMap::new();
        let mut baseline_order = Vec::with_capacity(baseline_children.len());
        for child in baseline_children {
            let key = target.key().extract_persisted(child)?;
            baseline_order.push(key.clone());
            baseline_by_key.insert(key, child);
        }

        // Last write wins for duplicated keys on the detached side.
        let detached_children = collection_of(detached, parent_ref.entity_type.as_str(), name)?;
        let mut detached_by_key: HashMap<EntityKey, &EntityNode> = HashMap::new();
        for child in detached_children {
            if let KeyState::Persisted(key) = target.key().extract(child)? {
                detached_by_key.insert(key, child);
            }
        }

        // Deletes first, child-first within each subtree.
        for key in &baseline_order {
            if !detached_by_key.contains_key(key) {
                let child = baseline_by_key[key];
                self.delete_subtree(child, target)?;
            }
        }

        // Then matched updates and fresh inserts, in detached order.
        let mut processed: HashSet<EntityKey> = HashSet::new();
        for child in detached_children {
            match target.key().extract(child)? {
                KeyState::Transient => {
                    let link = ParentLink {
                        relation: name.to_string(),
                        parent: NodeRef::Existing(parent_ref.clone()),
                    };
                    self.insert_subtree(child, target, Some(link))?;
                }
                KeyState::Persisted(key) => {
                    if !processed.insert(key.clone()) {
                        continue;
                    }
                    let winner = detached_by_key[&key];
                    match baseline_by_key.get(&key) {
                        Some(counterpart) => {
                            self.reconcile_pair(winner, counterpart, key, target)?;
                        }
                        None => {
                            let link = ParentLink {
                                relation: name.to_string(),
                                parent: NodeRef::Existing(parent_ref.clone()),
                            };
                            self.insert_subtree(winner, target, Some(link))?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Associated single: only the link is managed. A changed reference
    /// unlinks the old entity and links the new one; the referenced entity's
    /// own fields and relationships are never touched.
    fn associated_single(
        &mut self,
        detached: &EntityNode,
        baseline: &EntityNode,
        parent_ref: &EntityRef,
        name: &str,
        target: &MappingNode,
    ) -> ReconcileResult<()> {
        let detached_key = match single_of(detached, parent_ref.entity_type.as_str(), name)? {
            Some(node) => Some(self.associated_key(parent_ref, name, target, node)?),
            None => None,
        };
        let baseline_key = match baseline.single(name) {
            Some(node) => Some(target.key().extract_persisted(node)?),
            None => None,
        };

        if detached_key == baseline_key {
            return Ok(());
        }
        if let Some(old) = baseline_key {
            self.stage_unlink(name, parent_ref.clone(), EntityRef::new(target.entity_type(), old));
        }
        if let Some(new) = detached_key {
            self.stage_link(
                name,
                NodeRef::Existing(parent_ref.clone()),
                EntityRef::new(target.entity_type(), new),
            );
        }
        Ok(())
    }

    /// Associated collection: pure link membership. Keys only in the
    /// baseline are unlinked, keys only in the detached set are linked, keys
    /// in both stage nothing at all — even when the caller edited the
    /// detached copy's fields.
    fn associated_collection(
        &mut self,
        detached: &EntityNode,
        baseline: &EntityNode,
        parent_ref: &EntityRef,
        name: &str,
        target: &MappingNode,
    ) -> ReconcileResult<()> {
        let mut detached_keys = HashSet::new();
        let mut detached_order = Vec::new();
        for node in collection_of(detached, parent_ref.entity_type.as_str(), name)? {
            let key = self.associated_key(parent_ref, name, target, node)?;
            if detached_keys.insert(key.clone()) {
                detached_order.push(key);
            }
        }

        let mut baseline_keys = HashSet::new();
        let mut baseline_order = Vec::new();
        for node in baseline.collection(name) {
            let key = target.key().extract_persisted(node)?;
            if baseline_keys.insert(key.clone()) {
                baseline_order.push(key);
            }
        }

        for key in baseline_order {
            if !detached_keys.contains(&key) {
                self.stage_unlink(name, parent_ref.clone(), EntityRef::new(target.entity_type(), key));
            }
        }
        for key in detached_order {
            if !baseline_keys.contains(&key) {
                self.stage_link(
                    name,
                    NodeRef::Existing(parent_ref.clone()),
                    EntityRef::new(target.entity_type(), key),
                );
            }
        }
        Ok(())
    }

    /// Deletes a baseline subtree: owned children first, then unlinks of the
    /// node's declared associated relationships, then the node itself.
    fn delete_subtree(&mut self, node: &EntityNode, mapping: &MappingNode) -> ReconcileResult<()> {
        let key = mapping.key().extract_persisted(node)?;
        if !self.mark_visited(mapping.entity_type(), &key) {
            trace!(entity_type = mapping.entity_type(), %key, "already visited, skipping delete");
            return Ok(());
        }
        let self_ref = EntityRef::new(mapping.entity_type(), key);

        for (name, relation) in mapping.relations() {
            match relation.kind() {
                RelationKind::OwnedSingle => {
                    if let Some(child) = node.single(name) {
                        self.delete_subtree(child, relation.target())?;
                    }
                }
                RelationKind::OwnedCollection => {
                    for child in node.collection(name) {
                        self.delete_subtree(child, relation.target())?;
                    }
                }
                RelationKind::AssociatedSingle => {
                    if let Some(target) = node.single(name) {
                        let key = relation.target().key().extract_persisted(target)?;
                        self.stage_unlink(
                            name,
                            self_ref.clone(),
                            EntityRef::new(relation.target().entity_type(), key),
                        );
                    }
                }
                RelationKind::AssociatedCollection => {
                    for target in node.collection(name) {
                        let key = relation.target().key().extract_persisted(target)?;
                        self.stage_unlink(
                            name,
                            self_ref.clone(),
                            EntityRef::new(relation.target().entity_type(), key),
                        );
                    }
                }
            }
        }

        trace!(target = %self_ref, "staging delete");
        self.plan.push(Mutation::Delete { target: self_ref });
        Ok(())
    }

    /// Resolves the reference an associated relationship points at inside an
    /// insert subtree, where the parent may itself be unkeyed.
    fn associated_ref(
        &mut self,
        parent_mapping: &MappingNode,
        name: &str,
        target: &MappingNode,
        node: &EntityNode,
    ) -> ReconcileResult<EntityRef> {
        match target.key().extract(node)? {
            KeyState::Persisted(key) => Ok(EntityRef::new(target.entity_type(), key)),
            KeyState::Transient => Err(ReconcileError::unkeyed_association(
                parent_mapping.entity_type(),
                name,
            )),
        }
    }

    /// Extracts a persisted key from an associated reference during a diff.
    fn associated_key(
        &mut self,
        parent_ref: &EntityRef,
        name: &str,
        target: &MappingNode,
        node: &EntityNode,
    ) -> ReconcileResult<EntityKey> {
        match target.key().extract(node)? {
            KeyState::Persisted(key) => Ok(key),
            KeyState::Transient => Err(ReconcileError::unkeyed_association(
                parent_ref.entity_type.clone(),
                name,
            )),
        }
    }

    fn stage_link(&mut self, relation: &str, parent: NodeRef, child: EntityRef) {
        trace!(relation, %parent, %child, "staging link");
        self.plan.push(Mutation::Link {
            relation: relation.to_string(),
            parent,
            child,
        });
    }

    fn stage_unlink(&mut self, relation: &str, parent: EntityRef, child: EntityRef) {
        trace!(relation, %parent, %child, "staging unlink");
        self.plan.push(Mutation::Unlink {
            relation: relation.to_string(),
            parent,
            child,
        });
    }
}

/// Scalar diff between a matched pair, excluding key fields.
///
/// Fields absent from the detached node are left untouched rather than
/// nulled: detachment may be partial, and an explicit `ScalarValue::Null` is
/// how a caller clears a field.
fn diff_fields(
    detached: &EntityNode,
    baseline: &EntityNode,
    mapping: &MappingNode,
) -> BTreeMap<String, ScalarValue> {
    let mut changed = BTreeMap::new();
    for (name, value) in detached.fields() {
        if mapping.key().is_key_field(name) {
            continue;
        }
        if baseline.field(name) != Some(value) {
            changed.insert(name.to_string(), value.clone());
        }
    }
    changed
}

/// The row fields an insert carries: every scalar except key fields, which
/// travel separately in [`InsertRecord::key`].
fn non_key_fields(node: &EntityNode, mapping: &MappingNode) -> BTreeMap<String, ScalarValue> {
    node.fields()
        .filter(|(name, _)| !mapping.key().is_key_field(name))
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// Detached access to a relationship declared single. A collection under
/// that name is a caller error, not a diff; an absent relationship reads as
/// empty.
fn single_of<'n>(
    node: &'n EntityNode,
    entity_type: &str,
    name: &str,
) -> ReconcileResult<Option<&'n EntityNode>> {
    match node.relation(name) {
        Some(Relation::Single(child)) => Ok(child.as_deref()),
        Some(Relation::Collection(_)) => {
            Err(ModelError::relation_shape(entity_type, name, "single reference").into())
        }
        None => Ok(None),
    }
}

/// Detached access to a relationship declared as a collection.
fn collection_of<'n>(
    node: &'n EntityNode,
    entity_type: &str,
    name: &str,
) -> ReconcileResult<&'n [EntityNode]> {
    match node.relation(name) {
        Some(Relation::Collection(children)) => Ok(children),
        Some(Relation::Single(_)) => {
            Err(ModelError::relation_shape(entity_type, name, "collection").into())
        }
        None => Ok(&[]),
    }
}
