//! End-to-end reconciliation scenarios against the in-memory store.

use regraft_core::{
    apply_mutations, BaselineSource, MappingBuilder, MappingNode, MutationPlan, NodeRef,
    ReconcileError, Reconciler, UnitOfWork,
};
use regraft_memstore::MemoryStore;
use regraft_model::{EntityKey, EntityNode, ModelError, ScalarValue};
use regraft_testkit::{
    company_mapping, company_ref, contact_ref, detach_company, detach_project, info_ref,
    init_tracing, manager_node, manager_ref, project_mapping, project_ref, seed_store,
};

fn reconcile_and_commit(
    store: &MemoryStore,
    root: &EntityNode,
    mapping: &MappingNode,
) -> MutationPlan {
    let plan = Reconciler::new(store).reconcile(root, mapping).unwrap();
    let mut uow = store.begin();
    apply_mutations(&plan, &mut uow).unwrap();
    uow.commit().unwrap();
    plan
}

fn new_contact(first_name: &str, last_name: &str) -> EntityNode {
    EntityNode::new("CompanyContact")
        .with_field("first_name", first_name)
        .with_field("last_name", last_name)
}

fn new_info(description: &str, phone_number: &str) -> EntityNode {
    EntityNode::new("ContactInfo")
        .with_field("description", description)
        .with_field("phone_number", phone_number)
}

#[test]
fn base_entity_update() {
    init_tracing();
    let store = seed_store();
    let mapping = MappingBuilder::new("Company", ["id"]).build();

    let mut company = store
        .load_baseline(&EntityKey::single(1i64), &mapping)
        .unwrap()
        .unwrap();
    company.set_field("name", "Company #1");

    let plan = reconcile_and_commit(&store, &company, &mapping);
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.updates().count(), 1);

    assert_eq!(
        store.row(&company_ref(1)).unwrap().get("name"),
        Some(&ScalarValue::from("Company #1"))
    );
}

#[test]
fn unchanged_detached_graph_produces_empty_plan() {
    init_tracing();
    let store = seed_store();
    let company = detach_company(&store, 1);

    let plan = Reconciler::new(&store)
        .reconcile(&company, &company_mapping())
        .unwrap();
    assert!(plan.is_empty());
}

#[test]
fn owned_collection_update() {
    init_tracing();
    let store = seed_store();

    let mut company = detach_company(&store, 1);
    company.set_field("name", "Company #1");
    company.collection_mut("contacts").unwrap()[0].set_field("first_name", "Bobby");

    let plan = reconcile_and_commit(&store, &company, &company_mapping());
    assert_eq!(plan.updates().count(), 2);
    assert_eq!(plan.inserts().count(), 0);
    assert_eq!(plan.deletes().count(), 0);

    let contact_update = plan
        .updates()
        .find(|(target, _)| **target == contact_ref(1))
        .unwrap();
    assert_eq!(contact_update.1.len(), 1);
    assert_eq!(
        contact_update.1.get("first_name"),
        Some(&ScalarValue::from("Bobby"))
    );

    let row = store.row(&contact_ref(1)).unwrap();
    assert_eq!(row.get("first_name"), Some(&ScalarValue::from("Bobby")));
    assert_eq!(row.get("last_name"), Some(&ScalarValue::from("Brown")));
}

#[test]
fn owned_collection_add_inserts_parent_before_child() {
    init_tracing();
    let store = seed_store();

    let mut company = detach_company(&store, 1);
    let charlie = new_contact("Charlie", "Sheen")
        .with_collection("infos", vec![new_info("Home", "123456789")]);
    company.collection_mut("contacts").unwrap().push(charlie);

    let plan = reconcile_and_commit(&store, &company, &company_mapping());
    let inserts: Vec<_> = plan.inserts().collect();
    assert_eq!(inserts.len(), 2);
    assert_eq!(inserts[0].entity_type, "CompanyContact");
    assert_eq!(inserts[1].entity_type, "ContactInfo");
    assert_eq!(
        inserts[1].parent.as_ref().map(|p| &p.parent),
        Some(&NodeRef::Inserted(inserts[0].id))
    );
    assert_eq!(plan.deletes().count(), 0);

    // Contact ids 1 and 2 are seeded, so the surrogate is 3.
    assert!(store.contains(&contact_ref(3)));
    assert_eq!(store.owned_children(&company_ref(1), "contacts").len(), 2);
    assert_eq!(store.owned_children(&contact_ref(3), "infos").len(), 1);
}

#[test]
fn owned_collection_add_multiple() {
    init_tracing();
    let store = seed_store();

    let mut company = detach_company(&store, 1);
    {
        let contacts = company.collection_mut("contacts").unwrap();
        contacts.push(
            new_contact("Charlie", "Sheen")
                .with_collection("infos", vec![new_info("Home", "123456789")]),
        );
        contacts.push(new_contact("Tim", "Sheen"));
        contacts.push(new_contact("Emily", "Sheen"));
        contacts.push(
            new_contact("Mr", "Sheen")
                .with_collection("infos", vec![new_info("Home", "123456789")]),
        );
        contacts.push(new_contact("Mr", "X"));
    }

    let plan = reconcile_and_commit(&store, &company, &company_mapping());
    let contact_inserts = plan
        .inserts()
        .filter(|r| r.entity_type == "CompanyContact")
        .count();
    let info_inserts = plan
        .inserts()
        .filter(|r| r.entity_type == "ContactInfo")
        .count();
    assert_eq!(contact_inserts, 5);
    assert_eq!(info_inserts, 2);

    assert_eq!(store.owned_children(&company_ref(1), "contacts").len(), 6);
}

#[test]
fn owned_collection_remove_cascades_child_first() {
    init_tracing();
    let store = seed_store();

    let mut company = detach_company(&store, 1);
    company.collection_mut("contacts").unwrap().clear();

    let plan = reconcile_and_commit(&store, &company, &company_mapping());
    let deletes: Vec<_> = plan.deletes().collect();
    assert_eq!(deletes, vec![&info_ref(1), &contact_ref(1)]);
    assert_eq!(plan.inserts().count(), 0);
    assert_eq!(plan.updates().count(), 0);

    assert!(!store.contains(&contact_ref(1)));
    assert!(!store.contains(&info_ref(1)));
    assert!(store.contains(&company_ref(1)));
    assert!(store.owned_children(&company_ref(1), "contacts").is_empty());
}

#[test]
fn owned_collection_add_remove_update_combined() {
    init_tracing();
    let store = seed_store();

    // First pass: grow the persisted collection by one contact.
    let mut company = detach_company(&store, 1);
    company
        .collection_mut("contacts")
        .unwrap()
        .push(new_contact("Hello", "Test"));
    reconcile_and_commit(&store, &company, &company_mapping());
    let hello = contact_ref(3);
    assert!(store.contains(&hello));

    // Second pass: update one, remove one, add one.
    let mut company = detach_company(&store, 1);
    {
        let contacts = company.collection_mut("contacts").unwrap();
        contacts
            .iter_mut()
            .find(|c| c.field("id") == Some(&ScalarValue::Integer(1)))
            .unwrap()
            .set_field("first_name", "Terrrrrry");
        contacts.retain(|c| c.field("id") != Some(&ScalarValue::Integer(3)));
        contacts.push(
            new_contact("Charlie", "Sheen")
                .with_collection("infos", vec![new_info("Home", "123456789")]),
        );
    }

    let plan = reconcile_and_commit(&store, &company, &company_mapping());
    assert_eq!(plan.updates().count(), 1);
    assert_eq!(plan.deletes().count(), 1);
    assert_eq!(plan.inserts().count(), 2);

    assert!(!store.contains(&hello));
    assert_eq!(store.owned_children(&company_ref(1), "contacts").len(), 2);
    assert_eq!(
        store.row(&contact_ref(1)).unwrap().get("first_name"),
        Some(&ScalarValue::from("Terrrrrry"))
    );
    assert_eq!(
        store.row(&contact_ref(4)).unwrap().get("first_name"),
        Some(&ScalarValue::from("Charlie"))
    );
}

#[test]
fn associated_collection_add_links_without_touching_the_company() {
    init_tracing();
    let store = seed_store();

    // Project 2's stakeholder is company 1; add company 2.
    let mut project = detach_project(&store, 2);
    let company2 = detach_company(&store, 2).scalar_only();
    project.collection_mut("stakeholders").unwrap().push(company2);

    let plan = reconcile_and_commit(&store, &project, &project_mapping());
    assert_eq!(plan.links().count(), 1);
    assert_eq!(plan.len(), 1);

    let linked = store.linked_children("stakeholders", &project_ref(2));
    assert_eq!(linked, vec![company_ref(1), company_ref(2)]);
}

#[test]
fn associated_collection_remove_unlinks_but_never_deletes() {
    init_tracing();
    let store = seed_store();

    let mut project = detach_project(&store, 1);
    project.collection_mut("stakeholders").unwrap().clear();

    let plan = reconcile_and_commit(&store, &project, &project_mapping());
    assert_eq!(plan.unlinks().count(), 1);
    assert_eq!(plan.deletes().count(), 0);
    assert_eq!(plan.len(), 1);

    assert!(store.linked_children("stakeholders", &project_ref(1)).is_empty());
    // The company itself survives.
    assert!(store.contains(&company_ref(2)));
}

#[test]
fn associated_member_edits_never_propagate() {
    init_tracing();
    let store = seed_store();

    let mut project = detach_project(&store, 2);
    project.collection_mut("stakeholders").unwrap()[0].set_field("name", "TEST OVERWRITE NAME");

    let plan = Reconciler::new(&store)
        .reconcile(&project, &project_mapping())
        .unwrap();
    assert!(plan.is_empty());

    assert_eq!(
        store.row(&company_ref(1)).unwrap().get("name"),
        Some(&ScalarValue::from("Company 1"))
    );
}

#[test]
fn associated_single_links_a_composite_key_manager() {
    init_tracing();
    let store = seed_store();

    let mut project = detach_project(&store, 2);
    project.set_single("lead_coordinator", Some(manager_node("manager1", 1, "Trent")));

    let plan = reconcile_and_commit(&store, &project, &project_mapping());
    assert_eq!(plan.links().count(), 1);
    assert_eq!(plan.unlinks().count(), 0);
    assert_eq!(plan.len(), 1);

    assert!(store.contains_link("lead_coordinator", &project_ref(2), &manager_ref("manager1", 1)));
}

#[test]
fn associated_single_repoint_swaps_the_link_only() {
    init_tracing();
    let store = seed_store();
    store.add_link("lead_coordinator", project_ref(2), manager_ref("manager1", 1));

    let mut project = detach_project(&store, 2);
    // The detached copy carries an edited name; it must not propagate.
    project.set_single(
        "lead_coordinator",
        Some(manager_node("manager2", 2, "Tim Overwrite")),
    );

    let plan = reconcile_and_commit(&store, &project, &project_mapping());
    assert_eq!(plan.unlinks().count(), 1);
    assert_eq!(plan.links().count(), 1);
    assert_eq!(plan.updates().count(), 0);

    assert!(!store.contains_link("lead_coordinator", &project_ref(2), &manager_ref("manager1", 1)));
    assert!(store.contains_link("lead_coordinator", &project_ref(2), &manager_ref("manager2", 2)));
    assert_eq!(
        store.row(&manager_ref("manager2", 2)).unwrap().get("first_name"),
        Some(&ScalarValue::from("Timothy"))
    );
}

#[test]
fn associated_single_cleared_unlinks_only() {
    init_tracing();
    let store = seed_store();
    store.add_link("lead_coordinator", project_ref(2), manager_ref("manager1", 1));

    let mut project = detach_project(&store, 2);
    project.set_single("lead_coordinator", None);

    let plan = reconcile_and_commit(&store, &project, &project_mapping());
    assert_eq!(plan.unlinks().count(), 1);
    assert_eq!(plan.len(), 1);

    assert!(store.contains(&manager_ref("manager1", 1)));
}

fn office_mapping() -> MappingNode {
    MappingBuilder::new("Company", ["id"])
        .owned_single("headquarters", MappingBuilder::new("Address", ["id"]))
        .build()
}

fn office_store() -> MemoryStore {
    let store = MemoryStore::new();
    let company = EntityNode::new("Company")
        .with_field("id", 1i64)
        .with_field("name", "Company 1")
        .with_single(
            "headquarters",
            Some(
                EntityNode::new("Address")
                    .with_field("id", 1i64)
                    .with_field("street", "1 Main St"),
            ),
        );
    store.seed_graph(&company, &office_mapping()).unwrap();
    store
}

#[test]
fn owned_single_update() {
    init_tracing();
    let store = office_store();

    let mut company = store
        .load_baseline(&EntityKey::single(1i64), &office_mapping())
        .unwrap()
        .unwrap();
    company
        .single_mut("headquarters")
        .unwrap()
        .set_field("street", "2 High St");

    let plan = reconcile_and_commit(&store, &company, &office_mapping());
    assert_eq!(plan.updates().count(), 1);
    assert_eq!(plan.len(), 1);

    let hq = regraft_core::EntityRef::new("Address", EntityKey::single(1i64));
    assert_eq!(
        store.row(&hq).unwrap().get("street"),
        Some(&ScalarValue::from("2 High St"))
    );
}

#[test]
fn owned_single_cleared_deletes_the_child() {
    init_tracing();
    let store = office_store();

    let mut company = store
        .load_baseline(&EntityKey::single(1i64), &office_mapping())
        .unwrap()
        .unwrap();
    company.set_single("headquarters", None);

    let plan = reconcile_and_commit(&store, &company, &office_mapping());
    assert_eq!(plan.deletes().count(), 1);

    let hq = regraft_core::EntityRef::new("Address", EntityKey::single(1i64));
    assert!(!store.contains(&hq));
    assert!(store.contains(&company_ref(1)));
}

#[test]
fn owned_single_attached_inserts_a_subtree() {
    init_tracing();
    let store = MemoryStore::new();
    let bare = EntityNode::new("Company")
        .with_field("id", 1i64)
        .with_field("name", "Company 1");
    store.seed_graph(&bare, &MappingBuilder::new("Company", ["id"]).build()).unwrap();

    let mut company = store
        .load_baseline(&EntityKey::single(1i64), &office_mapping())
        .unwrap()
        .unwrap();
    company.set_single(
        "headquarters",
        Some(EntityNode::new("Address").with_field("street", "1 Main St")),
    );

    let plan = reconcile_and_commit(&store, &company, &office_mapping());
    assert_eq!(plan.inserts().count(), 1);

    assert_eq!(store.owned_children(&company_ref(1), "headquarters").len(), 1);
}

#[test]
fn owned_single_repoint_is_rejected() {
    init_tracing();
    let store = office_store();

    let mut company = store
        .load_baseline(&EntityKey::single(1i64), &office_mapping())
        .unwrap()
        .unwrap();
    company.set_single(
        "headquarters",
        Some(
            EntityNode::new("Address")
                .with_field("id", 7i64)
                .with_field("street", "Elsewhere"),
        ),
    );

    let err = Reconciler::new(&store)
        .reconcile(&company, &office_mapping())
        .unwrap_err();
    assert!(matches!(err, ReconcileError::MappingMismatch { .. }));
}

#[test]
fn partial_composite_key_fails_before_staging() {
    init_tracing();
    let store = seed_store();

    let mut project = detach_project(&store, 2);
    // part_key2 is never set: neither transient nor addressable.
    project.set_single(
        "lead_coordinator",
        Some(EntityNode::new("Manager").with_field("part_key", "manager1")),
    );

    let err = Reconciler::new(&store)
        .reconcile(&project, &project_mapping())
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Model(ModelError::MissingKey { .. })
    ));
}

#[test]
fn reconciling_an_unknown_root_fails() {
    init_tracing();
    let store = seed_store();
    let ghost = EntityNode::new("Company")
        .with_field("id", 99i64)
        .with_field("name", "Ghost");

    let err = Reconciler::new(&store)
        .reconcile(&ghost, &company_mapping())
        .unwrap_err();
    assert!(matches!(err, ReconcileError::RootNotFound { .. }));
}

#[test]
fn transient_root_inserts_and_links_everything() {
    init_tracing();
    let store = seed_store();

    let root = EntityNode::new("Project")
        .with_field("name", "Major Project 3")
        .with_collection("stakeholders", vec![detach_company(&store, 1).scalar_only()])
        .with_single("lead_coordinator", Some(manager_node("manager2", 2, "Timothy")));

    let plan = reconcile_and_commit(&store, &root, &project_mapping());
    assert_eq!(plan.inserts().count(), 1);
    assert_eq!(plan.links().count(), 2);

    // Projects 1 and 2 are seeded, so the surrogate is 3.
    assert!(store.contains(&project_ref(3)));
    assert_eq!(
        store.linked_children("stakeholders", &project_ref(3)),
        vec![company_ref(1)]
    );
    assert!(store.contains_link("lead_coordinator", &project_ref(3), &manager_ref("manager2", 2)));
}

#[test]
fn nested_owned_info_update_and_add() {
    init_tracing();
    let store = seed_store();

    let mut company = detach_company(&store, 1);
    {
        let contact = &mut company.collection_mut("contacts").unwrap()[0];
        let infos = contact.collection_mut("infos").unwrap();
        infos[0].set_field("email", "testeremail");
        infos.push(
            EntityNode::new("ContactInfo")
                .with_field("description", "Test")
                .with_field("email", "test@test.com"),
        );
    }

    let plan = reconcile_and_commit(&store, &company, &company_mapping());
    assert_eq!(plan.updates().count(), 1);
    assert_eq!(plan.inserts().count(), 1);

    assert_eq!(store.owned_children(&contact_ref(1), "infos").len(), 2);
    assert_eq!(
        store.row(&info_ref(1)).unwrap().get("email"),
        Some(&ScalarValue::from("testeremail"))
    );
}

#[test]
fn uncommitted_unit_of_work_changes_nothing() {
    init_tracing();
    let store = seed_store();

    let mut company = detach_company(&store, 1);
    company.set_field("name", "Company #1");

    let plan = Reconciler::new(&store)
        .reconcile(&company, &company_mapping())
        .unwrap();
    {
        let mut uow = store.begin();
        apply_mutations(&plan, &mut uow).unwrap();
        // Dropped without commit.
    }

    assert_eq!(
        store.row(&company_ref(1)).unwrap().get("name"),
        Some(&ScalarValue::from("Company 1"))
    );
}
