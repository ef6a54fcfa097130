//! Test fixtures.
//!
//! Provides the canonical persisted graph the scenario tests reconcile
//! against: two companies with contacts and contact infos, two projects with
//! stakeholder companies and an optional lead coordinator, and two managers
//! identified by a composite key.

use regraft_core::{BaselineSource, EntityRef, MappingBuilder, MappingNode};
use regraft_memstore::MemoryStore;
use regraft_model::{EntityKey, EntityNode, KeySpec};
use std::collections::BTreeMap;

/// Mapping for companies with owned contacts, each with owned infos.
pub fn company_mapping() -> MappingNode {
    MappingBuilder::new("Company", ["id"])
        .owned_collection(
            "contacts",
            MappingBuilder::new("CompanyContact", ["id"])
                .owned_collection("infos", MappingBuilder::new("ContactInfo", ["id"])),
        )
        .build()
}

/// Mapping for projects with associated stakeholder companies and an
/// associated lead coordinator (composite-keyed manager).
pub fn project_mapping() -> MappingNode {
    MappingBuilder::new("Project", ["id"])
        .associated_collection("stakeholders", KeySpec::new("Company", ["id"]))
        .associated_single(
            "lead_coordinator",
            KeySpec::new("Manager", ["part_key", "part_key2"]),
        )
        .build()
}

/// Seeds a store with the canonical fixture graph.
///
/// - Company 1 (id 1) with contact Bob Brown (id 1) and one info (id 1)
/// - Company 2 (id 2) with contact Tim Jones (id 2) and one info (id 2)
/// - Project "Major Project 1" (id 1) with stakeholder Company 2
/// - Project "Major Project 2" (id 2) with stakeholder Company 1
/// - Managers "manager1"/1 (Trent) and "manager2"/2 (Timothy)
pub fn seed_store() -> MemoryStore {
    let store = MemoryStore::new();

    let company1 = EntityNode::new("Company")
        .with_field("id", 1i64)
        .with_field("name", "Company 1")
        .with_collection(
            "contacts",
            vec![EntityNode::new("CompanyContact")
                .with_field("id", 1i64)
                .with_field("first_name", "Bob")
                .with_field("last_name", "Brown")
                .with_collection(
                    "infos",
                    vec![EntityNode::new("ContactInfo")
                        .with_field("id", 1i64)
                        .with_field("description", "Home")
                        .with_field("email", "test@test.com")
                        .with_field("phone_number", "0255525255")],
                )],
        );
    let company2 = EntityNode::new("Company")
        .with_field("id", 2i64)
        .with_field("name", "Company 2")
        .with_collection(
            "contacts",
            vec![EntityNode::new("CompanyContact")
                .with_field("id", 2i64)
                .with_field("first_name", "Tim")
                .with_field("last_name", "Jones")
                .with_collection(
                    "infos",
                    vec![EntityNode::new("ContactInfo")
                        .with_field("id", 2i64)
                        .with_field("description", "Work")
                        .with_field("email", "test@test.com")
                        .with_field("phone_number", "456456456456")],
                )],
        );
    store
        .seed_graph(&company1, &company_mapping())
        .expect("seed company 1");
    store
        .seed_graph(&company2, &company_mapping())
        .expect("seed company 2");

    store.put_row(
        "Project",
        EntityKey::single(1i64),
        BTreeMap::from([("name".to_string(), "Major Project 1".into())]),
    );
    store.put_row(
        "Project",
        EntityKey::single(2i64),
        BTreeMap::from([("name".to_string(), "Major Project 2".into())]),
    );
    store.add_link("stakeholders", project_ref(1), company_ref(2));
    store.add_link("stakeholders", project_ref(2), company_ref(1));

    store.put_row(
        "Manager",
        manager_key("manager1", 1),
        BTreeMap::from([("first_name".to_string(), "Trent".into())]),
    );
    store.put_row(
        "Manager",
        manager_key("manager2", 2),
        BTreeMap::from([("first_name".to_string(), "Timothy".into())]),
    );

    store
}

/// Loads a company graph and returns it as an independent detached value.
pub fn detach_company(store: &MemoryStore, id: i64) -> EntityNode {
    store
        .load_baseline(&EntityKey::single(id), &company_mapping())
        .expect("load company")
        .expect("company exists")
}

/// Loads a project graph and returns it as an independent detached value.
pub fn detach_project(store: &MemoryStore, id: i64) -> EntityNode {
    store
        .load_baseline(&EntityKey::single(id), &project_mapping())
        .expect("load project")
        .expect("project exists")
}

/// Reference to a fixture company row.
pub fn company_ref(id: i64) -> EntityRef {
    EntityRef::new("Company", EntityKey::single(id))
}

/// Reference to a fixture contact row.
pub fn contact_ref(id: i64) -> EntityRef {
    EntityRef::new("CompanyContact", EntityKey::single(id))
}

/// Reference to a fixture contact info row.
pub fn info_ref(id: i64) -> EntityRef {
    EntityRef::new("ContactInfo", EntityKey::single(id))
}

/// Reference to a fixture project row.
pub fn project_ref(id: i64) -> EntityRef {
    EntityRef::new("Project", EntityKey::single(id))
}

/// Composite key of a fixture manager.
pub fn manager_key(part_key: &str, part_key2: i64) -> EntityKey {
    EntityKey::new(vec![part_key.into(), part_key2.into()])
}

/// Reference to a fixture manager row.
pub fn manager_ref(part_key: &str, part_key2: i64) -> EntityRef {
    EntityRef::new("Manager", manager_key(part_key, part_key2))
}

/// A detached manager node carrying its composite key and name.
pub fn manager_node(part_key: &str, part_key2: i64, first_name: &str) -> EntityNode {
    EntityNode::new("Manager")
        .with_field("part_key", part_key)
        .with_field("part_key2", part_key2)
        .with_field("first_name", first_name)
}
