//! # Regraft Testkit
//!
//! Test utilities for Regraft.
//!
//! This crate provides:
//! - The canonical fixture graph (companies, contacts, projects, managers)
//!   seeded into an in-memory store
//! - Detach helpers that load a baseline as an independent graph
//! - Tracing setup for tests
//!
//! The crate's own `tests/` directory hosts the cross-crate scenario and
//! property suites for the reconciler.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod logging;

pub use fixtures::{
    company_mapping, company_ref, contact_ref, detach_company, detach_project, info_ref,
    manager_key, manager_node, manager_ref, project_mapping, project_ref, seed_store,
};
pub use logging::init_tracing;
