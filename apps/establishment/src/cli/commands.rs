//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Everything except `server` runs synchronously against the redb file.

use crate::api;
use crate::config::Config;
use establishment_core::{EstablishmentError, GraphEngine, Person, RedbStore};
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: Config) -> Result<(), EstablishmentError> {
    println!("Establishment Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:    {}", config.bind_addr());
    println!("  Database:   {:?}", config.database);
    println!("  Static dir: {:?}", config.static_dir);
    println!("  Timeout:    {}s", config.request_timeout().as_secs());
    println!();
    println!("Endpoints:");
    println!("  GET  /graph         - Full relationship graph");
    println!("  GET  /persons       - List persons");
    println!("  GET  /person/{{id}}   - Fetch a person");
    println!("  POST /person        - Create a person (login required)");
    println!("  POST /relationship  - Create a relationship (login required)");
    println!("  POST /register, /login, /logout; GET /check-session");
    println!("  GET  /status, /health");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database with empty tables.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), EstablishmentError> {
    if db_path.exists() {
        if !force {
            return Err(EstablishmentError::AlreadyExists(format!(
                "database {:?}; use --force to overwrite",
                db_path
            )));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| EstablishmentError::store("remove existing database", e))?;
    }

    RedbStore::open(db_path)?;
    println!("Initialized new redb database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store status.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), EstablishmentError> {
    let store = RedbStore::open(db_path)?;
    let persons = store.person_count()?;
    let relationships = store.relationship_count()?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "person_count": persons,
            "relationship_count": relationships,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Establishment Status");
    println!("====================");
    println!("Database:      {:?}", db_path);
    println!();
    println!("Persons:       {}", persons);
    println!("Relationships: {}", relationships);
    Ok(())
}

// =============================================================================
// PERSONS COMMAND
// =============================================================================

/// List every person, ordered by id.
pub fn cmd_persons(db_path: &Path, json_mode: bool) -> Result<(), EstablishmentError> {
    let engine = open_engine(db_path)?;
    let persons: Vec<Person> = engine.list_persons().collect::<Result<_, _>>()?;

    if json_mode {
        print_json(&persons);
        return Ok(());
    }

    if persons.is_empty() {
        println!("No persons stored.");
        return Ok(());
    }
    for person in &persons {
        match person.party.as_deref() {
            Some(party) => println!("{:<24} {} ({}, {})", person.id, person.name, person.occupation, party),
            None => println!("{:<24} {} ({})", person.id, person.name, person.occupation),
        }
    }
    println!();
    println!("{} person(s)", persons.len());
    Ok(())
}

// =============================================================================
// GRAPH COMMAND
// =============================================================================

/// Print the assembled graph and its assembly report.
pub fn cmd_graph(db_path: &Path, json_mode: bool) -> Result<(), EstablishmentError> {
    let engine = open_engine(db_path)?;
    let (graph, report) = engine.get_graph()?;

    if !report.is_clean() {
        tracing::warn!(
            incomplete_rows = report.incomplete_rows,
            unknown_types = report.unknown_types,
            self_loops = report.self_loops,
            dangling_edges = report.dangling_edges,
            "Graph assembly dropped rows"
        );
    }

    if json_mode {
        print_json(&graph);
        return Ok(());
    }

    println!("Nodes: {}", graph.nodes.len());
    println!("Edges: {}", graph.edges.len());
    println!();
    for edge in &graph.edges {
        if edge.details.is_empty() {
            println!("{} -[{}]-> {}", edge.source_id, edge.kind, edge.target_id);
        } else {
            println!(
                "{} -[{}]-> {}  ({})",
                edge.source_id, edge.kind, edge.target_id, edge.details
            );
        }
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn open_engine(db_path: &Path) -> Result<GraphEngine<RedbStore>, EstablishmentError> {
    Ok(GraphEngine::new(Arc::new(RedbStore::open(db_path)?)))
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use establishment_core::{Relationship, RelationshipKind};

    #[test]
    fn init_refuses_existing_database_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("init.redb");

        cmd_init(&db, false).unwrap();
        assert!(matches!(
            cmd_init(&db, false),
            Err(EstablishmentError::AlreadyExists(_))
        ));
    }

    #[test]
    fn init_force_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("init.redb");
        {
            let engine = open_engine(&db).unwrap();
            engine.add_person(&Person::new("a", "A")).unwrap();
        }

        cmd_init(&db, true).unwrap();
        assert_eq!(RedbStore::open(&db).unwrap().person_count().unwrap(), 0);
    }

    #[test]
    fn read_commands_run_against_populated_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("read.redb");
        {
            let engine = open_engine(&db).unwrap();
            engine.add_person(&Person::new("a", "A")).unwrap();
            engine.add_person(&Person::new("b", "B")).unwrap();
            engine
                .add_relationship(&Relationship::new("a", "b", RelationshipKind::Friend, ""))
                .unwrap();
        }

        cmd_status(&db, true).unwrap();
        cmd_persons(&db, false).unwrap();
        cmd_graph(&db, false).unwrap();
    }
}
