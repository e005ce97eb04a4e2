//! # Graph Engine
//!
//! Person and relationship operations over a `PersonStore`.
//!
//! The engine holds no state of its own beyond the shared store handle;
//! every read is computed fresh from the store.

use crate::assembly::{AssemblyReport, assemble_graph};
use crate::primitives::PERSON_PAGE_SIZE;
use crate::storage::PersonStore;
use crate::{EstablishmentError, Graph, MergeOutcome, Person, Relationship};
use std::collections::VecDeque;
use std::sync::Arc;

/// Graph operations over an injected store.
#[derive(Debug)]
pub struct GraphEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for GraphEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: PersonStore> GraphEngine<S> {
    /// Create an engine over a shared store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Insert a new person.
    ///
    /// Fails with `ValidationError` on missing id/name and `AlreadyExists`
    /// if the id is taken.
    pub fn add_person(&self, person: &Person) -> Result<(), EstablishmentError> {
        person.validate()?;
        self.store.insert_person(person)
    }

    /// Fetch a person by id. Fails with `NotFound` if absent.
    pub fn get_person(&self, id: &str) -> Result<Person, EstablishmentError> {
        self.store
            .person(id)?
            .ok_or_else(|| EstablishmentError::NotFound(format!("person '{}'", id)))
    }

    /// Lazily list all persons, ordered by id.
    ///
    /// Pages are fetched from the store on demand. Call again to restart.
    #[must_use]
    pub fn list_persons(&self) -> PersonIter<'_, S> {
        PersonIter {
            store: &self.store,
            page: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }

    /// Create or merge the edge `(source, target, kind)`.
    ///
    /// Fails with `InvalidRelationship` for a self-loop and
    /// `EndpointNotFound` if either person is missing. Idempotent: repeating
    /// the call never creates a second edge for the same triple.
    pub fn add_relationship(&self, rel: &Relationship) -> Result<MergeOutcome, EstablishmentError> {
        rel.validate()?;
        if rel.is_self_loop() {
            return Err(EstablishmentError::InvalidRelationship(rel.source_id.clone()));
        }
        self.store.merge_relationship(rel)
    }

    /// Assemble the full graph with referential closure.
    ///
    /// Only store failures are errors; malformed rows are dropped and
    /// reported.
    pub fn get_graph(&self) -> Result<(Graph, AssemblyReport), EstablishmentError> {
        let rows = self.store.graph_rows()?;
        Ok(assemble_graph(rows))
    }
}

/// Lazy, finite iterator over all persons.
///
/// Yields `Err` once and stops if the store fails mid-listing.
pub struct PersonIter<'a, S> {
    store: &'a S,
    page: VecDeque<Person>,
    cursor: Option<String>,
    exhausted: bool,
}

impl<S: PersonStore> Iterator for PersonIter<'_, S> {
    type Item = Result<Person, EstablishmentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            match self
                .store
                .persons_after(self.cursor.as_deref(), PERSON_PAGE_SIZE)
            {
                Ok(batch) => {
                    self.exhausted = batch.len() < PERSON_PAGE_SIZE;
                    self.cursor = batch.last().map(|p| p.id.clone());
                    self.page.extend(batch);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.page.pop_front().map(Ok)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{RedbStore, RelationshipKind};
    use tempfile::tempdir;

    fn engine() -> (tempfile::TempDir, GraphEngine<RedbStore>) {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("graph.redb")).expect("open db");
        (temp, GraphEngine::new(Arc::new(store)))
    }

    #[test]
    fn add_then_get_person_round_trips() {
        let (_temp, engine) = engine();
        let mut alice = Person::new("alice", "Alice").with_occupation("minister");
        alice.twitter = Some("@alice".to_string());
        alice.collaboration = Some("confirmed".to_string());

        engine.add_person(&alice).unwrap();
        assert_eq!(engine.get_person("alice").unwrap(), alice);
    }

    #[test]
    fn get_missing_person_is_not_found() {
        let (_temp, engine) = engine();
        assert!(matches!(
            engine.get_person("nobody"),
            Err(EstablishmentError::NotFound(_))
        ));
    }

    #[test]
    fn add_person_validates() {
        let (_temp, engine) = engine();
        assert!(matches!(
            engine.add_person(&Person::new("alice", "")),
            Err(EstablishmentError::ValidationError(_))
        ));
    }

    #[test]
    fn self_loop_rejected_without_edge() {
        let (_temp, engine) = engine();
        engine.add_person(&Person::new("a", "A")).unwrap();

        let rel = Relationship::new("a", "a", RelationshipKind::Family, "self");
        assert!(matches!(
            engine.add_relationship(&rel),
            Err(EstablishmentError::InvalidRelationship(_))
        ));
        let (graph, _) = engine.get_graph().unwrap();
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn list_persons_spans_pages_and_restarts() {
        let (_temp, engine) = engine();
        let total = PERSON_PAGE_SIZE + 3;
        for i in 0..total {
            engine
                .add_person(&Person::new(format!("p{:04}", i), "P"))
                .unwrap();
        }

        let listed: Vec<Person> = engine.list_persons().collect::<Result<_, _>>().unwrap();
        assert_eq!(listed.len(), total);
        assert!(listed.windows(2).all(|w| w[0].id < w[1].id));

        // A fresh call starts over.
        assert_eq!(engine.list_persons().count(), total);
    }

    #[test]
    fn list_persons_empty_store() {
        let (_temp, engine) = engine();
        assert_eq!(engine.list_persons().count(), 0);
    }
}
