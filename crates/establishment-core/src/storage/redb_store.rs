//! # redb-backed Store
//!
//! A disk-backed store for persons, relationships, users and sessions using
//! the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! redb admits one write transaction at a time, so any "probe, then write"
//! sequence executed inside `RedbStore::write` is atomic with respect to
//! every other writer. Uniqueness of person ids, logins and emails, and the
//! one-edge-per-triple rule, all rely on this.

use super::{CredentialStore, GraphRow, PersonStore, SessionStore};
use crate::{EstablishmentError, MergeOutcome, Person, Relationship, Session, User};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;

/// Table for persons: person id -> postcard `Person`
const PERSONS: TableDefinition<&str, &[u8]> = TableDefinition::new("persons");

/// Table for relationships: (source id, target id, type) -> details
const RELATIONSHIPS: TableDefinition<(&str, &str, &str), &str> =
    TableDefinition::new("relationships");

/// Table for users: user id -> postcard `User`
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: login -> user id
const USER_LOGINS: TableDefinition<&str, &str> = TableDefinition::new("user_logins");

/// Unique index: email -> user id
const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

/// Table for sessions: session id -> postcard `Session`
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// A disk-backed store using redb.
///
/// Opened once at process start and shared behind an `Arc`; the handle is
/// released when the last reference is dropped.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EstablishmentError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| EstablishmentError::store("open database", e))?;
        let store = Self { db };

        // Initialize tables if they don't exist
        store.write("initialize tables", |txn| {
            txn.open_table(PERSONS)
                .map_err(|e| EstablishmentError::store("open persons", e))?;
            txn.open_table(RELATIONSHIPS)
                .map_err(|e| EstablishmentError::store("open relationships", e))?;
            txn.open_table(USERS)
                .map_err(|e| EstablishmentError::store("open users", e))?;
            txn.open_table(USER_LOGINS)
                .map_err(|e| EstablishmentError::store("open user logins", e))?;
            txn.open_table(USER_EMAILS)
                .map_err(|e| EstablishmentError::store("open user emails", e))?;
            txn.open_table(SESSIONS)
                .map_err(|e| EstablishmentError::store("open sessions", e))?;
            Ok(())
        })?;

        Ok(store)
    }

    /// Number of stored persons.
    pub fn person_count(&self) -> Result<u64, EstablishmentError> {
        let txn = self.read("count persons")?;
        let table = txn
            .open_table(PERSONS)
            .map_err(|e| EstablishmentError::store("open persons", e))?;
        table
            .len()
            .map_err(|e| EstablishmentError::store("count persons", e))
    }

    /// Number of stored relationships.
    pub fn relationship_count(&self) -> Result<u64, EstablishmentError> {
        let txn = self.read("count relationships")?;
        let table = txn
            .open_table(RELATIONSHIPS)
            .map_err(|e| EstablishmentError::store("open relationships", e))?;
        table
            .len()
            .map_err(|e| EstablishmentError::store("count relationships", e))
    }

    fn read(&self, context: &str) -> Result<ReadTransaction, EstablishmentError> {
        self.db
            .begin_read()
            .map_err(|e| EstablishmentError::store(context, e))
    }

    /// Run `op` in one write transaction. Commits on `Ok`, aborts on `Err`.
    fn write<T>(
        &self,
        context: &str,
        op: impl FnOnce(&WriteTransaction) -> Result<T, EstablishmentError>,
    ) -> Result<T, EstablishmentError> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| EstablishmentError::store(context, e))?;
        match op(&txn) {
            Ok(value) => {
                txn.commit()
                    .map_err(|e| EstablishmentError::store(context, e))?;
                Ok(value)
            }
            Err(err) => {
                let _ = txn.abort();
                Err(err)
            }
        }
    }

    /// Fetch and decode one record from a string-keyed table.
    fn get_record<T: DeserializeOwned>(
        &self,
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
        context: &str,
    ) -> Result<Option<T>, EstablishmentError> {
        let txn = self.read(context)?;
        let table = txn
            .open_table(table)
            .map_err(|e| EstablishmentError::store(context, e))?;
        let Some(bytes) = table
            .get(key)
            .map_err(|e| EstablishmentError::store(context, e))?
        else {
            return Ok(None);
        };
        decode(bytes.value(), context).map(Some)
    }
}

fn encode<T: Serialize>(value: &T, context: &str) -> Result<Vec<u8>, EstablishmentError> {
    postcard::to_allocvec(value).map_err(|e| EstablishmentError::store(context, e))
}

fn decode<T: DeserializeOwned>(bytes: &[u8], context: &str) -> Result<T, EstablishmentError> {
    postcard::from_bytes(bytes).map_err(|e| EstablishmentError::store(context, e))
}

// =============================================================================
// PERSONSTORE IMPLEMENTATION
// =============================================================================

impl PersonStore for RedbStore {
    fn insert_person(&self, person: &Person) -> Result<(), EstablishmentError> {
        let bytes = encode(person, "encode person")?;
        self.write("insert person", |txn| {
            let mut table = txn
                .open_table(PERSONS)
                .map_err(|e| EstablishmentError::store("open persons", e))?;
            let exists = table
                .get(person.id.as_str())
                .map_err(|e| EstablishmentError::store("probe person", e))?
                .is_some();
            if exists {
                return Err(EstablishmentError::AlreadyExists(format!(
                    "person '{}'",
                    person.id
                )));
            }
            table
                .insert(person.id.as_str(), bytes.as_slice())
                .map_err(|e| EstablishmentError::store("insert person", e))?;
            Ok(())
        })
    }

    fn person(&self, id: &str) -> Result<Option<Person>, EstablishmentError> {
        self.get_record(PERSONS, id, "get person")
    }

    fn persons_after(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Person>, EstablishmentError> {
        let txn = self.read("list persons")?;
        let table = txn
            .open_table(PERSONS)
            .map_err(|e| EstablishmentError::store("open persons", e))?;
        let range = match after {
            Some(after) => table.range::<&str>((Bound::Excluded(after), Bound::Unbounded)),
            None => table.range::<&str>(..),
        }
        .map_err(|e| EstablishmentError::store("list persons", e))?;

        let mut persons = Vec::new();
        for entry in range.take(limit) {
            let (_, value) = entry.map_err(|e| EstablishmentError::store("list persons", e))?;
            persons.push(decode(value.value(), "decode person")?);
        }
        Ok(persons)
    }

    fn merge_relationship(&self, rel: &Relationship) -> Result<MergeOutcome, EstablishmentError> {
        self.write("merge relationship", |txn| {
            {
                let persons = txn
                    .open_table(PERSONS)
                    .map_err(|e| EstablishmentError::store("open persons", e))?;
                let mut missing = Vec::new();
                for id in [rel.source_id.as_str(), rel.target_id.as_str()] {
                    let found = persons
                        .get(id)
                        .map_err(|e| EstablishmentError::store("probe endpoint", e))?
                        .is_some();
                    if !found {
                        missing.push(id);
                    }
                }
                if !missing.is_empty() {
                    return Err(EstablishmentError::EndpointNotFound(missing.join(", ")));
                }
            }

            let mut table = txn
                .open_table(RELATIONSHIPS)
                .map_err(|e| EstablishmentError::store("open relationships", e))?;
            let key = (
                rel.source_id.as_str(),
                rel.target_id.as_str(),
                rel.kind.as_str(),
            );
            let existing = table
                .get(key)
                .map_err(|e| EstablishmentError::store("probe relationship", e))?
                .map(|v| v.value().to_string());

            let outcome = match existing {
                Some(details) if details == rel.details => return Ok(MergeOutcome::Unchanged),
                Some(_) => MergeOutcome::Updated,
                None => MergeOutcome::Created,
            };
            table
                .insert(key, rel.details.as_str())
                .map_err(|e| EstablishmentError::store("upsert relationship", e))?;
            Ok(outcome)
        })
    }

    fn graph_rows(&self) -> Result<Vec<GraphRow>, EstablishmentError> {
        let txn = self.read("graph query")?;

        // Outgoing edges grouped by source id.
        let mut outgoing: BTreeMap<String, Vec<(String, String, String)>> = BTreeMap::new();
        {
            let table = txn
                .open_table(RELATIONSHIPS)
                .map_err(|e| EstablishmentError::store("open relationships", e))?;
            for entry in table
                .iter()
                .map_err(|e| EstablishmentError::store("scan relationships", e))?
            {
                let (key, value) =
                    entry.map_err(|e| EstablishmentError::store("scan relationships", e))?;
                let (source, target, kind) = key.value();
                outgoing.entry(source.to_string()).or_default().push((
                    target.to_string(),
                    kind.to_string(),
                    value.value().to_string(),
                ));
            }
        }

        let table = txn
            .open_table(PERSONS)
            .map_err(|e| EstablishmentError::store("open persons", e))?;
        let mut rows = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| EstablishmentError::store("scan persons", e))?
        {
            let (key, value) = entry.map_err(|e| EstablishmentError::store("scan persons", e))?;
            let edges = outgoing.remove(key.value()).unwrap_or_default();
            // An undecodable record becomes malformed rows, one per edge it
            // would have produced, not a failed query.
            let Ok(person) = postcard::from_bytes::<Person>(value.value()) else {
                if edges.is_empty() {
                    rows.push(GraphRow {
                        person: None,
                        related_id: None,
                        kind: None,
                        details: None,
                    });
                }
                for (target, kind, details) in edges {
                    rows.push(GraphRow {
                        person: None,
                        related_id: Some(target),
                        kind: Some(kind),
                        details: Some(details),
                    });
                }
                continue;
            };

            if edges.is_empty() {
                rows.push(GraphRow::isolated(person));
                continue;
            }
            for (target, kind, details) in edges {
                rows.push(GraphRow::edge(person.clone(), target, kind, details));
            }
        }
        Ok(rows)
    }
}

// =============================================================================
// CREDENTIALSTORE IMPLEMENTATION
// =============================================================================

impl CredentialStore for RedbStore {
    fn insert_user(&self, user: &User) -> Result<(), EstablishmentError> {
        let bytes = encode(user, "encode user")?;
        self.write("insert user", |txn| {
            let mut logins = txn
                .open_table(USER_LOGINS)
                .map_err(|e| EstablishmentError::store("open user logins", e))?;
            let mut emails = txn
                .open_table(USER_EMAILS)
                .map_err(|e| EstablishmentError::store("open user emails", e))?;

            let login_taken = logins
                .get(user.login.as_str())
                .map_err(|e| EstablishmentError::store("probe login", e))?
                .is_some();
            let email_taken = emails
                .get(user.email.as_str())
                .map_err(|e| EstablishmentError::store("probe email", e))?
                .is_some();
            if login_taken || email_taken {
                return Err(EstablishmentError::AlreadyExists(
                    "user with this login or email".to_string(),
                ));
            }

            let mut users = txn
                .open_table(USERS)
                .map_err(|e| EstablishmentError::store("open users", e))?;
            users
                .insert(user.id.as_str(), bytes.as_slice())
                .map_err(|e| EstablishmentError::store("insert user", e))?;
            logins
                .insert(user.login.as_str(), user.id.as_str())
                .map_err(|e| EstablishmentError::store("index login", e))?;
            emails
                .insert(user.email.as_str(), user.id.as_str())
                .map_err(|e| EstablishmentError::store("index email", e))?;
            Ok(())
        })
    }

    fn user_by_login(&self, login: &str) -> Result<Option<User>, EstablishmentError> {
        let user_id = {
            let txn = self.read("lookup login")?;
            let table = txn
                .open_table(USER_LOGINS)
                .map_err(|e| EstablishmentError::store("open user logins", e))?;
            table
                .get(login)
                .map_err(|e| EstablishmentError::store("lookup login", e))?
                .map(|v| v.value().to_string())
        };
        match user_id {
            Some(id) => self.user_by_id(&id),
            None => Ok(None),
        }
    }

    fn user_by_id(&self, id: &str) -> Result<Option<User>, EstablishmentError> {
        self.get_record(USERS, id, "get user")
    }
}

// =============================================================================
// SESSIONSTORE IMPLEMENTATION
// =============================================================================

impl SessionStore for RedbStore {
    fn insert_session(&self, session: &Session) -> Result<(), EstablishmentError> {
        let bytes = encode(session, "encode session")?;
        self.write("insert session", |txn| {
            let mut table = txn
                .open_table(SESSIONS)
                .map_err(|e| EstablishmentError::store("open sessions", e))?;
            table
                .insert(session.id.as_str(), bytes.as_slice())
                .map_err(|e| EstablishmentError::store("insert session", e))?;
            Ok(())
        })
    }

    fn session(&self, id: &str) -> Result<Option<Session>, EstablishmentError> {
        self.get_record(SESSIONS, id, "get session")
    }

    fn delete_session(&self, id: &str) -> Result<bool, EstablishmentError> {
        self.write("delete session", |txn| {
            let mut table = txn
                .open_table(SESSIONS)
                .map_err(|e| EstablishmentError::store("open sessions", e))?;
            let removed = table
                .remove(id)
                .map_err(|e| EstablishmentError::store("delete session", e))?
                .is_some();
            Ok(removed)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::RelationshipKind;
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, RedbStore) {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        (temp, store)
    }

    fn user(id: &str, login: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            login: login.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[test]
    fn person_insert_and_get() {
        let (_temp, store) = open_store();
        let mut alice = Person::new("alice", "Alice").with_occupation("senator");
        alice.party = Some("Blue".to_string());

        store.insert_person(&alice).expect("insert");
        assert_eq!(store.person("alice").expect("get"), Some(alice));
        assert_eq!(store.person("nobody").expect("get"), None);
    }

    #[test]
    fn duplicate_person_rejected() {
        let (_temp, store) = open_store();
        store
            .insert_person(&Person::new("alice", "Alice"))
            .expect("insert");

        let err = store
            .insert_person(&Person::new("alice", "Impostor"))
            .unwrap_err();
        assert!(matches!(err, EstablishmentError::AlreadyExists(_)));
        assert_eq!(store.person("alice").unwrap().unwrap().name, "Alice");
        assert_eq!(store.person_count().unwrap(), 1);
    }

    #[test]
    fn persons_after_pages_in_id_order() {
        let (_temp, store) = open_store();
        for id in ["c", "a", "b", "d"] {
            store.insert_person(&Person::new(id, id)).expect("insert");
        }

        let first = store.persons_after(None, 2).expect("page");
        let ids: Vec<_> = first.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let second = store.persons_after(Some("b"), 2).expect("page");
        let ids: Vec<_> = second.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["c", "d"]);

        assert!(store.persons_after(Some("d"), 2).expect("page").is_empty());
    }

    #[test]
    fn merge_relationship_outcomes() {
        let (_temp, store) = open_store();
        store.insert_person(&Person::new("a", "A")).unwrap();
        store.insert_person(&Person::new("b", "B")).unwrap();

        let rel = Relationship::new("a", "b", RelationshipKind::Family, "siblings");
        assert_eq!(store.merge_relationship(&rel).unwrap(), MergeOutcome::Created);
        assert_eq!(store.merge_relationship(&rel).unwrap(), MergeOutcome::Unchanged);

        let changed = Relationship::new("a", "b", RelationshipKind::Family, "twins");
        assert_eq!(store.merge_relationship(&changed).unwrap(), MergeOutcome::Updated);
        assert_eq!(store.relationship_count().unwrap(), 1);

        let other_kind = Relationship::new("a", "b", RelationshipKind::Business, "partners");
        assert_eq!(
            store.merge_relationship(&other_kind).unwrap(),
            MergeOutcome::Created
        );
        assert_eq!(store.relationship_count().unwrap(), 2);
    }

    #[test]
    fn merge_relationship_missing_endpoint() {
        let (_temp, store) = open_store();
        store.insert_person(&Person::new("a", "A")).unwrap();

        let rel = Relationship::new("a", "ghost", RelationshipKind::Friend, "");
        match store.merge_relationship(&rel) {
            Err(EstablishmentError::EndpointNotFound(ids)) => assert_eq!(ids, "ghost"),
            other => panic!("expected EndpointNotFound, got {:?}", other),
        }
        assert_eq!(store.relationship_count().unwrap(), 0);
    }

    #[test]
    fn graph_rows_outer_join_shape() {
        let (_temp, store) = open_store();
        let a = Person::new("a", "A");
        let b = Person::new("b", "B");
        let c = Person::new("c", "C");
        for p in [&a, &b, &c] {
            store.insert_person(p).unwrap();
        }
        store
            .merge_relationship(&Relationship::new("a", "b", RelationshipKind::Colleague, "x"))
            .unwrap();
        store
            .merge_relationship(&Relationship::new("a", "c", RelationshipKind::Friend, "y"))
            .unwrap();

        let rows = store.graph_rows().unwrap();
        assert_eq!(
            rows,
            vec![
                GraphRow::edge(a.clone(), "b", "COLLEAGUE", "x"),
                GraphRow::edge(a, "c", "FRIEND", "y"),
                GraphRow::isolated(b),
                GraphRow::isolated(c),
            ]
        );
    }

    /// Overwrite a stored person with bytes postcard cannot decode.
    fn corrupt_person(store: &RedbStore, id: &str) {
        store
            .write("corrupt person", |txn| {
                let mut table = txn.open_table(PERSONS).unwrap();
                table.insert(id, [0xffu8, 0xff, 0xff].as_slice()).unwrap();
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn graph_rows_keep_edges_of_undecodable_person() {
        let (_temp, store) = open_store();
        for id in ["a", "b", "c"] {
            store.insert_person(&Person::new(id, id)).unwrap();
        }
        store
            .merge_relationship(&Relationship::new("a", "b", RelationshipKind::Colleague, "x"))
            .unwrap();
        store
            .merge_relationship(&Relationship::new("a", "c", RelationshipKind::Friend, "y"))
            .unwrap();
        corrupt_person(&store, "a");

        let rows = store.graph_rows().unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows[..2].iter().all(|r| r.person.is_none()));
        assert_eq!(rows[0].related_id.as_deref(), Some("b"));
        assert_eq!(rows[1].related_id.as_deref(), Some("c"));

        let (graph, report) = crate::assemble_graph(rows);
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.edges.is_empty());
        assert_eq!(report.incomplete_rows, 2);
        assert_eq!(report.dropped(), 2);
    }

    #[test]
    fn graph_rows_undecodable_isolated_person_is_one_row() {
        let (_temp, store) = open_store();
        store.insert_person(&Person::new("a", "A")).unwrap();
        corrupt_person(&store, "a");

        let rows = store.graph_rows().unwrap();
        assert_eq!(
            rows,
            vec![GraphRow {
                person: None,
                related_id: None,
                kind: None,
                details: None,
            }]
        );
    }

    #[test]
    fn user_login_and_email_unique() {
        let (_temp, store) = open_store();
        store
            .insert_user(&user("u1", "alice", "alice@example.org"))
            .unwrap();

        let same_login = store.insert_user(&user("u2", "alice", "other@example.org"));
        assert!(matches!(
            same_login,
            Err(EstablishmentError::AlreadyExists(_))
        ));
        let same_email = store.insert_user(&user("u3", "bob", "alice@example.org"));
        assert!(matches!(
            same_email,
            Err(EstablishmentError::AlreadyExists(_))
        ));

        // Rejected inserts leave no partial index entries behind.
        assert!(store.user_by_login("bob").unwrap().is_none());
        assert!(store.user_by_id("u2").unwrap().is_none());
        assert_eq!(store.user_by_login("alice").unwrap().unwrap().id, "u1");
    }

    #[test]
    fn session_insert_get_delete() {
        let (_temp, store) = open_store();
        let session = Session {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            expires_at: 42,
        };
        store.insert_session(&session).unwrap();
        assert_eq!(store.session("s1").unwrap(), Some(session));

        assert!(store.delete_session("s1").unwrap());
        assert!(!store.delete_session("s1").unwrap());
        assert!(store.session("s1").unwrap().is_none());
    }

    #[test]
    fn persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let store = RedbStore::open(&db_path).expect("open db");
            store.insert_person(&Person::new("a", "A")).unwrap();
            store.insert_person(&Person::new("b", "B")).unwrap();
            store
                .merge_relationship(&Relationship::new("a", "b", RelationshipKind::Political, "ally"))
                .unwrap();
        }

        {
            let store = RedbStore::open(&db_path).expect("reopen db");
            assert_eq!(store.person_count().unwrap(), 2);
            assert_eq!(store.relationship_count().unwrap(), 1);
        }
    }
}
