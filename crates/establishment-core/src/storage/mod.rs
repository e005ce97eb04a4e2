//! # Storage
//!
//! Store traits for the three leaf components and their redb implementation.
//!
//! - `PersonStore`: persons and typed relationships (the domain graph)
//! - `CredentialStore`: users with unique login and email
//! - `SessionStore`: sessions keyed by identifier
//!
//! Integrity rules that must hold under concurrent requests (unique person
//! ids, unique logins/emails, one edge per triple, no edge to a missing
//! person) are enforced by the store inside a single write transaction,
//! never by a separate check followed by a separate write.

mod redb_store;

pub use redb_store::RedbStore;

use crate::{EstablishmentError, MergeOutcome, Person, Relationship, Session, User};

/// One raw row of the graph query.
///
/// Shaped like an outer join of persons with their outgoing relationships:
/// a person without outgoing edges yields one row whose relationship
/// columns are all `None`. Any column may be missing in a malformed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRow {
    /// The source person, `None` if its record could not be decoded.
    pub person: Option<Person>,
    /// Identifier of the related (target) person.
    pub related_id: Option<String>,
    /// Raw relationship type as stored.
    pub kind: Option<String>,
    /// Relationship details.
    pub details: Option<String>,
}

impl GraphRow {
    /// A row for a person with no outgoing relationship.
    #[must_use]
    pub fn isolated(person: Person) -> Self {
        Self {
            person: Some(person),
            related_id: None,
            kind: None,
            details: None,
        }
    }

    /// A row for one outgoing relationship of `person`.
    #[must_use]
    pub fn edge(
        person: Person,
        related_id: impl Into<String>,
        kind: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            person: Some(person),
            related_id: Some(related_id.into()),
            kind: Some(kind.into()),
            details: Some(details.into()),
        }
    }
}

/// Persistence of persons and relationships.
pub trait PersonStore: Send + Sync {
    /// Insert a person. Fails with `AlreadyExists` if the id is taken.
    fn insert_person(&self, person: &Person) -> Result<(), EstablishmentError>;

    /// Fetch a person by id.
    fn person(&self, id: &str) -> Result<Option<Person>, EstablishmentError>;

    /// Up to `limit` persons ordered by id, starting strictly after `after`.
    fn persons_after(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Person>, EstablishmentError>;

    /// Upsert the edge for `(source, target, kind)`.
    ///
    /// Fails with `EndpointNotFound` if either endpoint is missing. The
    /// existence probe and the upsert run in one transaction.
    fn merge_relationship(&self, rel: &Relationship) -> Result<MergeOutcome, EstablishmentError>;

    /// All persons joined with their outgoing relationships.
    fn graph_rows(&self) -> Result<Vec<GraphRow>, EstablishmentError>;
}

/// Persistence of user credentials.
pub trait CredentialStore: Send + Sync {
    /// Insert a user. Fails with `AlreadyExists` if the login or the email
    /// is already registered.
    fn insert_user(&self, user: &User) -> Result<(), EstablishmentError>;

    /// Fetch a user by login.
    fn user_by_login(&self, login: &str) -> Result<Option<User>, EstablishmentError>;

    /// Fetch a user by id.
    fn user_by_id(&self, id: &str) -> Result<Option<User>, EstablishmentError>;
}

/// Persistence of login sessions.
pub trait SessionStore: Send + Sync {
    /// Store a newly issued session.
    fn insert_session(&self, session: &Session) -> Result<(), EstablishmentError>;

    /// Fetch a session by id, expired or not.
    fn session(&self, id: &str) -> Result<Option<Session>, EstablishmentError>;

    /// Delete a session. Returns whether a record was removed.
    fn delete_session(&self, id: &str) -> Result<bool, EstablishmentError>;
}
