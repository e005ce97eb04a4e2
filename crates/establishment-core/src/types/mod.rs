//! # Core Type Definitions
//!
//! This module contains the domain types of the relationship graph and of
//! the authentication layer:
//! - Graph entities (`Person`, `Relationship`, `RelationshipKind`, `Graph`)
//! - Credentials and sessions (`User`, `PublicUser`, `Session`)
//! - Merge reporting (`MergeOutcome`)
//! - Error types (`EstablishmentError`)
//!
//! ## Encoding
//!
//! Records are stored with postcard, which is not self-describing. Fields
//! must therefore never be skipped during serialization; optional attributes
//! are plain `Option`s that encode as `null` in JSON.

use crate::primitives::{
    MAX_ID_LENGTH, MAX_NAME_LENGTH, MAX_PASSWORD_LENGTH, MAX_TEXT_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// PERSON
// =============================================================================

/// A person in the relationship graph.
///
/// The identifier is assigned by the caller and is unique across all
/// persons. Inserting a second person with the same identifier is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Caller-assigned unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Occupation or office held.
    #[serde(default)]
    pub occupation: String,
    /// Party affiliation.
    #[serde(default)]
    pub party: Option<String>,
    /// Collaboration status.
    #[serde(default)]
    pub collaboration: Option<String>,
    /// Portrait URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Social media handle.
    #[serde(default)]
    pub twitter: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

impl Person {
    /// Create a person with only the required fields populated.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            occupation: String::new(),
            party: None,
            collaboration: None,
            image_url: None,
            twitter: None,
            description: None,
        }
    }

    /// Set the occupation.
    #[must_use]
    pub fn with_occupation(mut self, occupation: impl Into<String>) -> Self {
        self.occupation = occupation.into();
        self
    }

    /// Check required fields and length limits.
    pub fn validate(&self) -> Result<(), EstablishmentError> {
        require_id("id", &self.id)?;
        require_field("name", &self.name, MAX_NAME_LENGTH)?;
        check_length("occupation", &self.occupation, MAX_NAME_LENGTH)?;

        for (field, value, max) in [
            ("party", &self.party, MAX_NAME_LENGTH),
            ("collaboration", &self.collaboration, MAX_NAME_LENGTH),
            ("image_url", &self.image_url, MAX_TEXT_LENGTH),
            ("twitter", &self.twitter, MAX_NAME_LENGTH),
            ("description", &self.description, MAX_TEXT_LENGTH),
        ] {
            if let Some(value) = value {
                check_length(field, value, max)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// RELATIONSHIP
// =============================================================================

/// The closed set of relationship types.
///
/// Serialized in upper case (`"FAMILY"`, `"COLLEAGUE"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Family,
    Colleague,
    Friend,
    Business,
    Political,
}

impl RelationshipKind {
    /// Every relationship kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Family,
        Self::Colleague,
        Self::Friend,
        Self::Business,
        Self::Political,
    ];

    /// The stored and wire representation of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Family => "FAMILY",
            Self::Colleague => "COLLEAGUE",
            Self::Friend => "FRIEND",
            Self::Business => "BUSINESS",
            Self::Political => "POLITICAL",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = EstablishmentError;

    /// Parse a relationship kind, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                EstablishmentError::ValidationError(format!("unknown relationship type '{}'", s))
            })
    }
}

/// A directed, typed relationship between two persons.
///
/// Identified by the `(source_id, target_id, kind)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub details: String,
}

impl Relationship {
    /// Create a new relationship.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: RelationshipKind,
        details: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            details: details.into(),
        }
    }

    /// True if source and target are the same person.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source_id == self.target_id
    }

    /// Check required fields and length limits.
    ///
    /// Self-loops are not a validation error here; the graph engine reports
    /// them as `InvalidRelationship`.
    pub fn validate(&self) -> Result<(), EstablishmentError> {
        require_id("source_id", &self.source_id)?;
        require_id("target_id", &self.target_id)?;
        check_length("details", &self.details, MAX_TEXT_LENGTH)
    }
}

/// Result of merging a relationship into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// No edge existed for the triple; one was created.
    Created,
    /// The edge existed with different details; details were replaced.
    Updated,
    /// The edge existed with identical details; nothing changed.
    Unchanged,
}

// =============================================================================
// GRAPH
// =============================================================================

/// A read-only projection of the relationship graph.
///
/// Every edge's endpoints are present in `nodes` (referential closure) and
/// every person appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Person>,
    pub edges: Vec<Relationship>,
}

// =============================================================================
// USERS & SESSIONS
// =============================================================================

/// A registered user.
///
/// `password_hash` holds an argon2 PHC string and never leaves the core.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub email: String,
    pub password_hash: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("login", &self.login)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// The public identity of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub login: String,
}

/// A login session.
///
/// Valid while `expires_at >= now`; expiry is evaluated lazily on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    /// Absolute expiry, epoch seconds.
    pub expires_at: i64,
}

impl Session {
    /// True once the expiry timestamp lies strictly in the past.
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// Validate registration input.
pub fn validate_registration(
    login: &str,
    email: &str,
    password: &str,
) -> Result<(), EstablishmentError> {
    require_field("login", login, MAX_ID_LENGTH)?;
    require_field("email", email, MAX_NAME_LENGTH)?;
    if !email.contains('@') {
        return Err(EstablishmentError::ValidationError(
            "email must contain '@'".to_string(),
        ));
    }
    if password.is_empty() {
        return Err(EstablishmentError::ValidationError(
            "password is required".to_string(),
        ));
    }
    check_length("password", password, MAX_PASSWORD_LENGTH)
}

fn require_field(field: &str, value: &str, max: usize) -> Result<(), EstablishmentError> {
    if value.trim().is_empty() {
        return Err(EstablishmentError::ValidationError(format!(
            "{} is required",
            field
        )));
    }
    check_length(field, value, max)
}

/// Ids are stored and matched byte for byte, so surrounding whitespace is
/// rejected instead of silently stripped.
fn require_id(field: &str, value: &str) -> Result<(), EstablishmentError> {
    require_field(field, value, MAX_ID_LENGTH)?;
    if value.trim() != value {
        return Err(EstablishmentError::ValidationError(format!(
            "{} must not have leading or trailing whitespace",
            field
        )));
    }
    Ok(())
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), EstablishmentError> {
    if value.len() > max {
        return Err(EstablishmentError::ValidationError(format!(
            "{} length {} exceeds maximum {} bytes",
            field,
            value.len(),
            max
        )));
    }
    Ok(())
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Establishment core.
///
/// Store failures carry the operation that failed; they are never
/// recovered silently.
#[derive(Debug, Error)]
pub enum EstablishmentError {
    /// The referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A relationship from a person to itself.
    #[error("Invalid relationship: source and target must differ ({0})")]
    InvalidRelationship(String),

    /// A relationship references a person that does not exist.
    #[error("Relationship endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Unknown login or wrong password.
    #[error("Invalid login or password")]
    InvalidCredentials,

    /// No session token was supplied, or the session is unknown.
    #[error("No session")]
    NoSession,

    /// The session exists but its expiry has passed.
    #[error("Session expired")]
    Expired,

    /// The operation did not finish within the request deadline.
    #[error("Operation timed out")]
    Timeout,

    /// Connectivity, transaction or encoding failure in the backing store.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Malformed input at the boundary.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl EstablishmentError {
    /// Wrap a lower-level failure as a `StoreError` with operation context.
    pub fn store(context: &str, err: impl fmt::Display) -> Self {
        Self::StoreError(format!("{}: {}", context, err))
    }
}

// =============================================================================
// TESTS
// =============================================================================
