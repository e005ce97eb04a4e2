//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use establishment_core::{EstablishmentError, MergeOutcome, Person, Relationship};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub person_count: u64,
    pub relationship_count: u64,
    /// Rows dropped by graph assembly since the server started.
    pub dropped_rows_total: u64,
}

// =============================================================================
// PERSON REQUEST
// =============================================================================

/// Person creation request.
///
/// Every field is optional at the JSON level so that a missing `id` or
/// `name` is reported as a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub occupation: Option<String>,
    pub party: Option<String>,
    pub collaboration: Option<String>,
    pub image_url: Option<String>,
    pub twitter: Option<String>,
    pub description: Option<String>,
}

impl PersonRequest {
    /// Convert to a `Person`, validating required fields and limits.
    pub fn to_person(&self) -> Result<Person, EstablishmentError> {
        let person = Person {
            id: required("id", self.id.as_deref())?,
            name: required("name", self.name.as_deref())?,
            occupation: self.occupation.clone().unwrap_or_default(),
            party: self.party.clone(),
            collaboration: self.collaboration.clone(),
            image_url: self.image_url.clone(),
            twitter: self.twitter.clone(),
            description: self.description.clone(),
        };
        person.validate()?;
        Ok(person)
    }
}

// =============================================================================
// RELATIONSHIP REQUEST/RESPONSE
// =============================================================================

/// Relationship creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipRequest {
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub details: Option<String>,
}

impl RelationshipRequest {
    /// Convert to a `Relationship`; the type must be a known kind.
    pub fn to_relationship(&self) -> Result<Relationship, EstablishmentError> {
        let kind = required("type", self.kind.as_deref())?.parse()?;
        let rel = Relationship::new(
            required("source_id", self.source_id.as_deref())?,
            required("target_id", self.target_id.as_deref())?,
            kind,
            self.details.clone().unwrap_or_default(),
        );
        rel.validate()?;
        Ok(rel)
    }
}

/// Relationship merge response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipResponse {
    pub outcome: MergeOutcome,
    pub relationship: Relationship,
}

// =============================================================================
// AUTH REQUESTS/RESPONSES
// =============================================================================

/// Registration request.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login request.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

/// Successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub login: String,
    /// Session expiry, epoch seconds.
    pub expires_at: i64,
}

/// Identity behind a valid session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub login: String,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Presence check only; values pass through untouched so the core sees
/// exactly what the client sent.
fn required(field: &str, value: Option<&str>) -> Result<String, EstablishmentError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(EstablishmentError::ValidationError(format!(
            "{} is required",
            field
        ))),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use establishment_core::RelationshipKind;

    #[test]
    fn person_request_requires_id_and_name() {
        let request = PersonRequest {
            name: Some("Alice".into()),
            ..PersonRequest::default()
        };
        assert!(matches!(
            request.to_person(),
            Err(EstablishmentError::ValidationError(_))
        ));

        let request = PersonRequest {
            id: Some("alice".into()),
            name: Some("  ".into()),
            ..PersonRequest::default()
        };
        assert!(request.to_person().is_err());
    }

    #[test]
    fn padded_ids_are_rejected_not_trimmed() {
        let request = PersonRequest {
            id: Some(" alice ".into()),
            name: Some("Alice".into()),
            ..PersonRequest::default()
        };
        assert!(matches!(
            request.to_person(),
            Err(EstablishmentError::ValidationError(_))
        ));

        let request: RelationshipRequest = serde_json::from_str(
            r#"{"source_id":"a ","target_id":"b","type":"FRIEND"}"#,
        )
        .unwrap();
        assert!(request.to_relationship().is_err());
    }

    #[test]
    fn person_request_keeps_optional_fields() {
        let request: PersonRequest = serde_json::from_str(
            r#"{"id":"alice","name":"Alice","occupation":"minister","party":"Blue"}"#,
        )
        .unwrap();
        let person = request.to_person().unwrap();
        assert_eq!(person.occupation, "minister");
        assert_eq!(person.party.as_deref(), Some("Blue"));
        assert_eq!(person.twitter, None);
    }

    #[test]
    fn relationship_request_parses_type_case_insensitively() {
        let request: RelationshipRequest = serde_json::from_str(
            r#"{"source_id":"a","target_id":"b","type":"colleague","details":"cabinet"}"#,
        )
        .unwrap();
        let rel = request.to_relationship().unwrap();
        assert_eq!(rel.kind, RelationshipKind::Colleague);
        assert_eq!(rel.details, "cabinet");
    }

    #[test]
    fn relationship_request_rejects_unknown_type() {
        let request = RelationshipRequest {
            source_id: Some("a".into()),
            target_id: Some("b".into()),
            kind: Some("RIVAL".into()),
            details: None,
        };
        assert!(matches!(
            request.to_relationship(),
            Err(EstablishmentError::ValidationError(_))
        ));
    }

    #[test]
    fn relationship_response_uses_wire_names() {
        let response = RelationshipResponse {
            outcome: MergeOutcome::Created,
            relationship: Relationship::new("a", "b", RelationshipKind::Friend, "x"),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["outcome"], "created");
        assert_eq!(json["relationship"]["type"], "FRIEND");
    }
}
