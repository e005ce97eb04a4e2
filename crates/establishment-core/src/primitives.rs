//! # Primitives
//!
//! Hardcoded runtime constants for the Establishment core.
//!
//! These values are compiled into the binary. The session lifetime and the
//! request deadline can be overridden by the application configuration; the
//! input limits cannot.

/// Default lifetime of a session issued by a successful login (24 hours).
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Default per-request deadline for store operations, in seconds.
///
/// Every store call issued on behalf of a request must finish within this
/// bound or the request fails with `Timeout`.
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Number of random bytes in a session identifier (256 bits).
pub const SESSION_ID_BYTES: usize = 32;

/// Page size used when lazily listing persons.
pub const PERSON_PAGE_SIZE: usize = 256;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for identifiers (person ids, logins).
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum length for short text fields (names, emails, occupations).
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for free-text fields (descriptions, relationship details).
pub const MAX_TEXT_LENGTH: usize = 4096;

/// Maximum password length accepted for hashing.
///
/// Bounds the work done by the slow hash on attacker-supplied input.
pub const MAX_PASSWORD_LENGTH: usize = 1024;
