//! # Authentication
//!
//! The register → login → session check → logout lifecycle.
//!
//! Session states: `absent → active → expired/deleted`. Nothing marks a
//! session active except its expiry timestamp; expiry is evaluated lazily
//! whenever a session is read, and there is no background reaper.
//!
//! Passwords are hashed with argon2 (random salt, PHC string). Plaintext
//! passwords are never stored, and hashes never leave this module.

use crate::primitives::{SESSION_ID_BYTES, SESSION_TTL_SECS};
use crate::storage::{CredentialStore, SessionStore};
use crate::types::validate_registration;
use crate::{EstablishmentError, PublicUser, Session, User};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// =============================================================================
// CLOCK
// =============================================================================

/// Source of the current time in epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

// =============================================================================
// AUTHENTICATOR
// =============================================================================

/// Session-based authentication over injected credential and session stores.
pub struct Authenticator<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    session_ttl: i64,
}

impl<S> Clone for Authenticator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            session_ttl: self.session_ttl,
        }
    }
}

impl<S> std::fmt::Debug for Authenticator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

impl<S: CredentialStore + SessionStore> Authenticator<S> {
    /// Create an authenticator with the system clock and a 24 hour TTL.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            session_ttl: SESSION_TTL_SECS,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the session lifetime, in seconds.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl_secs: i64) -> Self {
        self.session_ttl = ttl_secs;
        self
    }

    /// Register a new user.
    ///
    /// Fails with `AlreadyExists` if the login or the email is taken. The
    /// uniqueness check and the insert are one store transaction.
    pub fn register(
        &self,
        login: &str,
        email: &str,
        password: &str,
    ) -> Result<(), EstablishmentError> {
        let login = login.trim();
        let email = email.trim().to_ascii_lowercase();
        validate_registration(login, &email, password)?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            login: login.to_string(),
            email,
            password_hash: hash_password(password)?,
        };
        self.store.insert_user(&user)
    }

    /// Verify credentials and issue a new session.
    ///
    /// Unknown login and wrong password both fail with `InvalidCredentials`.
    pub fn login(&self, login: &str, password: &str) -> Result<Session, EstablishmentError> {
        let user = self
            .store
            .user_by_login(login.trim())?
            .ok_or(EstablishmentError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash)? {
            return Err(EstablishmentError::InvalidCredentials);
        }

        let session = Session {
            id: new_session_id(),
            user_id: user.id,
            expires_at: self.clock.now().saturating_add(self.session_ttl),
        };
        self.store.insert_session(&session)?;
        Ok(session)
    }

    /// Validate a session and return its owner's public identity.
    ///
    /// Fails with `NoSession` for an unknown id and `Expired` once the
    /// expiry has passed, even though the record still exists.
    pub fn check_session(&self, session_id: &str) -> Result<PublicUser, EstablishmentError> {
        if session_id.is_empty() {
            return Err(EstablishmentError::NoSession);
        }
        let session = self
            .store
            .session(session_id)?
            .ok_or(EstablishmentError::NoSession)?;
        if session.is_expired_at(self.clock.now()) {
            return Err(EstablishmentError::Expired);
        }
        // A session whose owner vanished is treated as absent.
        let user = self
            .store
            .user_by_id(&session.user_id)?
            .ok_or(EstablishmentError::NoSession)?;
        Ok(PublicUser { login: user.login })
    }

    /// Gate for mutating operations. Same validation as `check_session`;
    /// any failure blocks the caller.
    pub fn require_auth(&self, session_id: Option<&str>) -> Result<PublicUser, EstablishmentError> {
        self.check_session(session_id.ok_or(EstablishmentError::NoSession)?)
    }

    /// Delete a session.
    ///
    /// Fails with `NoSession` only when no token was supplied; deleting a
    /// session that is already gone succeeds.
    pub fn logout(&self, session_id: Option<&str>) -> Result<(), EstablishmentError> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or(EstablishmentError::NoSession)?;
        self.store.delete_session(session_id)?;
        Ok(())
    }
}

// =============================================================================
// CREDENTIAL PRIMITIVES
// =============================================================================

fn hash_password(password: &str) -> Result<String, EstablishmentError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| EstablishmentError::store("hash password", e))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, EstablishmentError> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| EstablishmentError::store("parse password hash", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 256 random bits from the OS generator, base64url encoded.
fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// TESTS
// =============================================================================
