//! # establishment-core
//!
//! The graph consistency layer and authentication state machine for
//! Establishment - THE LOGIC.
//!
//! This crate turns raw rows from the backing store into a structurally
//! valid relationship graph, enforces relationship integrity (no
//! self-loops, no dangling edges, idempotent edge creation) and owns the
//! register → login → session check → logout lifecycle.
//!
//! ## Architectural Constraints
//!
//! - Holds no process-wide mutable state; all state lives in the store
//! - Store handles are injected, never global
//! - Has NO async, NO network dependencies (pure Rust)
//! - Reports data-quality problems through return values, not logging

// =============================================================================
// MODULES
// =============================================================================

pub mod assembly;
pub mod auth;
pub mod graph;
pub mod primitives;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    EstablishmentError, Graph, MergeOutcome, Person, PublicUser, Relationship, RelationshipKind,
    Session, User,
};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use assembly::{AssemblyReport, assemble_graph};
pub use auth::{Authenticator, Clock, SystemClock};
pub use graph::{GraphEngine, PersonIter};
pub use storage::{CredentialStore, GraphRow, PersonStore, RedbStore, SessionStore};
