//! # API Endpoint Handlers
//!
//! Each handler decodes its input, runs one core operation on the blocking
//! pool under the request deadline, and encodes the result.

use super::{
    AppState,
    auth::{cleared_session_cookie, session_cookie, session_token},
    error::ApiError,
    types::{
        HealthResponse, LoginRequest, LoginResponse, MessageResponse, PersonRequest,
        RegisterRequest, RelationshipRequest, RelationshipResponse, SessionResponse,
        StatusResponse,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use establishment_core::{Graph, MergeOutcome, Person, PublicUser};
use std::sync::atomic::Ordering;

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Store counts and the running total of dropped graph rows.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let (person_count, relationship_count) = state
        .run(|state| Ok((state.store.person_count()?, state.store.relationship_count()?)))
        .await?;

    Ok(Json(StatusResponse {
        person_count,
        relationship_count,
        dropped_rows_total: state.dropped_rows.load(Ordering::Relaxed),
    }))
}

// =============================================================================
// PERSON HANDLERS
// =============================================================================

/// Fetch one person.
pub async fn get_person_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Person>> {
    let person = state.run(move |state| state.graph.get_person(&id)).await?;
    Ok(Json(person))
}

/// List every person, ordered by id.
pub async fn list_persons_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<Person>>> {
    let persons = state
        .run(|state| state.graph.list_persons().collect())
        .await?;
    Ok(Json(persons))
}

/// Create a person. Requires a session.
pub async fn add_person_handler(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    Json(request): Json<PersonRequest>,
) -> ApiResult<(StatusCode, Json<Person>)> {
    let person = request.to_person()?;
    let stored = person.clone();
    state
        .run(move |state| state.graph.add_person(&stored))
        .await?;

    tracing::info!(person = %person.id, by = %user.login, "Person created");
    Ok((StatusCode::CREATED, Json(person)))
}

// =============================================================================
// RELATIONSHIP HANDLER
// =============================================================================

/// Create or merge a relationship. Requires a session.
///
/// 201 when the edge is new, 200 when it already existed.
pub async fn add_relationship_handler(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    Json(request): Json<RelationshipRequest>,
) -> ApiResult<(StatusCode, Json<RelationshipResponse>)> {
    let relationship = request.to_relationship()?;
    let merged = relationship.clone();
    let outcome = state
        .run(move |state| state.graph.add_relationship(&merged))
        .await?;

    tracing::info!(
        source = %relationship.source_id,
        target = %relationship.target_id,
        kind = %relationship.kind,
        ?outcome,
        by = %user.login,
        "Relationship merged"
    );
    let status = match outcome {
        MergeOutcome::Created => StatusCode::CREATED,
        MergeOutcome::Updated | MergeOutcome::Unchanged => StatusCode::OK,
    };
    Ok((
        status,
        Json(RelationshipResponse {
            outcome,
            relationship,
        }),
    ))
}

// =============================================================================
// GRAPH HANDLER
// =============================================================================

/// Assemble the whole graph.
///
/// Dropped rows are logged and added to the running total on `/status`.
pub async fn graph_handler(State(state): State<AppState>) -> ApiResult<Json<Graph>> {
    let (graph, report) = state.run(|state| state.graph.get_graph()).await?;

    if !report.is_clean() {
        tracing::warn!(
            rows_seen = report.rows_seen,
            incomplete_rows = report.incomplete_rows,
            unknown_types = report.unknown_types,
            self_loops = report.self_loops,
            dangling_edges = report.dangling_edges,
            "Graph assembly dropped rows"
        );
        state
            .dropped_rows
            .fetch_add(report.dropped() as u64, Ordering::Relaxed);
    }
    Ok(Json(graph))
}

// =============================================================================
// AUTH HANDLERS
// =============================================================================

/// Register a new user.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let login = request.login.trim().to_string();
    state
        .run(move |state| {
            state
                .auth
                .register(&request.login, &request.email, &request.password)
        })
        .await?;

    tracing::info!(login = %login, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("registered")),
    ))
}

/// Log in and set the session cookie.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    let login = request.login.trim().to_string();
    let session = state
        .run(move |state| state.auth.login(&request.login, &request.password))
        .await
        .inspect_err(|e| tracing::warn!(login = %login, reason = %e, "Login failed"))?;

    tracing::info!(login = %login, "User logged in");
    let jar = jar.add(session_cookie(
        &session,
        state.config.session_ttl_secs,
        state.config.cookie_secure,
    ));
    Ok((
        jar,
        Json(LoginResponse {
            login,
            expires_at: session.expires_at,
        }),
    ))
}

/// Delete the session and clear the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    let token = session_token(&jar);
    state
        .run(move |state| state.auth.logout(token.as_deref()))
        .await?;

    Ok((
        jar.remove(cleared_session_cookie()),
        Json(MessageResponse::new("logged out")),
    ))
}

/// Report the identity behind the session cookie.
pub async fn check_session_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<Json<SessionResponse>> {
    let token = session_token(&jar);
    let user = state
        .run(move |state| state.auth.require_auth(token.as_deref()))
        .await?;
    Ok(Json(SessionResponse { login: user.login }))
}
