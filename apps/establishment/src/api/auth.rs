//! # Session Cookie Authentication
//!
//! The session id travels in the `session_id` cookie. Mutating routes sit
//! behind [`require_session`], which validates the cookie against the core
//! authenticator and stores the caller's [`PublicUser`] in the request
//! extensions.

use super::{AppState, error::ApiError};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use establishment_core::{PublicUser, Session};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session_id";

/// Build the cookie carrying a freshly issued session.
///
/// `Max-Age` matches the session lifetime so the cookie outlives a browser
/// restart but not the session.
pub fn session_cookie(session: &Session, ttl_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.id.clone()))
        .max_age(time::Duration::seconds(ttl_secs))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .build()
}

/// A removal cookie matching [`session_cookie`]'s path.
pub fn cleared_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// The session id presented by the client, if any.
pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Gate for protected routes.
///
/// Rejects with 401 when the cookie is missing, unknown or expired.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = session_token(&jar);
    let result = state
        .run(move |state| state.auth.require_auth(token.as_deref()))
        .await;

    match result {
        Ok(user) => {
            request.extensions_mut().insert::<PublicUser>(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                event = "auth_failure",
                path = %request.uri().path(),
                reason = %e,
                "Rejected unauthenticated request"
            );
            ApiError(e).into_response()
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
