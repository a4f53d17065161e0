use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::{error::ModelError, models::user::User, state::AppState};

/// Cookie carrying the remember-token plaintext.
pub const REMEMBER_COOKIE: &str = "remember_token";

/// Paths that skip identity resolution. Only an optimisation for static
/// content; the require gate still applies wherever it is layered.
const EXEMPT_PREFIXES: &[&str] = &["/assets/", "/images/"];

/// The caller resolved for this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Credential {
    Signed(String),
    Remember(String),
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn is_exempt(path: &str) -> bool {
    EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = auth.trim_start().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v)
}

/// Picks one credential: `token` query parameter, then bearer header, then
/// the remember cookie. A signed token wins outright; the cookie is only
/// consulted when no signed token was sent.
pub(crate) fn extract_credential(uri: &Uri, headers: &HeaderMap) -> Option<Credential> {
    let from_query = Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty());
    if let Some(token) = from_query {
        return Some(Credential::Signed(token));
    }
    if let Some(token) = bearer_token(headers) {
        return Some(Credential::Signed(token.to_string()));
    }
    cookie(headers, REMEMBER_COOKIE).map(|v| Credential::Remember(v.to_string()))
}

async fn lookup(state: &AppState, credential: Credential) -> Result<User, ModelError> {
    match credential {
        Credential::Signed(token) => {
            let claims = state.keys.verify(&token).map_err(|e| {
                debug!(error = %e, "signed token rejected");
                ModelError::TokenInvalid
            })?;
            state.users.by_id(claims.user_id).await
        }
        Credential::Remember(token) => state.users.by_remember(&token).await,
    }
}

/// Attaches [`CurrentUser`] when the request carries a credential that
/// resolves. Never rejects; unresolved requests continue anonymously.
pub async fn resolve_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if is_exempt(req.uri().path()) {
        return next.run(req).await;
    }

    if let Some(credential) = extract_credential(req.uri(), req.headers()) {
        match lookup(&state, credential).await {
            Ok(user) => {
                debug!(user_id = user.id, "request identity resolved");
                req.extensions_mut().insert(CurrentUser(user));
            }
            Err(e) if e.is_fatal() => error!(error = %e, "identity lookup failed"),
            Err(e) => debug!(error = %e, "credential did not resolve"),
        }
    }

    next.run(req).await
}

/// Rejects requests that [`resolve_user`] left anonymous.
pub async fn require_user(req: Request, next: Next) -> Result<Response, (StatusCode, String)> {
    if req.extensions().get::<CurrentUser>().is_none() {
        return Err(unauthenticated());
    }
    Ok(next.run(req).await)
}

fn unauthenticated() -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(unauthenticated)
    }
}
