use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

use crate::auth::{decode_session, JwtSettings};
use crate::types::UserSession;

/// Caller session attached by `session_middleware`; `None` for anonymous requests
#[derive(Clone, Debug, Default)]
pub struct RequestSession(pub Option<UserSession>);

/// Decode the bearer token, if any, and attach the session to the request.
///
/// Never rejects: whether a session is required is decided per route by the
/// dispatcher, so a missing or bad token only means "no session".
pub async fn session_middleware(State(jwt): State<JwtSettings>, mut request: Request, next: Next) -> Response {
    let session = match extract_jwt_from_headers(request.headers()) {
        Ok(Some(token)) => match decode_session(&jwt, &token) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!("Ignoring bearer token: {}", e);
                None
            }
        },
        Ok(None) => None,
        Err(msg) => {
            tracing::debug!("Ignoring Authorization header: {}", msg);
            None
        }
    };

    request.extensions_mut().insert(RequestSession(session));
    next.run(request).await
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(Some(token.trim().to_string()))
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<RequestSession>().cloned().unwrap_or_default())
    }
}
