use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::identity::{Identity, Resolved, resolve_identity};
use super::password::CredentialHasher;
use crate::server::AppState;

/// Extractor for operations that must be authenticated (project PUT/DELETE).
/// A candidate identity passes; persisting it stays the handler's call.
pub struct RequireIdentity(pub Identity);

/// Extractor for operations where authentication is optional (build POST).
pub struct OptionalIdentity(pub Option<Identity>);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidHeader,
    WrongPassword,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidHeader => (StatusCode::UNAUTHORIZED, "Invalid authorization header"),
            AuthError::WrongPassword => (StatusCode::FORBIDDEN, "Invalid credentials"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "error": message });
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                "Basic realm=\"pony\"".parse().unwrap(),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireIdentity {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state)? {
            Resolved::Anonymous => Err(AuthError::MissingAuth),
            Resolved::Invalid => Err(AuthError::InvalidHeader),
            Resolved::Existing(identity) => {
                check_password(&identity)?;
                Ok(RequireIdentity(identity))
            }
            Resolved::Candidate(identity) => Ok(RequireIdentity(identity)),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for OptionalIdentity {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state)? {
            Resolved::Anonymous => Ok(OptionalIdentity(None)),
            Resolved::Invalid => Err(AuthError::InvalidHeader),
            Resolved::Existing(identity) => {
                check_password(&identity)?;
                Ok(OptionalIdentity(Some(identity)))
            }
            Resolved::Candidate(identity) => Ok(OptionalIdentity(Some(identity))),
        }
    }
}

fn resolve(parts: &Parts, state: &Arc<AppState>) -> Result<Resolved, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let hasher = CredentialHasher::new();
    resolve_identity(state.store.as_ref(), &hasher, auth_header)
        .map_err(|_| AuthError::InternalError)
}

/// A candidate's password trivially matches its own fresh hash, so only
/// existing accounts are actually checked here.
fn check_password(identity: &Identity) -> Result<(), AuthError> {
    let hasher = CredentialHasher::new();
    let ok = hasher
        .verify(&identity.password, &identity.user.password_hash)
        .map_err(|_| AuthError::InternalError)?;
    if ok { Ok(()) } else { Err(AuthError::WrongPassword) }
}
