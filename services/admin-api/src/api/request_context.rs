//! Request-scoped context extracted from HTTP requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::api::error::ApiError;

pub const AUTHORIZATION_HEADER: &str = "Authorization";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub actor_id: String,
    pub actor_email: Option<String>,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn actor_from_authorization_header(
    headers: &HeaderMap,
    request_id: &str,
) -> Result<Option<(String, Option<String>)>, ApiError> {
    let Some(auth_value) = header_string(headers, AUTHORIZATION_HEADER) else {
        return Ok(None);
    };

    let auth_value = auth_value.trim();
    let Some(token) = auth_value.strip_prefix("Bearer ") else {
        return Err(ApiError::unauthorized(
            "invalid_authorization",
            "Authorization must be a Bearer token",
        )
        .with_request_id(request_id.to_string()));
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized(
            "invalid_authorization",
            "Authorization Bearer token cannot be empty",
        )
        .with_request_id(request_id.to_string()));
    }

    // v1 dev stub:
    // - `user:<email>` tokens are treated as a staff identity with an email.
    // - other tokens are treated as opaque and mapped to a stable hashed actor id.
    if let Some(email) = token.strip_prefix("user:") {
        let email = email.trim();
        if email.is_empty() || email.len() > 320 || !email.contains('@') {
            return Err(ApiError::unauthorized(
                "invalid_token",
                "user token must be in the form 'user:<email>'",
            )
            .with_request_id(request_id.to_string()));
        }

        // Important: never persist or log bearer tokens. Derive a stable, non-secret actor id.
        let digest = Sha256::digest(email.as_bytes());
        let hex = format!("{:x}", digest);
        let short = hex.get(..32).unwrap_or(&hex);

        return Ok(Some((format!("usr_{short}"), Some(email.to_string()))));
    }

    let digest = Sha256::digest(token.as_bytes());
    let hex = format!("{:x}", digest);
    let short = hex.get(..32).unwrap_or(&hex);

    Ok(Some((format!("usr_{short}"), None)))
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, "x-request-id")
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (actor_id, actor_email) =
            actor_from_authorization_header(&parts.headers, &request_id)?
                .unwrap_or(("anonymous".to_string(), None));

        Ok(Self {
            request_id,
            actor_id,
            actor_email,
        })
    }
}
