//! Request authentication.
//!
//! [`AuthenticatedUser`] is an extractor. Any handler that takes it as its first argument can
//! only run once the `Authorization` header has passed the [`attic_core::AccessGate`].

use crate::error::ApiError;
use crate::AppState;
use api_shared::parse_basic_authorization;
use attic_core::Identity;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The account that made the request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let credentials = parse_basic_authorization(header).map_err(|e| {
            tracing::debug!("unusable authorization header: {}", e);
            ApiError::Unauthenticated
        })?;

        // Argon2 verification is CPU bound; keep it off the async workers.
        let gate = state.gate.clone();
        let identity = tokio::task::spawn_blocking(move || {
            gate.authenticate(&credentials.username, &credentials.password)
        })
        .await?;

        identity.map(Self).ok_or(ApiError::Unauthenticated)
    }
}
