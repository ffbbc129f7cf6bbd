use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use intervue_services::auth::Identity;

use crate::error::ApiError;
use crate::state::AppState;

/// Bearer-token authentication for the REST surface; the same verifier
/// gates the WebSocket handshake.
pub struct AuthedUser(pub Identity);

impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".to_string()))?;

        let identity = state.auth.verify(token)?;
        Ok(AuthedUser(identity))
    }
}
