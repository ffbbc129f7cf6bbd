use axum::Json;
use axum::extract::{Path, State};
use intervue_db::models::FraudAlert;
use intervue_services::auth::Role;
use serde::Deserialize;
use uuid::Uuid;

use super::ensure_round_access;
use crate::error::ApiError;
use crate::extractors::AuthedUser;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    AuthedUser(identity): AuthedUser,
    Path(round_id): Path<Uuid>,
) -> Result<Json<Vec<FraudAlert>>, ApiError> {
    ensure_round_access(&state, &identity, round_id).await?;

    let alerts = state.store.list_alerts(round_id).await?;
    Ok(Json(alerts))
}

#[derive(Debug, Deserialize, Default)]
pub struct AckRequest {
    #[serde(default)]
    pub false_positive: bool,
}

/// Acknowledgment mutates the persisted alert only; delivery of future
/// events is unaffected. Candidates cannot acknowledge their own alerts.
pub async fn acknowledge(
    State(state): State<AppState>,
    AuthedUser(identity): AuthedUser,
    Path((round_id, alert_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<AckRequest>,
) -> Result<Json<FraudAlert>, ApiError> {
    if identity.role == Role::Candidate {
        return Err(ApiError::Forbidden(
            "Interviewer role required".to_string(),
        ));
    }
    ensure_round_access(&state, &identity, round_id).await?;

    let alert = state
        .store
        .acknowledge_alert(round_id, alert_id, identity.id, request.false_positive)
        .await?;
    Ok(Json(alert))
}
