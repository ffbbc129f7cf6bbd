use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use intervue_db::models::Insight;
use uuid::Uuid;

use super::ensure_round_access;
use crate::error::ApiError;
use crate::extractors::AuthedUser;
use crate::state::AppState;

/// Insights persisted within the catch-up window, for dashboard reloads.
/// The live stream stays on the WebSocket.
pub async fn list_recent(
    State(state): State<AppState>,
    AuthedUser(identity): AuthedUser,
    Path(round_id): Path<Uuid>,
) -> Result<Json<Vec<Insight>>, ApiError> {
    ensure_round_access(&state, &identity, round_id).await?;

    let window = Duration::from_secs(state.settings.insights.catch_up_window_secs);
    let insights = state.store.recent_insights(round_id, window).await?;
    Ok(Json(insights))
}
