pub mod alert;
pub mod health;
pub mod insight;

use intervue_services::auth::Identity;
use intervue_services::rooms;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// REST-side mirror of the join access predicate. A failed ownership
/// lookup denies, same as the room join path.
pub(crate) async fn ensure_round_access(
    state: &AppState,
    identity: &Identity,
    round_id: Uuid,
) -> Result<(), ApiError> {
    let ownership = match state.directory.ownership(round_id).await {
        Ok(ownership) => ownership,
        Err(e) => {
            warn!(%round_id, %e, "ownership lookup failed, denying access");
            return Err(ApiError::Forbidden(
                "Not authorized for this round".to_string(),
            ));
        }
    };

    match ownership {
        Some(ownership) if rooms::authorized(identity, &ownership) => Ok(()),
        _ => Err(ApiError::Forbidden(
            "Not authorized for this round".to_string(),
        )),
    }
}
