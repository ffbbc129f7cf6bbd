use async_trait::async_trait;
use intervue_db::Db;
use intervue_db::models::InterviewRound;
use uuid::Uuid;

use super::{DaoResult, RoundDirectory, RoundOwnership};

/// Read-only view over the scheduling service's `interview_rounds` table.
pub struct PgRoundDirectory {
    db: Db,
}

impl PgRoundDirectory {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RoundDirectory for PgRoundDirectory {
    async fn ownership(&self, round_id: Uuid) -> DaoResult<Option<RoundOwnership>> {
        let row: Option<(Uuid, Option<Uuid>)> = sqlx::query_as(&format!(
            "SELECT candidate_id, interviewer_id FROM {} WHERE id = $1",
            InterviewRound::TABLE
        ))
        .bind(round_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|(candidate_id, interviewer_id)| RoundOwnership {
            candidate_id,
            interviewer_id,
        }))
    }
}
