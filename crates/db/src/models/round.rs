use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ownership view of an interview round. Rounds are created and mutated by
/// the scheduling service; the relay only reads them for access control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRound {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub interviewer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl InterviewRound {
    pub const TABLE: &'static str = "interview_rounds";
}
