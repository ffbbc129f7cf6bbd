pub mod insight;
pub mod round;

use std::time::Duration;

use async_trait::async_trait;
use intervue_db::models::{FraudAlert, Insight, InsightCategory, InsightSeverity};
use uuid::Uuid;

pub use insight::PgInsightStore;
pub use round::PgRoundDirectory;

pub type DaoResult<T> = Result<T, DaoError>;

#[derive(Debug, thiserror::Error)]
pub enum DaoError {
    #[error("resource not found")]
    NotFound,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("stored row is corrupt: {0}")]
    Decode(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Ownership view used by the access predicate during `join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOwnership {
    pub candidate_id: Uuid,
    pub interviewer_id: Option<Uuid>,
}

/// Round ownership lookups against the metadata store. A failed lookup
/// must be treated as deny by callers, never as allow.
#[async_trait]
pub trait RoundDirectory: Send + Sync {
    /// `Ok(None)` means the round does not exist.
    async fn ownership(&self, round_id: Uuid) -> DaoResult<Option<RoundOwnership>>;
}

#[derive(Debug, Clone)]
pub struct NewInsight {
    pub round_id: Uuid,
    pub insight_type: String,
    pub category: InsightCategory,
    pub severity: InsightSeverity,
    pub timestamp_ms: i64,
    pub value: serde_json::Value,
    pub explanation: Option<String>,
    pub model_version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFraudAlert {
    pub insight_id: Uuid,
    pub round_id: Uuid,
    pub alert_type: String,
    pub severity: InsightSeverity,
    pub confidence: f64,
    pub evidence: serde_json::Value,
}

/// Insert-only persistence for insights and alerts, plus the reads the
/// relay itself needs (catch-up and the alert dashboard endpoints).
/// Rows are never deleted; alerts are only annotated by acknowledgment.
#[async_trait]
pub trait InsightStore: Send + Sync {
    async fn insert_insight(&self, insight: &NewInsight) -> DaoResult<Insight>;

    /// Insights persisted for the round within the trailing `window`.
    async fn recent_insights(&self, round_id: Uuid, window: Duration) -> DaoResult<Vec<Insight>>;

    async fn insert_alert(&self, alert: &NewFraudAlert) -> DaoResult<FraudAlert>;

    async fn list_alerts(&self, round_id: Uuid) -> DaoResult<Vec<FraudAlert>>;

    /// Marks an alert acknowledged. Returns `NotFound` if the alert does not
    /// belong to the round.
    async fn acknowledge_alert(
        &self,
        round_id: Uuid,
        alert_id: Uuid,
        acknowledged_by: Uuid,
        false_positive: bool,
    ) -> DaoResult<FraudAlert>;
}
