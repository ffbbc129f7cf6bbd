use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InsightSeverity;

/// A promoted high-severity fraud insight, tracked until a human
/// acknowledges it. References exactly one persisted insight row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudAlert {
    pub id: Uuid,
    pub insight_id: Uuid,
    pub round_id: Uuid,
    pub alert_type: String,
    pub severity: InsightSeverity,
    pub confidence: f64,
    pub evidence: serde_json::Value,
    pub acknowledged: bool,
    pub false_positive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FraudAlert {
    pub const TABLE: &'static str = "fraud_alerts";
}
