use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intervue_db::Db;
use intervue_db::models::{FraudAlert, Insight, InsightCategory, InsightSeverity};
use sqlx::FromRow;
use uuid::Uuid;

use super::{DaoError, DaoResult, InsightStore, NewFraudAlert, NewInsight};

pub struct PgInsightStore {
    db: Db,
}

impl PgInsightStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct InsightRow {
    id: Uuid,
    round_id: Uuid,
    insight_type: String,
    category: String,
    severity: String,
    timestamp_ms: i64,
    value: serde_json::Value,
    explanation: Option<String>,
    model_version: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InsightRow> for Insight {
    type Error = DaoError;

    fn try_from(row: InsightRow) -> Result<Self, Self::Error> {
        let category = InsightCategory::parse(&row.category)
            .ok_or_else(|| DaoError::Decode(format!("unknown category {:?}", row.category)))?;
        let severity = InsightSeverity::parse(&row.severity)
            .ok_or_else(|| DaoError::Decode(format!("unknown severity {:?}", row.severity)))?;

        Ok(Insight {
            id: row.id,
            round_id: row.round_id,
            insight_type: row.insight_type,
            category,
            severity,
            timestamp_ms: row.timestamp_ms,
            value: row.value,
            explanation: row.explanation,
            model_version: row.model_version,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct FraudAlertRow {
    id: Uuid,
    insight_id: Uuid,
    round_id: Uuid,
    alert_type: String,
    severity: String,
    confidence: f64,
    evidence: serde_json::Value,
    acknowledged: bool,
    false_positive: bool,
    acknowledged_by: Option<Uuid>,
    acknowledged_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FraudAlertRow> for FraudAlert {
    type Error = DaoError;

    fn try_from(row: FraudAlertRow) -> Result<Self, Self::Error> {
        let severity = InsightSeverity::parse(&row.severity)
            .ok_or_else(|| DaoError::Decode(format!("unknown severity {:?}", row.severity)))?;

        Ok(FraudAlert {
            id: row.id,
            insight_id: row.insight_id,
            round_id: row.round_id,
            alert_type: row.alert_type,
            severity,
            confidence: row.confidence,
            evidence: row.evidence,
            acknowledged: row.acknowledged,
            false_positive: row.false_positive,
            acknowledged_by: row.acknowledged_by,
            acknowledged_at: row.acknowledged_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl InsightStore for PgInsightStore {
    async fn insert_insight(&self, insight: &NewInsight) -> DaoResult<Insight> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, round_id, insight_type, category, severity,
                            timestamp_ms, value, explanation, model_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            Insight::TABLE
        ))
        .bind(id)
        .bind(insight.round_id)
        .bind(&insight.insight_type)
        .bind(insight.category.as_str())
        .bind(insight.severity.as_str())
        .bind(insight.timestamp_ms)
        .bind(&insight.value)
        .bind(&insight.explanation)
        .bind(&insight.model_version)
        .bind(created_at)
        .execute(self.db.pool())
        .await?;

        Ok(Insight {
            id,
            round_id: insight.round_id,
            insight_type: insight.insight_type.clone(),
            category: insight.category,
            severity: insight.severity,
            timestamp_ms: insight.timestamp_ms,
            value: insight.value.clone(),
            explanation: insight.explanation.clone(),
            model_version: insight.model_version.clone(),
            created_at,
        })
    }

    async fn recent_insights(&self, round_id: Uuid, window: Duration) -> DaoResult<Vec<Insight>> {
        let since = Utc::now()
            - chrono::Duration::from_std(window)
                .map_err(|e| DaoError::Decode(format!("window out of range: {e}")))?;

        let rows: Vec<InsightRow> = sqlx::query_as(&format!(
            r#"
            SELECT id, round_id, insight_type, category, severity,
                   timestamp_ms, value, explanation, model_version, created_at
            FROM {}
            WHERE round_id = $1 AND created_at >= $2
            ORDER BY created_at ASC
            "#,
            Insight::TABLE
        ))
        .bind(round_id)
        .bind(since)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Insight::try_from).collect()
    }

    async fn insert_alert(&self, alert: &NewFraudAlert) -> DaoResult<FraudAlert> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, insight_id, round_id, alert_type, severity,
                            confidence, evidence, acknowledged, false_positive, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, FALSE, $8)
            "#,
            FraudAlert::TABLE
        ))
        .bind(id)
        .bind(alert.insight_id)
        .bind(alert.round_id)
        .bind(&alert.alert_type)
        .bind(alert.severity.as_str())
        .bind(alert.confidence)
        .bind(&alert.evidence)
        .bind(created_at)
        .execute(self.db.pool())
        .await?;

        Ok(FraudAlert {
            id,
            insight_id: alert.insight_id,
            round_id: alert.round_id,
            alert_type: alert.alert_type.clone(),
            severity: alert.severity,
            confidence: alert.confidence,
            evidence: alert.evidence.clone(),
            acknowledged: false,
            false_positive: false,
            acknowledged_by: None,
            acknowledged_at: None,
            created_at,
        })
    }

    async fn list_alerts(&self, round_id: Uuid) -> DaoResult<Vec<FraudAlert>> {
        let rows: Vec<FraudAlertRow> = sqlx::query_as(&format!(
            r#"
            SELECT id, insight_id, round_id, alert_type, severity, confidence,
                   evidence, acknowledged, false_positive, acknowledged_by,
                   acknowledged_at, created_at
            FROM {}
            WHERE round_id = $1
            ORDER BY created_at DESC
            "#,
            FraudAlert::TABLE
        ))
        .bind(round_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(FraudAlert::try_from).collect()
    }

    async fn acknowledge_alert(
        &self,
        round_id: Uuid,
        alert_id: Uuid,
        acknowledged_by: Uuid,
        false_positive: bool,
    ) -> DaoResult<FraudAlert> {
        let row: Option<FraudAlertRow> = sqlx::query_as(&format!(
            r#"
            UPDATE {}
            SET acknowledged = TRUE,
                false_positive = $1,
                acknowledged_by = $2,
                acknowledged_at = $3
            WHERE id = $4 AND round_id = $5
            RETURNING id, insight_id, round_id, alert_type, severity, confidence,
                      evidence, acknowledged, false_positive, acknowledged_by,
                      acknowledged_at, created_at
            "#,
            FraudAlert::TABLE
        ))
        .bind(false_positive)
        .bind(acknowledged_by)
        .bind(Utc::now())
        .bind(alert_id)
        .bind(round_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(FraudAlert::try_from)
            .transpose()?
            .ok_or(DaoError::NotFound)
    }
}
