//! Idempotent schema bootstrap. The canonical definitions live in the
//! deployment migrations; this mirrors them so a fresh dev database works
//! without a separate migration step. `interview_rounds` is owned by the
//! scheduling service — created here only so local stacks can seed it.

use crate::Db;

impl Db {
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS interview_rounds (
                id UUID PRIMARY KEY,
                candidate_id UUID NOT NULL,
                interviewer_id UUID,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS live_insights (
                id UUID PRIMARY KEY,
                round_id UUID NOT NULL,
                insight_type TEXT NOT NULL,
                category TEXT NOT NULL,
                severity TEXT NOT NULL,
                timestamp_ms BIGINT NOT NULL,
                value JSONB NOT NULL DEFAULT '{}',
                explanation TEXT,
                model_version TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_live_insights_round_created
            ON live_insights(round_id, created_at)
            "#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fraud_alerts (
                id UUID PRIMARY KEY,
                insight_id UUID NOT NULL REFERENCES live_insights(id),
                round_id UUID NOT NULL,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                confidence DOUBLE PRECISION NOT NULL,
                evidence JSONB NOT NULL DEFAULT '{}',
                acknowledged BOOLEAN NOT NULL DEFAULT FALSE,
                false_positive BOOLEAN NOT NULL DEFAULT FALSE,
                acknowledged_by UUID,
                acknowledged_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_fraud_alerts_round
            ON fraud_alerts(round_id)
            "#,
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
