use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use intervue_config::InsightSettings;
use intervue_db::models::{Insight, InsightCategory, InsightSeverity};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dao::{InsightStore, NewFraudAlert, NewInsight};
use crate::fanout::RoomBus;

use super::event::{self, InsightValue};

/// Consumes analysis results, persists them, promotes qualifying fraud
/// signals to alerts, and fans both out to the owning room.
pub struct InsightEngine {
    store: Arc<dyn InsightStore>,
    bus: Arc<dyn RoomBus>,
    default_alert_confidence: f64,
}

impl InsightEngine {
    pub fn new(
        store: Arc<dyn InsightStore>,
        bus: Arc<dyn RoomBus>,
        settings: &InsightSettings,
    ) -> Self {
        Self {
            store,
            bus,
            default_alert_confidence: settings.default_alert_confidence,
        }
    }

    /// One raw message from a result topic. Malformed input is dropped and
    /// logged; nothing here may take the subscriber loop down.
    pub async fn handle_message(&self, topic_category: InsightCategory, payload: &str) {
        match event::parse_result(topic_category, payload) {
            Ok(insight) => self.process(insight).await,
            Err(e) => {
                warn!(category = topic_category.as_str(), %e, "dropping malformed analysis result");
            }
        }
    }

    /// Persist, promote, broadcast. Persistence failure is tolerated for
    /// live delivery but blocks promotion: an alert row must reference a
    /// persisted insight row, so there is never a dangling alert.
    pub async fn process(&self, new_insight: NewInsight) {
        let round_id = new_insight.round_id;

        let persisted = match self.store.insert_insight(&new_insight).await {
            Ok(insight) => Some(insight),
            Err(e) => {
                warn!(%round_id, %e, "insight persistence failed, delivering live only");
                None
            }
        };

        if qualifies_for_promotion(&new_insight) {
            match &persisted {
                Some(insight) => self.promote(insight).await,
                None => {
                    warn!(%round_id, insight_type = %new_insight.insight_type,
                          "fraud promotion skipped, source insight was not persisted");
                }
            }
        }

        let insight = persisted.unwrap_or_else(|| ephemeral(new_insight));
        debug!(%round_id, insight_type = %insight.insight_type, "broadcasting insight");
        self.bus
            .publish(round_id, json!({ "type": "insight", "data": insight }))
            .await;
    }

    async fn promote(&self, insight: &Insight) {
        let confidence = InsightValue::from_wire(&insight.insight_type, &insight.value)
            .confidence()
            .unwrap_or(self.default_alert_confidence);

        let alert = NewFraudAlert {
            insight_id: insight.id,
            round_id: insight.round_id,
            alert_type: insight.insight_type.clone(),
            severity: insight.severity,
            confidence,
            evidence: insight.value.clone(),
        };

        match self.store.insert_alert(&alert).await {
            Ok(stored) => {
                info!(round_id = %insight.round_id, alert_type = %stored.alert_type,
                      severity = stored.severity.as_str(), "fraud alert raised");
                let message = insight
                    .explanation
                    .clone()
                    .unwrap_or_else(|| format!("Fraud signal: {}", stored.alert_type));
                self.bus
                    .publish(
                        insight.round_id,
                        json!({
                            "type": "fraud-alert",
                            "data": {
                                "alertId": stored.id,
                                "insightId": stored.insight_id,
                                "type": stored.alert_type,
                                "severity": stored.severity,
                                "timestamp": insight.timestamp_ms,
                                "confidence": stored.confidence,
                                "message": message,
                            },
                        }),
                    )
                    .await;
            }
            Err(e) => {
                warn!(round_id = %insight.round_id, %e, "fraud alert persistence failed");
            }
        }
    }
}

/// Promotion predicate: fraud-category signals at HIGH or above.
pub fn qualifies_for_promotion(insight: &NewInsight) -> bool {
    insight.category == InsightCategory::Fraud && insight.severity >= InsightSeverity::High
}

/// A delivery-only insight used when the store rejected the write; carries
/// a fresh id so clients can still key it.
fn ephemeral(new_insight: NewInsight) -> Insight {
    Insight {
        id: Uuid::new_v4(),
        round_id: new_insight.round_id,
        insight_type: new_insight.insight_type,
        category: new_insight.category,
        severity: new_insight.severity,
        timestamp_ms: new_insight.timestamp_ms,
        value: new_insight.value,
        explanation: new_insight.explanation,
        model_version: new_insight.model_version,
        created_at: Utc::now(),
    }
}

/// Long-running subscription over the four analysis-result topics. A bad
/// message never ends the loop; a broker failure backs off and
/// resubscribes, mirroring the workers' own consumer loops.
pub async fn run_result_subscriber(engine: Arc<InsightEngine>, redis_url: String) {
    loop {
        match subscribe_once(&engine, &redis_url).await {
            Ok(()) => warn!("analysis result stream ended, resubscribing"),
            Err(e) => warn!(%e, "analysis result subscription failed, retrying"),
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn subscribe_once(engine: &InsightEngine, redis_url: &str) -> Result<(), redis::RedisError> {
    let client = redis::Client::open(redis_url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    for (topic, _) in event::RESULT_TOPICS {
        pubsub.subscribe(topic).await?;
    }
    info!("subscribed to analysis result topics");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let Some(category) = event::category_for_topic(msg.get_channel_name()) else {
            continue;
        };
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(%e, "unreadable analysis result payload");
                continue;
            }
        };
        engine.handle_message(category, &payload).await;
    }
    Ok(())
}
