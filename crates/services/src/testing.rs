//! In-memory implementations of the relay's external seams (metadata
//! store, insight store, broker, media log, fraud probe). Used by the
//! test crates; also handy for running the relay without backing services
//! in local experiments.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use intervue_db::models::{FraudAlert, Insight};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::analysis::AnalysisError;
use crate::dao::{
    DaoError, DaoResult, InsightStore, NewFraudAlert, NewInsight, RoundDirectory, RoundOwnership,
};
use crate::fanout::{RoomBus, RoomEvent};
use crate::ingest::{FraudProbe, IngestError, MediaFragment, MediaLog};

pub struct MemoryRoundDirectory {
    rounds: DashMap<Uuid, RoundOwnership>,
    fail_lookups: AtomicBool,
}

impl MemoryRoundDirectory {
    pub fn new() -> Self {
        Self {
            rounds: DashMap::new(),
            fail_lookups: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, round_id: Uuid, ownership: RoundOwnership) {
        self.rounds.insert(round_id, ownership);
    }

    /// Simulates a metadata-store outage; lookups return an error until
    /// reset.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryRoundDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoundDirectory for MemoryRoundDirectory {
    async fn ownership(&self, round_id: Uuid) -> DaoResult<Option<RoundOwnership>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(DaoError::Unavailable("simulated outage".to_string()));
        }
        Ok(self.rounds.get(&round_id).map(|r| *r.value()))
    }
}

pub struct MemoryInsightStore {
    insights: Mutex<Vec<Insight>>,
    alerts: Mutex<Vec<FraudAlert>>,
    fail_insight_inserts: AtomicBool,
    fail_alert_inserts: AtomicBool,
}

impl MemoryInsightStore {
    pub fn new() -> Self {
        Self {
            insights: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
            fail_insight_inserts: AtomicBool::new(false),
            fail_alert_inserts: AtomicBool::new(false),
        }
    }

    pub fn fail_insight_inserts(&self, fail: bool) {
        self.fail_insight_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_alert_inserts(&self, fail: bool) {
        self.fail_alert_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn insights(&self) -> Vec<Insight> {
        self.insights.lock().clone()
    }

    pub fn alerts(&self) -> Vec<FraudAlert> {
        self.alerts.lock().clone()
    }

    /// Inserts an insight row with an explicit `created_at`, for exercising
    /// the catch-up window.
    pub fn seed_insight_at(&self, insight: &NewInsight, created_at: DateTime<Utc>) -> Insight {
        let row = Insight {
            id: Uuid::new_v4(),
            round_id: insight.round_id,
            insight_type: insight.insight_type.clone(),
            category: insight.category,
            severity: insight.severity,
            timestamp_ms: insight.timestamp_ms,
            value: insight.value.clone(),
            explanation: insight.explanation.clone(),
            model_version: insight.model_version.clone(),
            created_at,
        };
        self.insights.lock().push(row.clone());
        row
    }
}

impl Default for MemoryInsightStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsightStore for MemoryInsightStore {
    async fn insert_insight(&self, insight: &NewInsight) -> DaoResult<Insight> {
        if self.fail_insight_inserts.load(Ordering::SeqCst) {
            return Err(DaoError::Unavailable("simulated outage".to_string()));
        }
        Ok(self.seed_insight_at(insight, Utc::now()))
    }

    async fn recent_insights(&self, round_id: Uuid, window: Duration) -> DaoResult<Vec<Insight>> {
        let since = Utc::now()
            - chrono::Duration::from_std(window)
                .map_err(|e| DaoError::Decode(format!("window out of range: {e}")))?;
        Ok(self
            .insights
            .lock()
            .iter()
            .filter(|i| i.round_id == round_id && i.created_at >= since)
            .cloned()
            .collect())
    }

    async fn insert_alert(&self, alert: &NewFraudAlert) -> DaoResult<FraudAlert> {
        if self.fail_alert_inserts.load(Ordering::SeqCst) {
            return Err(DaoError::Unavailable("simulated outage".to_string()));
        }
        let row = FraudAlert {
            id: Uuid::new_v4(),
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
            created_at: Utc::now(),
        };
        self.alerts.lock().push(row.clone());
        Ok(row)
    }

    async fn list_alerts(&self, round_id: Uuid) -> DaoResult<Vec<FraudAlert>> {
        Ok(self
            .alerts
            .lock()
            .iter()
            .filter(|a| a.round_id == round_id)
            .cloned()
            .collect())
    }

    async fn acknowledge_alert(
        &self,
        round_id: Uuid,
        alert_id: Uuid,
        acknowledged_by: Uuid,
        false_positive: bool,
    ) -> DaoResult<FraudAlert> {
        let mut alerts = self.alerts.lock();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.round_id == round_id)
            .ok_or(DaoError::NotFound)?;
        alert.acknowledged = true;
        alert.false_positive = false_positive;
        alert.acknowledged_by = Some(acknowledged_by);
        alert.acknowledged_at = Some(Utc::now());
        Ok(alert.clone())
    }
}

#[derive(Clone)]
struct BrokerFrame {
    origin: Uuid,
    round_id: Uuid,
    event: serde_json::Value,
}

/// Stand-in for the shared pub/sub broker. Every `MemoryRoomBus` attached
/// to the same broker behaves like a relay instance on the same Redis.
pub struct MemoryBroker {
    tx: broadcast::Sender<BrokerFrame>,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(256);
        Arc::new(Self { tx })
    }
}

pub struct MemoryRoomBus {
    instance_id: Uuid,
    broker: Option<Arc<MemoryBroker>>,
    subscribed: Arc<DashSet<Uuid>>,
    local_tx: mpsc::UnboundedSender<RoomEvent>,
}

impl MemoryRoomBus {
    /// `broker: None` models a broker outage: publishes still reach local
    /// members, nothing crosses instances.
    pub fn new(
        broker: Option<Arc<MemoryBroker>>,
        local_tx: mpsc::UnboundedSender<RoomEvent>,
    ) -> Self {
        let instance_id = Uuid::new_v4();
        let subscribed: Arc<DashSet<Uuid>> = Arc::new(DashSet::new());

        if let Some(broker) = &broker {
            let mut rx = broker.tx.subscribe();
            let subscribed = subscribed.clone();
            let local_tx = local_tx.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(frame) => {
                            if frame.origin != instance_id && subscribed.contains(&frame.round_id) {
                                let _ = local_tx.send(RoomEvent {
                                    round_id: frame.round_id,
                                    event: frame.event,
                                });
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }

        Self {
            instance_id,
            broker,
            subscribed,
            local_tx,
        }
    }
}

#[async_trait]
impl RoomBus for MemoryRoomBus {
    async fn publish(&self, round_id: Uuid, event: serde_json::Value) {
        let _ = self.local_tx.send(RoomEvent {
            round_id,
            event: event.clone(),
        });
        if let Some(broker) = &self.broker {
            let _ = broker.tx.send(BrokerFrame {
                origin: self.instance_id,
                round_id,
                event,
            });
        }
    }

    async fn subscribe(&self, round_id: Uuid) {
        self.subscribed.insert(round_id);
    }

    async fn unsubscribe(&self, round_id: Uuid) {
        self.subscribed.remove(&round_id);
    }
}

pub struct MemoryMediaLog {
    records: Mutex<Vec<(MediaFragment, Uuid)>>,
    fail_appends: AtomicBool,
}

impl MemoryMediaLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_appends: AtomicBool::new(false),
        }
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<(MediaFragment, Uuid)> {
        self.records.lock().clone()
    }
}

impl Default for MemoryMediaLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaLog for MemoryMediaLog {
    async fn append(&self, fragment: &MediaFragment, submitter_id: Uuid) -> Result<(), IngestError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(IngestError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "simulated outage",
            ))));
        }
        self.records.lock().push((fragment.clone(), submitter_id));
        Ok(())
    }
}

pub struct MemoryFraudProbe {
    calls: Mutex<Vec<MediaFragment>>,
    fail_calls: AtomicBool,
}

impl MemoryFraudProbe {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_calls: AtomicBool::new(false),
        }
    }

    pub fn fail_calls(&self, fail: bool) {
        self.fail_calls.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MediaFragment> {
        self.calls.lock().clone()
    }
}

impl Default for MemoryFraudProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FraudProbe for MemoryFraudProbe {
    async fn screen(&self, fragment: &MediaFragment) -> Result<(), AnalysisError> {
        if self.fail_calls.load(Ordering::SeqCst) {
            return Err(AnalysisError::Timeout("fraud"));
        }
        self.calls.lock().push(fragment.clone());
        Ok(())
    }
}
