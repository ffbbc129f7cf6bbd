use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSubSink, PubSubStream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// An event destined for every connection joined to one round's room,
/// as handed to the process-local delivery loop.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub round_id: Uuid,
    pub event: serde_json::Value,
}

/// Cross-instance broadcast seam. "Publish to room X" must reach every
/// member of X regardless of which relay instance accepted its connection;
/// delivery is at-most-once, persistence elsewhere is the durability story.
#[async_trait]
pub trait RoomBus: Send + Sync {
    async fn publish(&self, round_id: Uuid, event: serde_json::Value);

    /// Registers interest in a round's topic; called when the first local
    /// connection joins the room.
    async fn subscribe(&self, round_id: Uuid);

    /// Drops interest; called when the last local connection leaves.
    async fn unsubscribe(&self, round_id: Uuid);
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    origin: Uuid,
    round_id: Uuid,
    event: serde_json::Value,
}

fn room_topic(round_id: Uuid) -> String {
    format!("room:{round_id}")
}

enum Control {
    Subscribe(Uuid),
    Unsubscribe(Uuid),
}

/// Redis pub/sub implementation. Local members are delivered synchronously
/// at publish time; the broker only carries the envelope to other
/// instances, which drop anything originated by themselves. A broker
/// outage therefore degrades to correct single-instance delivery.
pub struct RedisRoomBus {
    instance_id: Uuid,
    conn: ConnectionManager,
    control_tx: mpsc::UnboundedSender<Control>,
    local_tx: mpsc::UnboundedSender<RoomEvent>,
}

impl RedisRoomBus {
    pub async fn connect(
        url: &str,
        local_tx: mpsc::UnboundedSender<RoomEvent>,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        let (sink, stream) = client.get_async_pubsub().await?.split();

        let instance_id = Uuid::new_v4();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        tokio::spawn(control_loop(sink, control_rx));
        tokio::spawn(receive_loop(stream, instance_id, local_tx.clone()));

        Ok(Self {
            instance_id,
            conn,
            control_tx,
            local_tx,
        })
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn local_channel() -> (
        mpsc::UnboundedSender<RoomEvent>,
        mpsc::UnboundedReceiver<RoomEvent>,
    ) {
        mpsc::unbounded_channel()
    }
}

#[async_trait]
impl RoomBus for RedisRoomBus {
    async fn publish(&self, round_id: Uuid, event: serde_json::Value) {
        // Local members first; the broker only reaches other instances.
        let _ = self.local_tx.send(RoomEvent {
            round_id,
            event: event.clone(),
        });

        let envelope = Envelope {
            origin: self.instance_id,
            round_id,
            event,
        };
        let payload = match serde_json::to_string(&envelope) {
            Ok(p) => p,
            Err(e) => {
                warn!(%round_id, %e, "failed to encode room envelope");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let result: Result<(), redis::RedisError> =
            redis::cmd("PUBLISH")
                .arg(room_topic(round_id))
                .arg(&payload)
                .query_async(&mut conn)
                .await;
        if let Err(e) = result {
            // Degraded mode: local members already got the event above,
            // only cross-instance fan-out is lost.
            warn!(%round_id, %e, "broker publish failed, delivery is single-instance");
        }
    }

    async fn subscribe(&self, round_id: Uuid) {
        if self.control_tx.send(Control::Subscribe(round_id)).is_err() {
            warn!(%round_id, "fanout control loop is gone, cannot subscribe");
        }
    }

    async fn unsubscribe(&self, round_id: Uuid) {
        if self.control_tx.send(Control::Unsubscribe(round_id)).is_err() {
            warn!(%round_id, "fanout control loop is gone, cannot unsubscribe");
        }
    }
}

async fn control_loop(mut sink: PubSubSink, mut control_rx: mpsc::UnboundedReceiver<Control>) {
    while let Some(control) = control_rx.recv().await {
        let result = match control {
            Control::Subscribe(round_id) => sink.subscribe(room_topic(round_id)).await,
            Control::Unsubscribe(round_id) => sink.unsubscribe(room_topic(round_id)).await,
        };
        if let Err(e) = result {
            warn!(%e, "room topic subscription change failed");
        }
    }
}

async fn receive_loop(
    mut stream: PubSubStream,
    instance_id: Uuid,
    local_tx: mpsc::UnboundedSender<RoomEvent>,
) {
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(%e, "unreadable room envelope payload");
                continue;
            }
        };
        let envelope: Envelope = match serde_json::from_str(&payload) {
            Ok(env) => env,
            Err(e) => {
                warn!(%e, "malformed room envelope");
                continue;
            }
        };

        // Own envelopes were delivered locally at publish time.
        if envelope.origin == instance_id {
            continue;
        }

        debug!(round_id = %envelope.round_id, origin = %envelope.origin, "remote room event");
        if local_tx
            .send(RoomEvent {
                round_id: envelope.round_id,
                event: envelope.event,
            })
            .is_err()
        {
            break;
        }
    }
    debug!("room bus receive loop ended");
}
