use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use intervue_api::build_router;
use intervue_api::state::AppState;
use intervue_api::ws::storage::WsStorage;
use intervue_config::{AuthSettings, DatabaseSettings, InsightSettings, Settings};
use intervue_services::auth::{Claims, Identity, Role};
use intervue_services::breaker::{BreakerConfig, BreakerRegistry};
use intervue_services::dao::{InsightStore, RoundDirectory, RoundOwnership};
use intervue_services::fanout::RoomEvent;
use intervue_services::ingest::MediaIngest;
use intervue_services::insights::InsightEngine;
use intervue_services::rooms::RoomService;
use intervue_services::testing::{
    MemoryBroker, MemoryFraudProbe, MemoryInsightStore, MemoryMediaLog, MemoryRoomBus,
    MemoryRoundDirectory,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret";

/// One relay instance with in-memory seams: the same graph `main` wires,
/// minus the transport. `events` receives everything the instance's local
/// delivery loop would fan out to sockets.
pub struct TestRelay {
    pub directory: Arc<MemoryRoundDirectory>,
    pub store: Arc<MemoryInsightStore>,
    pub rooms: Arc<RoomService>,
    pub engine: Arc<InsightEngine>,
    pub events: mpsc::UnboundedReceiver<RoomEvent>,
}

impl TestRelay {
    pub fn new() -> Self {
        Self::on_broker(None)
    }

    pub fn on_broker(broker: Option<Arc<MemoryBroker>>) -> Self {
        let (local_tx, events) = mpsc::unbounded_channel();
        let bus = Arc::new(MemoryRoomBus::new(broker, local_tx));
        let directory = Arc::new(MemoryRoundDirectory::new());
        let store = Arc::new(MemoryInsightStore::new());

        let rooms = Arc::new(RoomService::new(
            directory.clone() as Arc<dyn RoundDirectory>,
            bus.clone(),
        ));
        let engine = Arc::new(InsightEngine::new(
            store.clone(),
            bus,
            &InsightSettings::default(),
        ));

        Self {
            directory,
            store,
            rooms,
            engine,
            events,
        }
    }

    /// Seeds a round and returns (round_id, candidate, interviewer)
    /// identities that pass the access predicate.
    pub fn seed_round(&self) -> (Uuid, Identity, Identity) {
        let candidate = identity(Role::Candidate);
        let interviewer = identity(Role::Interviewer);
        let round_id = Uuid::new_v4();
        self.directory.insert(
            round_id,
            RoundOwnership {
                candidate_id: candidate.id,
                interviewer_id: Some(interviewer.id),
            },
        );
        (round_id, candidate, interviewer)
    }

    /// Collects room events until the channel stays quiet. The short
    /// timeout lets cross-instance broker forwarding tasks run.
    pub async fn drain_events(&mut self) -> Vec<RoomEvent> {
        let mut out = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(50), self.events.recv()).await
        {
            out.push(event);
        }
        out
    }
}

pub fn identity(role: Role) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", Uuid::new_v4().simple()),
        role,
    }
}

/// Event type tag as delivered to clients.
pub fn event_type(event: &RoomEvent) -> &str {
    event
        .event
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("")
}

/// Bearer token for `identity`, signed the way the upstream login service
/// signs them.
pub fn token_for(identity: &Identity) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: identity.id.to_string(),
        email: identity.email.clone(),
        role: identity.role,
        exp: (now + 3600) as usize,
        iat: now as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// The full HTTP surface over the in-memory seams, for router-level tests.
pub struct TestApi {
    pub router: Router,
    pub directory: Arc<MemoryRoundDirectory>,
    pub store: Arc<MemoryInsightStore>,
    pub engine: Arc<InsightEngine>,
    pub breakers: Arc<BreakerRegistry>,
}

impl TestApi {
    pub fn spawn() -> Self {
        let settings = Settings {
            server: Default::default(),
            auth: AuthSettings {
                jwt_secret: TEST_JWT_SECRET.to_string(),
            },
            redis: Default::default(),
            database: DatabaseSettings {
                url: "postgres://unused".to_string(),
                max_connections: 1,
            },
            ingest: Default::default(),
            insights: Default::default(),
            analysis: Default::default(),
            breaker: Default::default(),
        };

        let (local_tx, _events) = mpsc::unbounded_channel();
        let bus = Arc::new(MemoryRoomBus::new(None, local_tx));
        let directory = Arc::new(MemoryRoundDirectory::new());
        let store = Arc::new(MemoryInsightStore::new());
        let breakers = Arc::new(BreakerRegistry::new(BreakerConfig::from(&settings.breaker)));

        let rooms = Arc::new(RoomService::new(
            directory.clone() as Arc<dyn RoundDirectory>,
            bus.clone(),
        ));
        let engine = Arc::new(InsightEngine::new(
            store.clone(),
            bus,
            &settings.insights,
        ));
        let ingest = Arc::new(MediaIngest::new(
            Arc::new(MemoryMediaLog::new()),
            Arc::new(MemoryFraudProbe::new()),
            settings.ingest.candidate_only,
        ));

        let state = AppState {
            settings: Arc::new(settings),
            auth: Arc::new(intervue_services::auth::TokenVerifier::new(TEST_JWT_SECRET)),
            rooms,
            ws_storage: Arc::new(WsStorage::new()),
            engine: engine.clone(),
            ingest,
            store: store.clone() as Arc<dyn InsightStore>,
            directory: directory.clone() as Arc<dyn RoundDirectory>,
            breakers: breakers.clone(),
            db: None,
            redis: None,
        };

        Self {
            router: build_router(state),
            directory,
            store,
            engine,
            breakers,
        }
    }

    pub fn seed_round(&self) -> (Uuid, Identity, Identity) {
        let candidate = identity(Role::Candidate);
        let interviewer = identity(Role::Interviewer);
        let round_id = Uuid::new_v4();
        self.directory.insert(
            round_id,
            RoundOwnership {
                candidate_id: candidate.id,
                interviewer_id: Some(interviewer.id),
            },
        );
        (round_id, candidate, interviewer)
    }
}
