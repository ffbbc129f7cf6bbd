use std::sync::Arc;

use intervue_config::Settings;
use intervue_db::Db;
use intervue_services::auth::TokenVerifier;
use intervue_services::breaker::BreakerRegistry;
use intervue_services::dao::{InsightStore, RoundDirectory};
use intervue_services::ingest::MediaIngest;
use intervue_services::insights::InsightEngine;
use intervue_services::rooms::RoomService;

use crate::ws::storage::WsStorage;

/// Explicitly constructed process resources, wired once at startup and
/// injected everywhere; tests substitute the trait objects with in-memory
/// doubles.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<TokenVerifier>,
    pub rooms: Arc<RoomService>,
    pub ws_storage: Arc<WsStorage>,
    pub engine: Arc<InsightEngine>,
    pub ingest: Arc<MediaIngest>,
    pub store: Arc<dyn InsightStore>,
    pub directory: Arc<dyn RoundDirectory>,
    pub breakers: Arc<BreakerRegistry>,
    /// Absent when running against the in-memory doubles.
    pub db: Option<Db>,
    pub redis: Option<redis::aio::ConnectionManager>,
}
