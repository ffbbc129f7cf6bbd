use std::sync::Arc;

use anyhow::Context;
use intervue_api::state::AppState;
use intervue_api::{build_router, ws};
use intervue_config::Settings;
use intervue_db::Db;
use intervue_services::analysis::AnalysisClient;
use intervue_services::auth::TokenVerifier;
use intervue_services::breaker::{BreakerConfig, BreakerRegistry};
use intervue_services::dao::{InsightStore, PgInsightStore, PgRoundDirectory, RoundDirectory};
use intervue_services::fanout::RedisRoomBus;
use intervue_services::ingest::{MediaIngest, RedisMediaLog};
use intervue_services::insights::{InsightEngine, run_result_subscriber};
use intervue_services::rooms::RoomService;
use redis::aio::ConnectionManager;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Arc::new(Settings::load().context("loading settings")?);

    let db = Db::connect(&settings.database)
        .await
        .context("connecting to Postgres")?;
    db.init_schema().await.context("initializing schema")?;

    let redis_client =
        redis::Client::open(settings.redis.url.as_str()).context("parsing Redis URL")?;
    let redis_conn = ConnectionManager::new(redis_client)
        .await
        .context("connecting to Redis")?;

    let (local_tx, local_rx) = RedisRoomBus::local_channel();
    let bus = Arc::new(
        RedisRoomBus::connect(&settings.redis.url, local_tx)
            .await
            .context("connecting room bus")?,
    );
    info!(instance_id = %bus.instance_id(), "cluster fan-out connected");

    let breakers = Arc::new(BreakerRegistry::new(BreakerConfig::from(&settings.breaker)));
    let analysis = Arc::new(AnalysisClient::new(
        settings.analysis.clone(),
        breakers.clone(),
    ));
    let media_log = Arc::new(RedisMediaLog::new(
        redis_conn.clone(),
        settings.ingest.stream_maxlen,
    ));
    let ingest = Arc::new(MediaIngest::new(
        media_log,
        analysis,
        settings.ingest.candidate_only,
    ));

    let store: Arc<dyn InsightStore> = Arc::new(PgInsightStore::new(db.clone()));
    let directory: Arc<dyn RoundDirectory> = Arc::new(PgRoundDirectory::new(db.clone()));
    let rooms = Arc::new(RoomService::new(directory.clone(), bus.clone()));
    let engine = Arc::new(InsightEngine::new(
        store.clone(),
        bus.clone(),
        &settings.insights,
    ));
    let auth = Arc::new(TokenVerifier::new(&settings.auth.jwt_secret));
    let ws_storage = Arc::new(ws::storage::WsStorage::new());

    tokio::spawn(ws::dispatcher::delivery_loop(
        local_rx,
        rooms.clone(),
        ws_storage.clone(),
    ));
    tokio::spawn(run_result_subscriber(
        engine.clone(),
        settings.redis.url.clone(),
    ));

    let state = AppState {
        settings: settings.clone(),
        auth,
        rooms,
        ws_storage,
        engine,
        ingest,
        store,
        directory,
        breakers,
        db: Some(db),
        redis: Some(redis_conn),
    };

    let app = build_router(state);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "insight relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
