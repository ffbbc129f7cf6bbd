use axum::Json;
use axum::extract::State;
use intervue_services::breaker::BreakerSnapshot;

use crate::state::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness: Redis is required for fan-out and ingestion, the database is
/// optional (the relay degrades to live-only delivery without it).
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let redis_up = match &state.redis {
        Some(conn) => {
            let mut conn = conn.clone();
            let pong: Result<String, redis::RedisError> =
                redis::cmd("PING").query_async(&mut conn).await;
            pong.is_ok()
        }
        None => false,
    };

    let database_up = match &state.db {
        Some(db) => db.ping().await.is_ok(),
        None => false,
    };

    Json(serde_json::json!({
        "status": if redis_up { "ready" } else { "degraded" },
        "checks": {
            "redis": redis_up,
            "database": database_up,
        },
        "timestamp": chrono::Utc::now(),
    }))
}

/// Per-dependency circuit state and rolling statistics.
pub async fn breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshots())
}
