pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Round-scoped read/acknowledge surface for interviewer dashboards
    let round_routes = Router::new()
        .route("/insight", get(routes::insight::list_recent))
        .route("/alert", get(routes::alert::list))
        .route("/alert/{alert_id}/ack", post(routes::alert::acknowledge));

    let api = Router::new().nest("/round/{round_id}", round_routes);

    // Health check + breaker introspection
    let health = Router::new()
        .route("/health", get(routes::health::health))
        .route("/health/ready", get(routes::health::ready))
        .route("/health/breakers", get(routes::health::breakers));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
