use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use intervue_db::models::{InsightCategory, InsightSeverity};
use intervue_services::auth::Role;
use intervue_services::dao::NewInsight;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::fixtures::{TestApi, identity, token_for};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let api = TestApi::spawn();

    let response = api.router.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn ready_degrades_without_backends() {
    let api = TestApi::spawn();

    let response = api
        .router
        .clone()
        .oneshot(get("/health/ready", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["redis"], false);
    assert_eq!(body["checks"]["database"], false);
}

#[tokio::test]
async fn breaker_introspection_lists_known_dependencies() {
    let api = TestApi::spawn();
    api.breakers.get("speech");
    api.breakers.get("fraud");

    let response = api
        .router
        .clone()
        .oneshot(get("/health/breakers", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let snapshots = body.as_array().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0]["name"], "fraud");
    assert_eq!(snapshots[0]["state"], "closed");
    assert_eq!(snapshots[1]["name"], "speech");
}

#[tokio::test]
async fn recent_insights_require_a_bearer_token() {
    let api = TestApi::spawn();
    let (round_id, _, _) = api.seed_round();

    let response = api
        .router
        .clone()
        .oneshot(get(&format!("/api/round/{round_id}/insight"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn recent_insights_deny_unrelated_users() {
    let api = TestApi::spawn();
    let (round_id, _, _) = api.seed_round();
    let stranger = identity(Role::Interviewer);

    let response = api
        .router
        .clone()
        .oneshot(get(
            &format!("/api/round/{round_id}/insight"),
            Some(&token_for(&stranger)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn recent_insights_return_the_catch_up_window() {
    let api = TestApi::spawn();
    let (round_id, candidate, _) = api.seed_round();

    api.engine
        .process(NewInsight {
            round_id,
            insight_type: "HESITATION".to_string(),
            category: InsightCategory::Speech,
            severity: InsightSeverity::Low,
            timestamp_ms: 3_000,
            value: json!({ "type": "filler_word", "word": "um" }),
            explanation: None,
            model_version: Some("speech-v1.0".to_string()),
        })
        .await;

    let response = api
        .router
        .clone()
        .oneshot(get(
            &format!("/api/round/{round_id}/insight"),
            Some(&token_for(&candidate)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let insights = body.as_array().unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0]["insightType"], "HESITATION");
    assert_eq!(insights[0]["severity"], "LOW");
}

#[tokio::test]
async fn alert_acknowledgment_is_interviewer_only() {
    let api = TestApi::spawn();
    let (round_id, candidate, interviewer) = api.seed_round();

    api.engine
        .process(NewInsight {
            round_id,
            insight_type: "TAB_SWITCH".to_string(),
            category: InsightCategory::Fraud,
            severity: InsightSeverity::High,
            timestamp_ms: 10_000,
            value: json!({ "confidence": 0.9 }),
            explanation: None,
            model_version: None,
        })
        .await;
    let alert_id = api.store.alerts()[0].id;

    // Candidates cannot acknowledge their own alerts.
    let response = api
        .router
        .clone()
        .oneshot(post_json(
            &format!("/api/round/{round_id}/alert/{alert_id}/ack"),
            &token_for(&candidate),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = api
        .router
        .clone()
        .oneshot(post_json(
            &format!("/api/round/{round_id}/alert/{alert_id}/ack"),
            &token_for(&interviewer),
            json!({ "false_positive": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["acknowledged"], true);
    assert_eq!(body["falsePositive"], true);
}

#[tokio::test]
async fn alert_listing_shows_acknowledgment_state() {
    let api = TestApi::spawn();
    let (round_id, _, interviewer) = api.seed_round();

    api.engine
        .process(NewInsight {
            round_id,
            insight_type: "MULTIPLE_FACES".to_string(),
            category: InsightCategory::Fraud,
            severity: InsightSeverity::Critical,
            timestamp_ms: 20_000,
            value: json!({ "confidence": 0.95 }),
            explanation: Some("Multiple faces detected".to_string()),
            model_version: Some("fraud-v1.0".to_string()),
        })
        .await;

    let response = api
        .router
        .clone()
        .oneshot(get(
            &format!("/api/round/{round_id}/alert"),
            Some(&token_for(&interviewer)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let alerts = body.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alertType"], "MULTIPLE_FACES");
    assert_eq!(alerts[0]["acknowledged"], false);

    let ack_of_missing = api
        .router
        .clone()
        .oneshot(post_json(
            &format!("/api/round/{round_id}/alert/{}/ack", Uuid::new_v4()),
            &token_for(&interviewer),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(ack_of_missing.status(), StatusCode::NOT_FOUND);
}
