use intervue_services::auth::Role;
use intervue_services::dao::RoundOwnership;
use intervue_services::testing::MemoryBroker;
use serde_json::json;
use uuid::Uuid;

use crate::fixtures::{TestRelay, event_type, identity};

/// Two instances with members in the same room: one publish reaches both,
/// exactly once each, delivered to exactly the room's local members.
#[tokio::test]
async fn broadcast_crosses_instances_exactly_once() {
    let broker = MemoryBroker::new();
    let mut relay_a = TestRelay::on_broker(Some(broker.clone()));
    let mut relay_b = TestRelay::on_broker(Some(broker.clone()));

    let (round_id, candidate, interviewer) = relay_a.seed_round();
    relay_b.directory.insert(
        round_id,
        RoundOwnership {
            candidate_id: candidate.id,
            interviewer_id: Some(interviewer.id),
        },
    );

    relay_a.rooms.join("a-1", &candidate, round_id).await.unwrap();
    relay_b.rooms.join("b-1", &interviewer, round_id).await.unwrap();

    relay_a
        .rooms
        .broadcast(round_id, json!({ "type": "insight", "data": {} }))
        .await;

    let a_events = relay_a.drain_events().await;
    assert_eq!(a_events.len(), 1);
    assert_eq!(event_type(&a_events[0]), "insight");
    assert_eq!(relay_a.rooms.local_members(a_events[0].round_id), vec!["a-1".to_string()]);

    let b_events = relay_b.drain_events().await;
    assert_eq!(b_events.len(), 1);
    assert_eq!(relay_b.rooms.local_members(b_events[0].round_id), vec!["b-1".to_string()]);
}

#[tokio::test]
async fn instances_without_interest_receive_nothing() {
    let broker = MemoryBroker::new();
    let mut relay_a = TestRelay::on_broker(Some(broker.clone()));
    let mut relay_c = TestRelay::on_broker(Some(broker.clone()));

    let (round_a, candidate, _) = relay_a.seed_round();
    let (round_c, other_candidate, _) = relay_c.seed_round();

    relay_a.rooms.join("a-1", &candidate, round_a).await.unwrap();
    relay_c.rooms.join("c-1", &other_candidate, round_c).await.unwrap();

    relay_a
        .rooms
        .broadcast(round_a, json!({ "type": "insight", "data": {} }))
        .await;

    assert_eq!(relay_a.drain_events().await.len(), 1);
    // relay_c is subscribed to a different round's topic only.
    assert!(relay_c.drain_events().await.is_empty());
}

#[tokio::test]
async fn events_target_only_the_published_room_locally() {
    let mut relay = TestRelay::new();
    let (round_a, candidate_a, _) = relay.seed_round();
    let (round_b, candidate_b, _) = relay.seed_round();

    relay.rooms.join("c-a", &candidate_a, round_a).await.unwrap();
    relay.rooms.join("c-b", &candidate_b, round_b).await.unwrap();

    relay
        .rooms
        .broadcast(round_a, json!({ "type": "insight", "data": {} }))
        .await;

    let events = relay.drain_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].round_id, round_a);
    // The delivery loop resolves recipients from the event's room only.
    assert_eq!(relay.rooms.local_members(events[0].round_id), vec!["c-a".to_string()]);
}

/// Broker down (`None`): publishes still reach this instance's members.
#[tokio::test]
async fn broker_outage_degrades_to_single_instance_delivery() {
    let mut relay = TestRelay::new();
    let (round_id, candidate, _) = relay.seed_round();
    relay.rooms.join("c-1", &candidate, round_id).await.unwrap();

    relay
        .rooms
        .broadcast(round_id, json!({ "type": "insight", "data": {} }))
        .await;

    let events = relay.drain_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].round_id, round_id);
}

/// After the last local member leaves, the instance drops topic interest
/// and stops receiving remote events for the room.
#[tokio::test]
async fn unsubscribe_after_last_local_leave() {
    let broker = MemoryBroker::new();
    let mut relay_a = TestRelay::on_broker(Some(broker.clone()));
    let mut relay_b = TestRelay::on_broker(Some(broker.clone()));

    let (round_id, candidate, interviewer) = relay_a.seed_round();
    relay_b.directory.insert(
        round_id,
        RoundOwnership {
            candidate_id: candidate.id,
            interviewer_id: Some(interviewer.id),
        },
    );

    relay_a.rooms.join("a-1", &candidate, round_id).await.unwrap();
    relay_b.rooms.join("b-1", &interviewer, round_id).await.unwrap();
    relay_b.rooms.leave("b-1").await;

    relay_a
        .rooms
        .broadcast(round_id, json!({ "type": "insight", "data": {} }))
        .await;

    assert_eq!(relay_a.drain_events().await.len(), 1);
    assert!(relay_b.drain_events().await.is_empty());
}

#[tokio::test]
async fn admin_watching_from_second_instance_receives_alerts() {
    let broker = MemoryBroker::new();
    let relay_a = TestRelay::on_broker(Some(broker.clone()));
    let mut relay_b = TestRelay::on_broker(Some(broker.clone()));

    let (round_id, _, _) = relay_a.seed_round();
    relay_b.directory.insert(
        round_id,
        RoundOwnership {
            candidate_id: Uuid::new_v4(),
            interviewer_id: None,
        },
    );
    let admin = identity(Role::Admin);
    relay_b.rooms.join("b-admin", &admin, round_id).await.unwrap();

    relay_a
        .engine
        .process(intervue_services::dao::NewInsight {
            round_id,
            insight_type: "FACE_SWITCH".to_string(),
            category: intervue_db::models::InsightCategory::Fraud,
            severity: intervue_db::models::InsightSeverity::Critical,
            timestamp_ms: 5_000,
            value: json!({ "confidence": 0.95 }),
            explanation: None,
            model_version: None,
        })
        .await;

    let b_events = relay_b.drain_events().await;
    let types: Vec<&str> = b_events.iter().map(event_type).collect();
    assert!(types.contains(&"insight"));
    assert!(types.contains(&"fraud-alert"));
}
