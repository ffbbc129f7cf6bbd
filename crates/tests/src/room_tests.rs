use intervue_services::auth::Role;
use intervue_services::dao::RoundOwnership;
use intervue_services::rooms::RoomError;
use uuid::Uuid;

use crate::fixtures::{TestRelay, identity};

#[tokio::test]
async fn candidate_joins_own_round() {
    let relay = TestRelay::new();
    let (round_id, candidate, _) = relay.seed_round();

    let grant = relay.rooms.join("c1", &candidate, round_id).await.unwrap();
    assert!(!grant.rejoined);
    assert_eq!(relay.rooms.local_members(round_id), vec!["c1".to_string()]);
}

#[tokio::test]
async fn assigned_interviewer_joins() {
    let relay = TestRelay::new();
    let (round_id, _, interviewer) = relay.seed_round();

    assert!(relay.rooms.join("c1", &interviewer, round_id).await.is_ok());
}

#[tokio::test]
async fn administrative_roles_join_unconditionally() {
    let relay = TestRelay::new();
    let (round_id, _, _) = relay.seed_round();

    assert!(relay.rooms.join("c1", &identity(Role::Hr), round_id).await.is_ok());
    assert!(relay.rooms.join("c2", &identity(Role::Admin), round_id).await.is_ok());
}

#[tokio::test]
async fn unassigned_interviewer_is_denied_without_membership_change() {
    let relay = TestRelay::new();
    let (round_id, _, _) = relay.seed_round();
    let stranger = identity(Role::Interviewer);

    let result = relay.rooms.join("c1", &stranger, round_id).await;
    assert!(matches!(result, Err(RoomError::AccessDenied)));
    assert!(relay.rooms.local_members(round_id).is_empty());
    assert_eq!(relay.rooms.room_of("c1"), None);
}

#[tokio::test]
async fn unknown_round_is_denied() {
    let relay = TestRelay::new();

    let result = relay
        .rooms
        .join("c1", &identity(Role::Candidate), Uuid::new_v4())
        .await;
    assert!(matches!(result, Err(RoomError::AccessDenied)));
}

#[tokio::test]
async fn failed_ownership_lookup_denies_even_for_admin() {
    let relay = TestRelay::new();
    let (round_id, _, _) = relay.seed_round();
    relay.directory.fail_lookups(true);

    let result = relay.rooms.join("c1", &identity(Role::Admin), round_id).await;
    assert!(matches!(result, Err(RoomError::AccessDenied)));
}

#[tokio::test]
async fn joining_a_second_round_leaves_the_first() {
    let relay = TestRelay::new();
    let (round_a, _, _) = relay.seed_round();
    let admin = identity(Role::Admin);
    let round_b = Uuid::new_v4();
    relay.directory.insert(
        round_b,
        RoundOwnership {
            candidate_id: Uuid::new_v4(),
            interviewer_id: None,
        },
    );

    relay.rooms.join("c1", &admin, round_a).await.unwrap();
    relay.rooms.join("c1", &admin, round_b).await.unwrap();

    assert!(relay.rooms.local_members(round_a).is_empty());
    assert_eq!(relay.rooms.local_members(round_b), vec!["c1".to_string()]);
    assert_eq!(relay.rooms.room_of("c1"), Some(round_b));
}

#[tokio::test]
async fn denied_second_join_keeps_existing_membership() {
    let relay = TestRelay::new();
    let (round_a, candidate, _) = relay.seed_round();
    let (round_b, _, _) = relay.seed_round();

    relay.rooms.join("c1", &candidate, round_a).await.unwrap();
    let result = relay.rooms.join("c1", &candidate, round_b).await;

    assert!(matches!(result, Err(RoomError::AccessDenied)));
    assert_eq!(relay.rooms.room_of("c1"), Some(round_a));
    assert_eq!(relay.rooms.local_members(round_a), vec!["c1".to_string()]);
}

#[tokio::test]
async fn rejoining_the_same_round_is_reported() {
    let relay = TestRelay::new();
    let (round_id, candidate, _) = relay.seed_round();

    relay.rooms.join("c1", &candidate, round_id).await.unwrap();
    let grant = relay.rooms.join("c1", &candidate, round_id).await.unwrap();

    assert!(grant.rejoined);
    assert_eq!(relay.rooms.local_members(round_id).len(), 1);
}

#[tokio::test]
async fn leave_is_idempotent() {
    let relay = TestRelay::new();
    let (round_id, candidate, _) = relay.seed_round();

    relay.rooms.join("c1", &candidate, round_id).await.unwrap();
    relay.rooms.leave("c1").await;
    relay.rooms.leave("c1").await;

    assert!(relay.rooms.local_members(round_id).is_empty());
}
