use std::sync::Arc;

use intervue_services::auth::Role;
use intervue_services::ingest::{IngestError, MediaFragment, MediaIngest, MediaKind};
use intervue_services::testing::{MemoryFraudProbe, MemoryMediaLog};
use uuid::Uuid;

use crate::fixtures::identity;

struct IngestHarness {
    log: Arc<MemoryMediaLog>,
    probe: Arc<MemoryFraudProbe>,
    ingest: MediaIngest,
}

fn harness(candidate_only: bool) -> IngestHarness {
    let log = Arc::new(MemoryMediaLog::new());
    let probe = Arc::new(MemoryFraudProbe::new());
    let ingest = MediaIngest::new(log.clone(), probe.clone(), candidate_only);
    IngestHarness { log, probe, ingest }
}

fn fragment(kind: MediaKind) -> MediaFragment {
    MediaFragment {
        round_id: Uuid::new_v4(),
        kind,
        payload: "aGVsbG8=".to_string(),
        timestamp_ms: 1_234,
    }
}

#[tokio::test]
async fn candidate_fragment_is_logged_and_screened() {
    let h = harness(true);
    let candidate = identity(Role::Candidate);
    let fragment = fragment(MediaKind::Audio);

    h.ingest.ingest(&candidate, &fragment).await.unwrap();

    let records = h.log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0.round_id, fragment.round_id);
    assert_eq!(records[0].1, candidate.id);
    assert_eq!(h.probe.calls().len(), 1);
}

#[tokio::test]
async fn non_candidate_is_denied_in_production_posture() {
    let h = harness(true);
    let interviewer = identity(Role::Interviewer);

    let result = h.ingest.ingest(&interviewer, &fragment(MediaKind::Video)).await;
    assert!(matches!(result, Err(IngestError::RoleDenied(Role::Interviewer))));
    assert!(h.log.records().is_empty());
    assert!(h.probe.calls().is_empty());
}

#[tokio::test]
async fn relaxed_posture_accepts_any_authenticated_role() {
    let h = harness(false);
    let interviewer = identity(Role::Interviewer);

    h.ingest
        .ingest(&interviewer, &fragment(MediaKind::Video))
        .await
        .unwrap();
    assert_eq!(h.log.records().len(), 1);
}

#[tokio::test]
async fn log_append_failure_is_swallowed() {
    let h = harness(true);
    h.log.fail_appends(true);
    let candidate = identity(Role::Candidate);

    // Fire-and-forget: the submitter must not see the failure.
    h.ingest
        .ingest(&candidate, &fragment(MediaKind::Audio))
        .await
        .unwrap();
    assert!(h.log.records().is_empty());
    // Screening still ran.
    assert_eq!(h.probe.calls().len(), 1);
}

#[tokio::test]
async fn screening_failure_is_swallowed() {
    let h = harness(true);
    h.probe.fail_calls(true);
    let candidate = identity(Role::Candidate);

    h.ingest
        .ingest(&candidate, &fragment(MediaKind::Video))
        .await
        .unwrap();
    assert_eq!(h.log.records().len(), 1);
}

#[test]
fn stream_fields_match_worker_expectations() {
    assert_eq!(MediaKind::Audio.payload_field(), "chunk");
    assert_eq!(MediaKind::Video.payload_field(), "frame");
    assert_eq!(MediaKind::parse("audio"), Some(MediaKind::Audio));
    assert_eq!(MediaKind::parse("screen"), None);
}
