use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::AnalysisError;
use crate::auth::{Identity, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Stream field name the analysis workers read the payload from.
    pub fn payload_field(&self) -> &'static str {
        match self {
            MediaKind::Audio => "chunk",
            MediaKind::Video => "frame",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// One raw media fragment as received from a candidate connection. The
/// payload stays base64 end to end; the relay never decodes it.
#[derive(Debug, Clone)]
pub struct MediaFragment {
    pub round_id: Uuid,
    pub kind: MediaKind,
    pub payload: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("role {0:?} may not submit media")]
    RoleDenied(Role),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// Append-only, per-round, per-kind media log consumed by the analysis
/// workers. Write-once; the relay never reads records back.
#[async_trait]
pub trait MediaLog: Send + Sync {
    async fn append(&self, fragment: &MediaFragment, submitter_id: Uuid) -> Result<(), IngestError>;
}

/// Forward of a fragment to the fraud-detection service for synchronous
/// screening (results come back asynchronously on the fraud topic).
#[async_trait]
pub trait FraudProbe: Send + Sync {
    async fn screen(&self, fragment: &MediaFragment) -> Result<(), AnalysisError>;
}

fn stream_key(kind: MediaKind, round_id: Uuid) -> String {
    format!("stream:{}:{}", kind.as_str(), round_id)
}

/// Redis streams implementation of the media log.
pub struct RedisMediaLog {
    conn: ConnectionManager,
    maxlen: usize,
}

impl RedisMediaLog {
    pub fn new(conn: ConnectionManager, maxlen: usize) -> Self {
        Self { conn, maxlen }
    }
}

#[async_trait]
impl MediaLog for RedisMediaLog {
    async fn append(&self, fragment: &MediaFragment, submitter_id: Uuid) -> Result<(), IngestError> {
        let mut conn = self.conn.clone();
        let () = redis::cmd("XADD")
            .arg(stream_key(fragment.kind, fragment.round_id))
            .arg("MAXLEN")
            .arg("~")
            .arg(self.maxlen)
            .arg("*")
            .arg(fragment.kind.payload_field())
            .arg(&fragment.payload)
            .arg("timestamp")
            .arg(fragment.timestamp_ms)
            .arg("submitterId")
            .arg(submitter_id.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

/// Media ingestion relay. Fire-and-forget from the submitter's point of
/// view: append and screening failures are logged, never surfaced, because
/// media loss must not interrupt the live call. Ordering comes from the
/// fragment timestamps, not from arrival order.
pub struct MediaIngest {
    log: Arc<dyn MediaLog>,
    probe: Arc<dyn FraudProbe>,
    candidate_only: bool,
}

impl MediaIngest {
    pub fn new(log: Arc<dyn MediaLog>, probe: Arc<dyn FraudProbe>, candidate_only: bool) -> Self {
        Self {
            log,
            probe,
            candidate_only,
        }
    }

    pub async fn ingest(
        &self,
        identity: &Identity,
        fragment: &MediaFragment,
    ) -> Result<(), IngestError> {
        if self.candidate_only && identity.role != Role::Candidate {
            return Err(IngestError::RoleDenied(identity.role));
        }

        // Tolerated failure: the stream log is best-effort by design.
        if let Err(e) = self.log.append(fragment, identity.id).await {
            warn!(
                round_id = %fragment.round_id,
                kind = fragment.kind.as_str(),
                %e,
                "media log append failed, fragment dropped"
            );
        }

        match self.probe.screen(fragment).await {
            Ok(()) => {}
            Err(AnalysisError::CircuitOpen(dep)) => {
                debug!(round_id = %fragment.round_id, dep, "fraud screening short-circuited");
            }
            Err(e) => {
                warn!(round_id = %fragment.round_id, %e, "fraud screening call failed");
            }
        }

        Ok(())
    }
}
