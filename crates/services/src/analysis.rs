use std::sync::Arc;

use async_trait::async_trait;
use intervue_config::AnalysisSettings;
use serde_json::json;
use uuid::Uuid;

use crate::breaker::{BreakerError, BreakerRegistry};
use crate::ingest::{FraudProbe, MediaFragment, MediaKind};

const INTERNAL_KEY_HEADER: &str = "x-internal-api-key";

/// The four external analysis dependencies. Each gets its own breaker so
/// one failing service never trips another's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisDomain {
    Speech,
    Video,
    Fraud,
    Nlp,
}

impl AnalysisDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDomain::Speech => "speech",
            AnalysisDomain::Video => "video",
            AnalysisDomain::Fraud => "fraud",
            AnalysisDomain::Nlp => "nlp",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("circuit open for {0}")]
    CircuitOpen(&'static str),
    #[error("call to {0} timed out")]
    Timeout(&'static str),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Breaker-guarded HTTP client for direct calls into the analysis
/// services. Today only fraud-detection is called synchronously (per media
/// fragment); the other domains go through the stream log, but their
/// breakers live here too so health introspection covers all four.
pub struct AnalysisClient {
    http: reqwest::Client,
    settings: AnalysisSettings,
    breakers: Arc<BreakerRegistry>,
}

impl AnalysisClient {
    pub fn new(settings: AnalysisSettings, breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            breakers,
        }
    }

    fn base_url(&self, domain: AnalysisDomain) -> &str {
        match domain {
            AnalysisDomain::Speech => &self.settings.speech_url,
            AnalysisDomain::Video => &self.settings.video_url,
            AnalysisDomain::Fraud => &self.settings.fraud_url,
            AnalysisDomain::Nlp => &self.settings.nlp_url,
        }
    }

    async fn post_json(
        &self,
        domain: AnalysisDomain,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), AnalysisError> {
        let breaker = self.breakers.get(domain.as_str());
        let url = format!("{}{}", self.base_url(domain), path);

        breaker
            .call(async {
                let response = self
                    .http
                    .post(&url)
                    .header(INTERNAL_KEY_HEADER, &self.settings.internal_api_key)
                    .json(&body)
                    .send()
                    .await?;
                response.error_for_status()?;
                Ok::<(), reqwest::Error>(())
            })
            .await
            .map_err(|e| match e {
                BreakerError::Open => AnalysisError::CircuitOpen(domain.as_str()),
                BreakerError::Timeout => AnalysisError::Timeout(domain.as_str()),
                BreakerError::Upstream(e) => AnalysisError::Http(e),
            })
    }

    pub async fn screen_video_frame(
        &self,
        round_id: Uuid,
        frame_base64: &str,
        timestamp_ms: i64,
    ) -> Result<(), AnalysisError> {
        self.post_json(
            AnalysisDomain::Fraud,
            "/analyze/video",
            json!({
                "round_id": round_id,
                "frame_base64": frame_base64,
                "timestamp_ms": timestamp_ms,
            }),
        )
        .await
    }

    pub async fn screen_audio_chunk(
        &self,
        round_id: Uuid,
        audio_base64: &str,
        timestamp_ms: i64,
    ) -> Result<(), AnalysisError> {
        self.post_json(
            AnalysisDomain::Fraud,
            "/analyze/audio",
            json!({
                "round_id": round_id,
                "audio_base64": audio_base64,
                "timestamp_ms": timestamp_ms,
            }),
        )
        .await
    }
}

#[async_trait]
impl FraudProbe for AnalysisClient {
    async fn screen(&self, fragment: &MediaFragment) -> Result<(), AnalysisError> {
        match fragment.kind {
            MediaKind::Video => {
                self.screen_video_frame(fragment.round_id, &fragment.payload, fragment.timestamp_ms)
                    .await
            }
            MediaKind::Audio => {
                self.screen_audio_chunk(fragment.round_id, &fragment.payload, fragment.timestamp_ms)
                    .await
            }
        }
    }
}
