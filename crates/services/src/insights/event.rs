use intervue_db::models::{InsightCategory, InsightSeverity};
use serde::Deserialize;
use uuid::Uuid;

use crate::dao::NewInsight;

/// One subscription per analysis domain; workers publish their results on
/// these channels.
pub const RESULT_TOPICS: [(&str, InsightCategory); 4] = [
    ("service:speech:results", InsightCategory::Speech),
    ("service:video:results", InsightCategory::Video),
    ("service:fraud:results", InsightCategory::Fraud),
    ("service:nlp:results", InsightCategory::Nlp),
];

pub fn category_for_topic(name: &str) -> Option<InsightCategory> {
    RESULT_TOPICS
        .iter()
        .find(|(topic, _)| *topic == name)
        .map(|(_, category)| *category)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInsight {
    round_id: String,
    insight_type: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    timestamp_ms: i64,
    severity: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing or invalid round id")]
    BadRoundId,
    #[error("unknown severity {0:?}")]
    BadSeverity(String),
}

/// Parses one pub/sub message into an insertable insight. Workers that
/// predate the `category` field are covered by the topic's domain.
pub fn parse_result(
    topic_category: InsightCategory,
    payload: &str,
) -> Result<NewInsight, ParseError> {
    let wire: WireInsight = serde_json::from_str(payload)?;

    let round_id = Uuid::parse_str(&wire.round_id).map_err(|_| ParseError::BadRoundId)?;
    let severity = InsightSeverity::parse(&wire.severity)
        .ok_or_else(|| ParseError::BadSeverity(wire.severity.clone()))?;
    let category = wire
        .category
        .as_deref()
        .and_then(InsightCategory::parse)
        .unwrap_or(topic_category);

    Ok(NewInsight {
        round_id,
        insight_type: wire.insight_type,
        category,
        severity,
        timestamp_ms: wire.timestamp_ms,
        value: wire.value,
        explanation: wire.explanation,
        model_version: wire.model_version,
    })
}

/// Typed view of the loosely-shaped `value` payload, keyed by insight
/// type. Unknown types and shape mismatches fall back to `Opaque` so new
/// worker payloads flow through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightValue {
    SpeechConfidence {
        score: f64,
        transcript: Option<String>,
    },
    Hesitation {
        kind: String,
        duration_ms: i64,
        word: Option<String>,
    },
    HeadMovement {
        status: String,
        movement_score: f64,
        face_detected: bool,
    },
    VideoQuality {
        status: String,
        brightness: f64,
        face_visible: bool,
    },
    FraudSignal {
        confidence: f64,
    },
    ResponseQuality {
        clarity_score: f64,
        word_count: i64,
    },
    Opaque(serde_json::Value),
}

#[derive(Deserialize)]
struct SpeechConfidenceValue {
    score: f64,
    #[serde(default)]
    transcript: Option<String>,
}

#[derive(Deserialize)]
struct HesitationValue {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    duration_ms: i64,
    #[serde(default)]
    word: Option<String>,
}

#[derive(Deserialize)]
struct HeadMovementValue {
    status: String,
    #[serde(default)]
    movement_score: f64,
    #[serde(default)]
    face_detected: bool,
}

#[derive(Deserialize)]
struct VideoQualityValue {
    status: String,
    #[serde(default)]
    brightness: f64,
    #[serde(default)]
    face_visible: bool,
}

#[derive(Deserialize)]
struct FraudSignalValue {
    confidence: f64,
}

#[derive(Deserialize)]
struct ResponseQualityValue {
    clarity_score: f64,
    #[serde(default)]
    word_count: i64,
}

impl InsightValue {
    pub fn from_wire(insight_type: &str, value: &serde_json::Value) -> Self {
        let parsed = match insight_type {
            "SPEECH_CONFIDENCE" => serde_json::from_value::<SpeechConfidenceValue>(value.clone())
                .ok()
                .map(|v| InsightValue::SpeechConfidence {
                    score: v.score,
                    transcript: v.transcript,
                }),
            "HESITATION" => serde_json::from_value::<HesitationValue>(value.clone())
                .ok()
                .map(|v| InsightValue::Hesitation {
                    kind: v.kind,
                    duration_ms: v.duration_ms,
                    word: v.word,
                }),
            "HEAD_MOVEMENT" => serde_json::from_value::<HeadMovementValue>(value.clone())
                .ok()
                .map(|v| InsightValue::HeadMovement {
                    status: v.status,
                    movement_score: v.movement_score,
                    face_detected: v.face_detected,
                }),
            "VIDEO_QUALITY" => serde_json::from_value::<VideoQualityValue>(value.clone())
                .ok()
                .map(|v| InsightValue::VideoQuality {
                    status: v.status,
                    brightness: v.brightness,
                    face_visible: v.face_visible,
                }),
            "MULTIPLE_FACES" | "FACE_SWITCH" | "BACKGROUND_VOICE" | "TAB_SWITCH" => {
                serde_json::from_value::<FraudSignalValue>(value.clone())
                    .ok()
                    .map(|v| InsightValue::FraudSignal {
                        confidence: v.confidence,
                    })
            }
            "RESPONSE_QUALITY" => serde_json::from_value::<ResponseQualityValue>(value.clone())
                .ok()
                .map(|v| InsightValue::ResponseQuality {
                    clarity_score: v.clarity_score,
                    word_count: v.word_count,
                }),
            _ => None,
        };

        parsed.unwrap_or_else(|| InsightValue::Opaque(value.clone()))
    }

    /// Confidence carried by the value payload, where the type defines one.
    pub fn confidence(&self) -> Option<f64> {
        match self {
            InsightValue::FraudSignal { confidence } => Some(*confidence),
            InsightValue::SpeechConfidence { score, .. } => Some(*score),
            _ => None,
        }
    }
}
