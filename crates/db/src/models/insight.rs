use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One analysis signal about a live round, as persisted and as delivered
/// over the wire. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: Uuid,
    pub round_id: Uuid,
    pub insight_type: String,
    pub category: InsightCategory,
    pub severity: InsightSeverity,
    /// Milliseconds relative to interview start, as stamped by the worker.
    pub timestamp_ms: i64,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    pub const TABLE: &'static str = "live_insights";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Speech,
    Video,
    Fraud,
    Nlp,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCategory::Speech => "speech",
            InsightCategory::Video => "video",
            InsightCategory::Fraud => "fraud",
            InsightCategory::Nlp => "nlp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "speech" => Some(InsightCategory::Speech),
            "video" => Some(InsightCategory::Video),
            "fraud" => Some(InsightCategory::Fraud),
            "nlp" => Some(InsightCategory::Nlp),
            _ => None,
        }
    }
}

/// Severity levels ordered from least to most severe; ordering matters for
/// the fraud promotion threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InsightSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl InsightSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightSeverity::Info => "INFO",
            InsightSeverity::Low => "LOW",
            InsightSeverity::Medium => "MEDIUM",
            InsightSeverity::High => "HIGH",
            InsightSeverity::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(InsightSeverity::Info),
            "LOW" => Some(InsightSeverity::Low),
            "MEDIUM" => Some(InsightSeverity::Medium),
            "HIGH" => Some(InsightSeverity::High),
            "CRITICAL" => Some(InsightSeverity::Critical),
            _ => None,
        }
    }
}
