use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub insights: InsightSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Shared HS256 secret used to verify bearer tokens issued upstream.
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    /// Production posture: only the candidate of a round may submit media.
    /// Relaxed (dev) posture accepts any authenticated role.
    #[serde(default = "default_true")]
    pub candidate_only: bool,
    /// XADD trims each media stream to roughly this many entries.
    #[serde(default = "default_stream_maxlen")]
    pub stream_maxlen: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightSettings {
    /// Window of persisted insights replayed to a freshly joined connection.
    #[serde(default = "default_catch_up_secs")]
    pub catch_up_window_secs: u64,
    /// Confidence attached to a promoted alert when the insight value
    /// carries none.
    #[serde(default = "default_alert_confidence")]
    pub default_alert_confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default = "default_fraud_url")]
    pub fraud_url: String,
    #[serde(default = "default_speech_url")]
    pub speech_url: String,
    #[serde(default = "default_video_url")]
    pub video_url: String,
    #[serde(default = "default_nlp_url")]
    pub nlp_url: String,
    #[serde(default = "default_internal_key")]
    pub internal_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Settings {
    /// Loads settings from an optional TOML file (`INTERVUE_CONFIG`, default
    /// `config/default.toml`) with `INTERVUE__`-prefixed env overrides on
    /// top, e.g. `INTERVUE__DATABASE__URL`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("INTERVUE_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());

        Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("INTERVUE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            candidate_only: true,
            stream_maxlen: default_stream_maxlen(),
        }
    }
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            catch_up_window_secs: default_catch_up_secs(),
            default_alert_confidence: default_alert_confidence(),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            fraud_url: default_fraud_url(),
            speech_url: default_speech_url(),
            video_url: default_video_url(),
            nlp_url: default_nlp_url(),
            internal_api_key: default_internal_key(),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_secs: default_window_secs(),
            reset_timeout_secs: default_reset_timeout_secs(),
            half_open_max_calls: default_half_open_max_calls(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_stream_maxlen() -> usize {
    10_000
}

fn default_catch_up_secs() -> u64 {
    30
}

fn default_alert_confidence() -> f64 {
    0.75
}

fn default_fraud_url() -> String {
    "http://localhost:8003".to_string()
}

fn default_speech_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_video_url() -> String {
    "http://localhost:8002".to_string()
}

fn default_nlp_url() -> String {
    "http://localhost:8004".to_string()
}

fn default_internal_key() -> String {
    "dev-internal-key".to_string()
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    30
}

fn default_reset_timeout_secs() -> u64 {
    30
}

fn default_half_open_max_calls() -> u32 {
    2
}

fn default_call_timeout_secs() -> u64 {
    5
}
