//! Host configuration, loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use realtime_middle_tier::types::audio::{ServerVadTurnDetection, TurnDetection, Voice};
use realtime_middle_tier::types::session::MaxOutputTokens;
use realtime_middle_tier::upstream::DEFAULT_API_VERSION;
use secrecy::SecretString;
use tracing::Level;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8765";
pub const DEFAULT_SYSTEM_PROMPT_PATH: &str = "system_prompt.md";
pub const DEFAULT_VOICE: &str = "sage";
/// The path clients open their realtime websocket on.
pub const REALTIME_ROUTE: &str = "/realtime";

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    /// When absent the relay authenticates with a bearer token instead.
    pub api_key: Option<SecretString>,
    pub voice: Voice,
    pub bind_address: String,
    pub system_prompt_path: PathBuf,
    pub temperature: Option<f64>,
    pub max_tokens: Option<MaxOutputTokens>,
    pub disable_audio: Option<bool>,
    pub turn_detection: TurnDetection,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from the process environment, after reading a
    /// `.env` file if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| lookup(var).ok_or(ConfigError::MissingVar(var));

        let endpoint = required("AZURE_OPENAI_ENDPOINT")?;
        let deployment = required("AZURE_OPENAI_REALTIME_DEPLOYMENT")?;
        let api_version =
            lookup("AZURE_OPENAI_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        let api_key = lookup("AZURE_OPENAI_API_KEY")
            .filter(|key| !key.is_empty())
            .map(SecretString::from);

        let voice = lookup("AZURE_OPENAI_VOICE_CHOICE")
            .filter(|voice| !voice.is_empty())
            .unwrap_or_else(|| DEFAULT_VOICE.to_string());
        let voice = voice.parse::<Voice>().unwrap_or(Voice::Custom(voice));

        let bind_address =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let system_prompt_path = lookup("SYSTEM_PROMPT_PATH")
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT_PATH.to_string())
            .into();

        let temperature = parse_optional(&lookup, "MIDDLE_TIER_TEMPERATURE")?;
        let max_tokens = parse_optional(&lookup, "MIDDLE_TIER_MAX_TOKENS")?;
        let disable_audio = parse_optional(&lookup, "MIDDLE_TIER_DISABLE_AUDIO")?;

        let mut vad = ServerVadTurnDetection::default();
        if let Some(threshold) = parse_optional(&lookup, "TURN_DETECTION_THRESHOLD")? {
            vad = vad.with_threshold(threshold);
        }
        if let Some(silence_ms) = parse_optional(&lookup, "TURN_DETECTION_SILENCE_MS")? {
            vad = vad.with_silence_duration_ms(silence_ms);
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            endpoint,
            deployment,
            api_version,
            api_key,
            voice,
            bind_address,
            system_prompt_path,
            temperature,
            max_tokens,
            disable_audio,
            turn_detection: TurnDetection::ServerVad(vad),
            log_level,
        })
    }
}

fn parse_optional<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
