//! Process configuration.
//!
//! Everything is read once at startup into a [`Config`] that is shared by
//! reference with the HTTP endpoint, the media socket handler and the bridge.

use std::path::PathBuf;

use secrecy::SecretString;
use tracing::Level;

use crate::client;
use crate::types::audio::{AudioFormat, TurnDetection, Voice};
use crate::types::Session;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TEXML_PATH: &str = "texml.xml";
pub const DEFAULT_TEMPERATURE: f64 = 0.8;
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful and bubbly AI assistant who loves to chat about anything the user is interested about and is prepared to offer them facts.";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP port; the media WebSocket listens on the next port up.
    pub port: u16,
    pub texml_path: PathBuf,
    pub realtime: client::Config,
    pub voice: Voice,
    pub system_message: String,
    pub temperature: f64,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honoured. Recognised variables:
    ///
    /// *   `OPENAI_API_KEY`: Secret key for the realtime service. Required.
    /// *   `PORT`: HTTP port. Defaults to 8000; the media socket uses `PORT + 1`.
    /// *   `VOICE`: Voice the assistant answers with. Defaults to "alloy".
    /// *   `SYSTEM_MESSAGE`: Instructions sent with the session negotiation.
    /// *   `TEMPERATURE`: Sampling temperature. Defaults to 0.8.
    /// *   `OPENAI_REALTIME_MODEL`: Model identifier placed in the connection URL.
    /// *   `OPENAI_REALTIME_URL`: Base WebSocket URL of the realtime service.
    /// *   `TEXML_PATH`: Location of the call markup template. Defaults to "texml.xml".
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = var("OPENAI_API_KEY").ok_or_else(|| {
            ConfigError::MissingVar("OPENAI_API_KEY must be set".to_string())
        })?;

        let port = match var("PORT") {
            Some(value) => parse_port(&value)?,
            None => DEFAULT_PORT,
        };

        let texml_path = var("TEXML_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEXML_PATH));

        let mut realtime = client::Config::builder(SecretString::from(api_key));
        if let Some(url) = var("OPENAI_REALTIME_URL") {
            realtime = realtime.with_base_url(&url);
        }
        if let Some(model) = var("OPENAI_REALTIME_MODEL") {
            realtime = realtime.with_model(&model);
        }

        let voice = var("VOICE")
            .and_then(|value| value.parse::<Voice>().ok())
            .unwrap_or(Voice::Alloy);

        let system_message =
            var("SYSTEM_MESSAGE").unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string());

        let temperature = match var("TEMPERATURE") {
            Some(value) => value.trim().parse::<f64>().map_err(|e| {
                ConfigError::InvalidValue("TEMPERATURE".to_string(), e.to_string())
            })?,
            None => DEFAULT_TEMPERATURE,
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            port,
            texml_path,
            realtime: realtime.build(),
            voice,
            system_message,
            temperature,
            log_level,
        })
    }

    /// Port of the media WebSocket listener, `None` when `port` is the last one.
    pub fn media_port(&self) -> Option<u16> {
        self.port.checked_add(1)
    }

    /// Negotiation parameters sent on every new realtime connection.
    pub fn session(&self) -> Session {
        Session::new()
            .with_turn_detection_enable(TurnDetection::default())
            .with_input_audio_format(AudioFormat::Mulaw)
            .with_output_audio_format(AudioFormat::Mulaw)
            .with_voice(self.voice.clone())
            .with_instructions(&self.system_message)
            .with_modalities_enable_audio()
            .with_temperature(self.temperature)
            .build()
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    let port = value
        .trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), e.to_string()))?;
    if port == u16::MAX {
        return Err(ConfigError::InvalidValue(
            "PORT".to_string(),
            "no room for the media port above it".to_string(),
        ));
    }
    Ok(port)
}
