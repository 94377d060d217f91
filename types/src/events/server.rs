mod error;

pub use error::ErrorDetails;

use crate::audio::Base64EncodedAudioBytes;

/// `error` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    event_id: String,

    /// Details about the error
    error: ErrorDetails,
}

impl ErrorEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn error(&self) -> &ErrorDetails {
        &self.error
    }
}

/// `session.created` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionCreatedEvent {
    #[serde(default)]
    event_id: String,
    /// The session resource, kept opaque
    #[serde(default)]
    session: serde_json::Value,
}

impl SessionCreatedEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn session(&self) -> &serde_json::Value {
        &self.session
    }
}

/// `session.updated` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionUpdatedEvent {
    #[serde(default)]
    event_id: String,

    /// The updated session resource, kept opaque
    #[serde(default)]
    session: serde_json::Value,
}

impl SessionUpdatedEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn session(&self) -> &serde_json::Value {
        &self.session
    }
}

/// `input_audio_buffer.committed` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferCommittedEvent {
    #[serde(default)]
    event_id: String,
    /// The ID of the preceding item after which the new item will be inserted
    #[serde(default)]
    previous_item_id: Option<String>,
    /// The ID of the user message item that will be created
    #[serde(default)]
    item_id: String,
}

impl InputAudioBufferCommittedEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn previous_item_id(&self) -> Option<&str> {
        self.previous_item_id.as_deref()
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }
}

/// `input_audio_buffer.speech_started` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferSpeechStartedEvent {
    #[serde(default)]
    event_id: String,
    /// Milliseconds since the session started when speech was detected
    #[serde(default)]
    audio_start_ms: u64,
    #[serde(default)]
    item_id: String,
}

impl InputAudioBufferSpeechStartedEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn audio_start_ms(&self) -> u64 {
        self.audio_start_ms
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }
}

/// `input_audio_buffer.speech_stopped` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferSpeechStoppedEvent {
    #[serde(default)]
    event_id: String,
    /// Milliseconds since the session started when speech stopped
    #[serde(default)]
    audio_end_ms: u64,
    #[serde(default)]
    item_id: String,
}

impl InputAudioBufferSpeechStoppedEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn audio_end_ms(&self) -> u64 {
        self.audio_end_ms
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }
}

/// `response.content.done` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseContentDoneEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    response_id: String,
}

impl ResponseContentDoneEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn response_id(&self) -> &str {
        &self.response_id
    }
}

/// `response.done` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseDoneEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    response: ResponseResource,
}

impl ResponseDoneEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn response(&self) -> &ResponseResource {
        &self.response
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ResponseResource {
    #[serde(default)]
    id: String,
    /// "completed", "cancelled", "failed" or "incomplete"
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ResponseResource {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    #[serde(default)]
    total_tokens: u64,
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }
}

/// `response.audio.delta` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseAudioDeltaEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    response_id: String,
    #[serde(default)]
    item_id: String,
    /// Incremental audio in the negotiated output format
    delta: Base64EncodedAudioBytes,
}

impl ResponseAudioDeltaEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn response_id(&self) -> &str {
        &self.response_id
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn delta(&self) -> &Base64EncodedAudioBytes {
        &self.delta
    }

    pub fn into_delta(self) -> Base64EncodedAudioBytes {
        self.delta
    }
}

/// `rate_limits.updated` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimitsUpdatedEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    rate_limits: Vec<RateLimit>,
}

impl RateLimitsUpdatedEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn rate_limits(&self) -> &[RateLimit] {
        &self.rate_limits
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimit {
    /// "requests" or "tokens"
    name: String,
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    remaining: u64,
    #[serde(default)]
    reset_seconds: f64,
}

impl RateLimit {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn reset_seconds(&self) -> f64 {
        self.reset_seconds
    }
}
