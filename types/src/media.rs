//! Telephony media stream envelopes.
//!
//! The platform streams call audio as JSON text frames tagged by `event`.
//! Audio payloads are base64 in the call's native codec and are never decoded.

use crate::audio::Base64EncodedAudioBytes;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MediaStreamEvent {
    Connected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<StreamStart>,
    },
    Media {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        media: MediaPayload,
    },
    Stop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
    },
    Mark {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mark: Option<Mark>,
    },
    Dtmf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dtmf: Option<Dtmf>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

impl MediaStreamEvent {
    /// Outbound audio frame as the platform expects it.
    pub fn media(payload: Base64EncodedAudioBytes) -> Self {
        MediaStreamEvent::Media {
            stream_id: None,
            media: MediaPayload::new(payload),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            MediaStreamEvent::Connected { .. } => "connected",
            MediaStreamEvent::Start { .. } => "start",
            MediaStreamEvent::Media { .. } => "media",
            MediaStreamEvent::Stop { .. } => "stop",
            MediaStreamEvent::Mark { .. } => "mark",
            MediaStreamEvent::Dtmf { .. } => "dtmf",
            MediaStreamEvent::Error { .. } => "error",
            MediaStreamEvent::Other => "other",
        }
    }

    pub fn stream_id(&self) -> Option<&str> {
        match self {
            MediaStreamEvent::Start { stream_id, .. }
            | MediaStreamEvent::Media { stream_id, .. }
            | MediaStreamEvent::Stop { stream_id }
            | MediaStreamEvent::Mark { stream_id, .. }
            | MediaStreamEvent::Dtmf { stream_id, .. }
            | MediaStreamEvent::Error { stream_id, .. } => stream_id.as_deref(),
            MediaStreamEvent::Connected { .. } | MediaStreamEvent::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaPayload {
    /// "inbound" or "outbound" on platform frames, absent on frames we send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    track: Option<String>,
    payload: Base64EncodedAudioBytes,
}

impl MediaPayload {
    pub fn new(payload: Base64EncodedAudioBytes) -> Self {
        Self {
            track: None,
            payload,
        }
    }

    pub fn track(&self) -> Option<&str> {
        self.track.as_deref()
    }

    pub fn payload(&self) -> &Base64EncodedAudioBytes {
        &self.payload
    }

    pub fn into_payload(self) -> Base64EncodedAudioBytes {
        self.payload
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamStart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    call_control_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media_format: Option<MediaFormat>,
}

impl StreamStart {
    pub fn call_control_id(&self) -> Option<&str> {
        self.call_control_id.as_deref()
    }

    pub fn media_format(&self) -> Option<&MediaFormat> {
        self.media_format.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaFormat {
    /// e.g. "PCMU"
    #[serde(default)]
    encoding: String,
    #[serde(default)]
    sample_rate: u32,
    #[serde(default)]
    channels: u16,
}

impl MediaFormat {
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mark {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Dtmf {
    pub digit: String,
}
