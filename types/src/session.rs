use crate::audio::{AudioFormat, TurnDetection, Voice};

/// Negotiation parameters carried by a `session.update` event.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    /// Configuration for turn detection. Omitted to leave it off.
    #[serde(skip_serializing_if = "Option::is_none")]
    turn_detection: Option<TurnDetection>,

    /// The format of input audio. Options are "pcm16", "g711_ulaw", "g711_alaw".
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_format: Option<AudioFormat>,

    /// The format of output audio. Options are "pcm16", "g711_ulaw", "g711_alaw".
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_format: Option<AudioFormat>,

    /// The voice the model uses to respond. Cannot be changed once the model has responded with audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<Voice>,

    /// The default system instructions prepended to model calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,

    /// The set of modalities the model can respond with.
    modalities: Vec<String>,

    /// Sampling temperature for the model.
    temperature: f64,
}

impl Session {
    pub fn new() -> SessionConfigurator {
        SessionConfigurator::new()
    }

    pub fn turn_detection(&self) -> Option<&TurnDetection> {
        self.turn_detection.as_ref()
    }

    pub fn input_audio_format(&self) -> Option<AudioFormat> {
        self.input_audio_format
    }

    pub fn output_audio_format(&self) -> Option<AudioFormat> {
        self.output_audio_format
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn modalities(&self) -> &[String] {
        &self.modalities
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

pub struct SessionConfigurator {
    session: Session,
}

impl SessionConfigurator {
    pub fn new() -> Self {
        Self {
            session: Session {
                turn_detection: None,
                input_audio_format: None,
                output_audio_format: None,
                voice: None,
                instructions: None,
                modalities: vec!["text".to_string(), "audio".to_string()],
                temperature: 0.8,
            },
        }
    }

    pub fn with_modalities(mut self, modalities: Vec<String>) -> Self {
        self.session.modalities = modalities;
        self
    }

    pub fn with_modalities_enable_audio(mut self) -> Self {
        self.session.modalities = vec!["text".to_string(), "audio".to_string()];
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.session.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.session.voice = Some(voice);
        self
    }

    pub fn with_input_audio_format(mut self, format: AudioFormat) -> Self {
        self.session.input_audio_format = Some(format);
        self
    }

    pub fn with_output_audio_format(mut self, format: AudioFormat) -> Self {
        self.session.output_audio_format = Some(format);
        self
    }

    pub fn with_turn_detection_enable(mut self, turn_detection: TurnDetection) -> Self {
        self.session.turn_detection = Some(turn_detection);
        self
    }

    pub fn with_turn_detection_disable(mut self) -> Self {
        self.session.turn_detection = None;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.session.temperature = temperature;
        self
    }

    pub fn build(self) -> Session {
        self.session
    }
}

impl Default for SessionConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn telephony_session_shape() {
        let session = Session::new()
            .with_turn_detection_enable(TurnDetection::default())
            .with_input_audio_format(AudioFormat::Mulaw)
            .with_output_audio_format(AudioFormat::Mulaw)
            .with_voice(Voice::Alloy)
            .with_instructions("Be brief.")
            .with_modalities_enable_audio()
            .with_temperature(0.8)
            .build();

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(
            value,
            json!({
                "turn_detection": {"type": "server_vad"},
                "input_audio_format": "g711_ulaw",
                "output_audio_format": "g711_ulaw",
                "voice": "alloy",
                "instructions": "Be brief.",
                "modalities": ["text", "audio"],
                "temperature": 0.8
            })
        );
    }

    #[test]
    fn unset_options_are_omitted() {
        let session = Session::new().with_turn_detection_disable().build();
        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("turn_detection").is_none());
        assert!(value.get("voice").is_none());
        assert_eq!(value["modalities"], json!(["text", "audio"]));
    }
}
