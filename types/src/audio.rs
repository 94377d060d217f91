mod turn_detection;
mod consts;

pub use turn_detection::{TurnDetection, ServerVadTurnDetection};
pub use consts::*;

/// Audio data encoded as base64, relayed without decoding.
pub type Base64EncodedAudioBytes = String;
