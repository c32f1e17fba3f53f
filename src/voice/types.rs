use serde::{Deserialize, Serialize};

/// Events emitted by a speech capture backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    ListeningStarted,
    ListeningEnded,
    Transcript {
        text: String,
        /// 0.0..=1.0 as reported by the recognizer.
        confidence: f32,
        is_final: bool,
    },
    Error {
        message: String,
    },
}
