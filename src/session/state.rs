use crate::resolver::types::ResolvedCommand;

/// Lifecycle states of a voice session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Listening,
    Resolving { utterance: String },
    Executing { command: ResolvedCommand },
    Speaking { message: String },
    Error(String),
}

impl SessionState {
    /// True while an utterance is being handled end to end.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Resolving { .. } | SessionState::Executing { .. } | SessionState::Speaking { .. }
        )
    }
}
