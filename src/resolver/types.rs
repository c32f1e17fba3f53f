use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The four page actions plus the no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Click,
    Scroll,
    Navigate,
    Focus,
    /// Anything the inference tier invents outside the four actions lands here.
    #[default]
    #[serde(other)]
    None,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Scroll => "scroll",
            Action::Navigate => "navigate",
            Action::Focus => "focus",
            Action::None => "none",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result contract shared by every tier and by the inference service wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCommand {
    #[serde(default)]
    pub action: Action,
    /// CSS-style selector of the target, possibly empty.
    #[serde(rename = "element", default)]
    pub target: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub success: bool,
}

impl ResolvedCommand {
    pub fn new(action: Action, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
            message: message.into(),
            success: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            action: Action::None,
            target: String::new(),
            message: message.into(),
            success: false,
        }
    }

    /// Enforces `success == false => action == none` and drops the target with it.
    pub fn normalized(mut self) -> Self {
        if !self.success {
            self.action = Action::None;
            self.target.clear();
        }
        self
    }

    /// Whether the executor should touch the page at all.
    pub fn is_actionable(&self) -> bool {
        self.success && self.action != Action::None
    }
}

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Direct,
    Cached,
    Inferred,
    Failed,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Direct => "direct",
            Tier::Cached => "cached",
            Tier::Inferred => "inferred",
            Tier::Failed => "failed",
        }
    }
}

/// Why the inference tier did not produce a usable command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Transport,
    Parse,
    /// The backend answered with nothing to interpret.
    Empty,
}

impl FailureKind {
    /// User-facing message carried by the failed command.
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "Comando abortado por timeout",
            FailureKind::Transport => "Error al procesar el comando de voz",
            FailureKind::Parse => "Error al interpretar comando",
            FailureKind::Empty => "No se pudo procesar el comando",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub command: ResolvedCommand,
    pub tier: Tier,
    pub failure: Option<FailureKind>,
    pub elapsed: Duration,
}

/// Lower-cases and trims a raw utterance.
pub fn normalize_utterance(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_element_field() {
        let cmd = ResolvedCommand::new(Action::Scroll, "#inicio", "Navegando a inicio");
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "scroll",
                "element": "#inicio",
                "message": "Navegando a inicio",
                "success": true
            })
        );
    }

    #[test]
    fn unknown_action_and_missing_fields_degrade_to_none() {
        let cmd: ResolvedCommand =
            serde_json::from_str(r#"{"action": "teleport", "message": "??"}"#).unwrap();
        assert_eq!(cmd.action, Action::None);
        assert_eq!(cmd.target, "");
        assert!(!cmd.success);
    }

    #[test]
    fn normalized_strips_action_from_failures() {
        let cmd = ResolvedCommand {
            action: Action::Click,
            target: "#turnos".into(),
            message: "no".into(),
            success: false,
        }
        .normalized();
        assert_eq!(cmd.action, Action::None);
        assert!(cmd.target.is_empty());
        assert!(!cmd.is_actionable());
    }

    #[test]
    fn normalize_utterance_trims_and_lowercases() {
        assert_eq!(normalize_utterance("  Ir a INICIO \n"), "ir a inicio");
        assert_eq!(normalize_utterance("Historial Clínico"), "historial clínico");
    }
}
