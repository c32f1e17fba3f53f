//! Inference tier backends.
//!
//! Both backends answer with the same [`ResolvedCommand`] contract. `Ok(None)`
//! means the backend replied with nothing to interpret; errors are classified
//! by [`VoiceNavError`] variant (timeout, transport, parse) and turned into a
//! failed command by the resolver.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RemoteInferenceConfig;
use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::llm::provider::LlmProvider;
use crate::llm::registry::ProviderRegistry;
use crate::llm::types::{CallConfig, ChatMessage};
use crate::perception::types::CandidateElement;
use crate::resolver::types::ResolvedCommand;

#[async_trait]
pub trait Inference: Send + Sync {
    fn name(&self) -> &str;

    async fn infer(
        &self,
        command: &str,
        elements: &[CandidateElement],
    ) -> VoiceNavResult<Option<ResolvedCommand>>;
}

/// Request body of the inference service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommandRequest {
    #[serde(default)]
    pub dom_elements: Vec<CandidateElement>,
    #[serde(default)]
    pub command: Option<String>,
}

const SYSTEM_PROMPT: &str = "Eres un asistente de accesibilidad rápido para MiSaludDigital. \
Interpretas comandos de voz y eliges un elemento de la página sobre el que actuar.";

pub fn build_prompt(command: &str, elements: &[CandidateElement]) -> String {
    let listing = serde_json::to_string_pretty(elements).unwrap_or_else(|_| "[]".into());
    format!(
        r#"ELEMENTOS DOM (solo los más relevantes):
{listing}

COMANDO: "{command}"

INSTRUCCIONES:
- Responde con JSON válido ÚNICAMENTE
- Prioriza elementos con ID específico
- Si no encuentras coincidencia exacta, elige la más parecida
- Mensajes cortos y claros

FORMATO:
{{
  "action": "click|scroll|navigate|focus|none",
  "element": "selector_css",
  "message": "mensaje_corto",
  "success": true|false
}}

RESPUESTA:"#
    )
}

/// Parses a model reply into a command, tolerating prose or code fences
/// around the JSON object.
///
/// Each `{` is tried in order and only one value is read from it, so text
/// after the object (braces included) is ignored.
pub fn parse_reply(reply: &str) -> VoiceNavResult<ResolvedCommand> {
    let mut last_error = None;
    for (start, _) in reply.match_indices('{') {
        let mut values =
            serde_json::Deserializer::from_str(&reply[start..]).into_iter::<ResolvedCommand>();
        match values.next() {
            Some(Ok(command)) => return Ok(command.normalized()),
            Some(Err(e)) => {
                last_error.get_or_insert(e);
            }
            None => {}
        }
    }
    match last_error {
        Some(e) => Err(VoiceNavError::Parse(format!("malformed command JSON: {e}"))),
        None => Err(VoiceNavError::Parse(format!(
            "no JSON object in reply: {}",
            reply.chars().take(80).collect::<String>()
        ))),
    }
}

/// Asks an OpenAI-compatible model directly.
pub struct LlmInference {
    provider: Arc<dyn LlmProvider>,
    call: CallConfig,
}

impl LlmInference {
    pub fn new(provider: Arc<dyn LlmProvider>, call: CallConfig) -> Self {
        Self { provider, call }
    }

    pub fn from_registry(registry: &ProviderRegistry) -> VoiceNavResult<Self> {
        let (provider, call) = registry.call_config_for_role("commands")?;
        Ok(Self::new(provider, call))
    }
}

#[async_trait]
impl Inference for LlmInference {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn infer(
        &self,
        command: &str,
        elements: &[CandidateElement],
    ) -> VoiceNavResult<Option<ResolvedCommand>> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(command, elements)),
        ];
        let response = self.provider.chat(messages, &self.call).await?;
        if response.content.trim().is_empty() {
            tracing::warn!(provider = %self.provider.name(), "empty completion");
            return Ok(None);
        }
        parse_reply(&response.content).map(Some)
    }
}

/// Client for a remote inference service speaking the `/api/voice-command` contract.
pub struct RemoteInference {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl RemoteInference {
    pub fn new(config: &RemoteInferenceConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> VoiceNavError {
        if e.is_timeout() {
            VoiceNavError::Timeout(self.timeout.as_millis() as u64)
        } else {
            VoiceNavError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Inference for RemoteInference {
    fn name(&self) -> &str {
        "remote"
    }

    async fn infer(
        &self,
        command: &str,
        elements: &[CandidateElement],
    ) -> VoiceNavResult<Option<ResolvedCommand>> {
        let body = VoiceCommandRequest {
            dom_elements: elements.to_vec(),
            command: Some(command.to_string()),
        };
        tracing::debug!(endpoint = %self.endpoint, elements = elements.len(), "remote inference request");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceNavError::Transport(format!("HTTP error! status: {status}")));
        }

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let command = serde_json::from_str::<ResolvedCommand>(&text)
            .map_err(|e| VoiceNavError::Parse(format!("unexpected service reply: {e}")))?;
        Ok(Some(command.normalized()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::LlmResponse;
    use crate::resolver::types::Action;

    struct CannedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn chat(
            &self,
            messages: Vec<ChatMessage>,
            _cfg: &CallConfig,
        ) -> VoiceNavResult<LlmResponse> {
            assert_eq!(messages.len(), 2);
            assert!(messages[1].content.contains("COMANDO:"));
            Ok(LlmResponse {
                content: self.0.to_string(),
            })
        }
    }

    fn inference(reply: &'static str) -> LlmInference {
        LlmInference::new(
            Arc::new(CannedProvider(reply)),
            CallConfig {
                model: "m".into(),
                temperature: 0.1,
                max_tokens: 150,
                top_p: 0.9,
            },
        )
    }

    #[test]
    fn parse_reply_accepts_fenced_json() {
        let reply = "Claro:\n```json\n{\"action\":\"click\",\"element\":\"#turnos\",\"message\":\"Abriendo\",\"success\":true}\n```";
        let cmd = parse_reply(reply).unwrap();
        assert_eq!(cmd, ResolvedCommand::new(Action::Click, "#turnos", "Abriendo"));
    }

    #[test]
    fn parse_reply_rejects_prose() {
        assert!(matches!(
            parse_reply("No entiendo el comando"),
            Err(VoiceNavError::Parse(_))
        ));
        assert!(matches!(parse_reply("{not json}"), Err(VoiceNavError::Parse(_))));
    }

    #[test]
    fn parse_reply_stops_at_first_complete_object() {
        let reply = "{\"action\":\"scroll\",\"element\":\"#inicio\",\"message\":\"Navegando a inicio\",\"success\":true}\nNota: elegí el elemento con {id} explícito.";
        let cmd = parse_reply(reply).unwrap();
        assert_eq!(cmd, ResolvedCommand::new(Action::Scroll, "#inicio", "Navegando a inicio"));
    }

    #[test]
    fn parse_reply_skips_braces_in_leading_prose() {
        let reply = "Usé {contexto} previo.\n{\"action\":\"focus\",\"element\":\"#buscar\",\"message\":\"Buscar\",\"success\":true}";
        let cmd = parse_reply(reply).unwrap();
        assert_eq!(cmd, ResolvedCommand::new(Action::Focus, "#buscar", "Buscar"));
    }

    #[test]
    fn prompt_lists_elements_and_command() {
        let el = CandidateElement {
            tag: "section".into(),
            selector: "#farmacias".into(),
            ..Default::default()
        };
        let prompt = build_prompt("buscar farmacias", &[el]);
        assert!(prompt.contains("\"selector\": \"#farmacias\""));
        assert!(prompt.contains("COMANDO: \"buscar farmacias\""));
        assert!(prompt.contains("click|scroll|navigate|focus|none"));
    }

    #[tokio::test]
    async fn llm_inference_parses_reply() {
        let out = inference(r##"{"action":"scroll","element":"#farmacias","message":"Farmacias","success":true}"##)
            .infer("buscar farmacias", &[])
            .await
            .unwrap();
        assert_eq!(out.unwrap().target, "#farmacias");
    }

    #[tokio::test]
    async fn llm_inference_empty_reply_is_none() {
        let out = inference("   ").infer("algo", &[]).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn llm_inference_failed_reply_drops_action() {
        let out = inference(r##"{"action":"click","element":"#x","message":"No encontrado","success":false}"##)
            .infer("algo", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.action, Action::None);
        assert!(!out.success);
    }

    #[test]
    fn request_body_uses_camel_case() {
        let body: VoiceCommandRequest =
            serde_json::from_str(r##"{"domElements":[{"tag":"a","selector":"#x"}],"command":"ir"}"##)
                .unwrap();
        assert_eq!(body.dom_elements.len(), 1);
        assert_eq!(body.command.as_deref(), Some("ir"));

        let empty: VoiceCommandRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.command.is_none());
        assert!(empty.dom_elements.is_empty());
    }
}
