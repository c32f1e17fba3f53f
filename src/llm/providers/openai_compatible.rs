use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String, timeout: Duration) -> Self {
        Self {
            id,
            api_base,
            api_key,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> VoiceNavError {
        if e.is_timeout() {
            VoiceNavError::Timeout(self.timeout.as_millis() as u64)
        } else {
            VoiceNavError::Transport(format!("{}: {e}", self.id))
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        cfg: &CallConfig,
    ) -> VoiceNavResult<LlmResponse> {
        let body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_tokens,
            "top_p": cfg.top_p,
        });

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            messages = messages.len(),
            "sending LLM request"
        );

        let mut request = self
            .client
            .post(&self.api_base)
            .timeout(self.timeout)
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(VoiceNavError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        self.handle_json(response).await
    }
}

impl OpenAiCompatibleProvider {
    async fn handle_json(&self, response: reqwest::Response) -> VoiceNavResult<LlmResponse> {
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| VoiceNavError::Parse(format!("provider returned non-JSON body: {e}")))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        tracing::info!(
            provider = %self.id,
            content_len = content.len(),
            "LLM JSON response received"
        );

        Ok(LlmResponse { content })
    }
}
