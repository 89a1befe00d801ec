use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::providers::traits::{CompletionProvider, LlmError};

/// Chat-completions client for OpenAI-compatible endpoints (Groq by default).
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    api_key: String,
    system_message: String,
    client: Client,
    model: String,
    api_url: String,
    temperature: f32,
}

impl OpenAiCompatProvider {
    pub fn new(config: &ProviderConfig, system_message: String) -> Self {
        Self {
            api_key: config.api_key.clone(),
            system_message,
            client: Client::new(),
            model: config.model.clone(),
            api_url: config.api_url.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        debug!("Sending prompt to chat model {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "system",
                        "content": self.system_message
                    },
                    {
                        "role": "user",
                        "content": prompt
                    }
                ],
                "temperature": self.temperature
            }))
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("Chat completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!(
                "API request failed: Status {}, Body: {}",
                status, error_text
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(format!("Response is not JSON: {}", e)))?;

        extract_content(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn extract_content(response_json: &Value) -> Result<String, LlmError> {
    // Check for API-level errors
    if let Some(error) = response_json.get("error") {
        return Err(LlmError::Unavailable(format!("API returned error: {}", error)));
    }

    response_json
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LlmError::MalformedResponse("Response has no message content".to_string()))
}
