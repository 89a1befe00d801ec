use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::providers::traits::{CompletionProvider, LlmError};

#[derive(Clone)]
pub struct GeminiProvider {
    api_key: String,
    system_message: String,
    client: Client,
    model: String,
    api_url: String,
    temperature: f32,
}

impl GeminiProvider {
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
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.api_url, self.model);
        debug!("Sending prompt to Gemini model {}", self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{
                    "role": "user",
                    "parts": [{
                        "text": format!("{}\n{}", self.system_message, prompt)
                    }]
                }],
                "generationConfig": {
                    "temperature": self.temperature
                }
            }))
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!(
                "Gemini API request failed: Status {}, Body: {}",
                status, error_text
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(format!("Gemini response is not JSON: {}", e)))?;

        extract_text(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Pulls the first candidate's text out of a `generateContent` response.
fn extract_text(response_json: &Value) -> Result<String, LlmError> {
    if let Some(error) = response_json.get("error") {
        return Err(LlmError::Unavailable(format!("Gemini returned error: {}", error)));
    }

    if let Some(reason) = response_json
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(|reason| reason.as_str())
    {
        return Err(LlmError::MalformedResponse(format!(
            "Gemini blocked the prompt: {}",
            reason
        )));
    }

    response_json["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LlmError::MalformedResponse("Gemini response has no candidate text".to_string()))
}
