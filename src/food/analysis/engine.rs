use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::food::models::{AnalysisTexts, ProductInput};
use crate::providers::traits::{CompletionProvider, LlmError};
use crate::providers::utils::extract_json_object;

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    reality_check: Option<String>,
    consumption_advice: Option<String>,
    health_implications: Option<String>,
}

/// Turns product data into the three analysis texts with a single model call.
#[derive(Clone)]
pub struct AnalysisEngine {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl AnalysisEngine {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Does not retry; the provider's failure is returned as-is.
    pub async fn generate(&self, input: &ProductInput) -> Result<AnalysisTexts, LlmError> {
        let prompt = build_prompt(input);
        debug!("Analysis prompt for {}: {} chars", input.name, prompt.len());

        let reply = match tokio::time::timeout(self.timeout, self.provider.complete(&prompt)).await
        {
            Ok(reply) => reply?,
            Err(_) => {
                warn!(
                    "{} did not answer within {:?} for {}",
                    self.provider.model_name(),
                    self.timeout,
                    input.name
                );
                return Err(LlmError::Unavailable(format!(
                    "{} timed out after {}s",
                    self.provider.model_name(),
                    self.timeout.as_secs_f32()
                )));
            }
        };

        parse_analysis(&reply)
    }

    /// Analysis of manually supplied data; nothing is looked up or stored.
    pub async fn analyze_adhoc(
        &self,
        name: &str,
        ingredients: &str,
    ) -> Result<AnalysisTexts, LlmError> {
        let input = ProductInput {
            name: name.to_string(),
            ingredients: ingredients.to_string(),
            ..ProductInput::default()
        };
        self.generate(&input).await
    }
}

fn or_unknown(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        "Not available"
    } else {
        value
    }
}

pub fn build_prompt(input: &ProductInput) -> String {
    format!(
        "Analyze this packaged food product.\n\n\
         Product: {name}\n\
         Ingredients: {ingredients}\n\
         Nutritional information: {nutrition}\n\
         Additives: {additives}\n\
         Consumer allergies: {allergies}\n\
         Consumer health conditions: {diseases}\n\n\
         Respond with a single JSON object and nothing else, using exactly these keys:\n\
         {{\n\
         \x20 \"reality_check\": \"how the product's actual ingredients and nutrition compare with how it is marketed\",\n\
         \x20 \"consumption_advice\": \"how often and how much of it can reasonably be consumed\",\n\
         \x20 \"health_implications\": \"likely health effects, including for the listed allergies and conditions\"\n\
         }}",
        name = or_unknown(&input.name),
        ingredients = or_unknown(&input.ingredients),
        nutrition = or_unknown(&input.nutritional_info),
        additives = or_unknown(&input.additives),
        allergies = or_unknown(&input.allergies),
        diseases = or_unknown(&input.diseases),
    )
}

pub fn parse_analysis(reply: &str) -> Result<AnalysisTexts, LlmError> {
    let json = extract_json_object(reply).ok_or_else(|| {
        LlmError::MalformedResponse(format!(
            "no JSON object in model reply: {}",
            preview(reply)
        ))
    })?;

    let raw: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| LlmError::MalformedResponse(format!("invalid analysis JSON: {}", e)))?;

    Ok(AnalysisTexts {
        reality_check: required(raw.reality_check, "reality_check")?,
        consumption_advice: required(raw.consumption_advice, "consumption_advice")?,
        health_implications: required(raw.health_implications, "health_implications")?,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, LlmError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| LlmError::MalformedResponse(format!("missing or empty {}", field)))
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;

    fn choco_bar() -> ProductInput {
        ProductInput {
            name: "Choco Bar".to_string(),
            ingredients: "sugar, cocoa butter, milk solids".to_string(),
            nutritional_info: r#"{"sugars_100g":48}"#.to_string(),
            ..ProductInput::default()
        }
    }

    #[test]
    fn test_prompt_is_deterministic_and_complete() {
        let prompt = build_prompt(&choco_bar());
        assert_eq!(prompt, build_prompt(&choco_bar()));
        assert!(prompt.contains("Product: Choco Bar"));
        assert!(prompt.contains("Ingredients: sugar, cocoa butter, milk solids"));
        assert!(prompt.contains(r#"Nutritional information: {"sugars_100g":48}"#));
        assert!(prompt.contains("Additives: Not available"));
        assert!(prompt.contains("\"health_implications\""));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"reality_check\": \"R1\", \"consumption_advice\": \"C1\", \"health_implications\": \"H1\"}\n```";
        let texts = parse_analysis(reply).unwrap();
        assert_eq!(texts.reality_check, "R1");
        assert_eq!(texts.consumption_advice, "C1");
        assert_eq!(texts.health_implications, "H1");
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let reply = r#"{"reality_check": "R1", "consumption_advice": "  "}"#;
        assert_eq!(
            parse_analysis(reply),
            Err(LlmError::MalformedResponse("missing or empty consumption_advice".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_analysis("Sorry, I can't analyze that product."),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_calls_provider_once() {
        let provider = Arc::new(FakeProvider::returning("R1", "C1", "H1"));
        let engine = AnalysisEngine::new(provider.clone(), Duration::from_secs(5));

        let texts = engine.generate(&choco_bar()).await.unwrap();
        assert_eq!(texts.reality_check, "R1");
        assert_eq!(provider.calls(), 1);
        assert!(provider.last_prompt().unwrap().contains("Choco Bar"));
    }

    #[tokio::test]
    async fn test_generate_surfaces_provider_error_verbatim() {
        let provider = Arc::new(FakeProvider::failing(LlmError::Unavailable(
            "connection refused".to_string(),
        )));
        let engine = AnalysisEngine::new(provider.clone(), Duration::from_secs(5));

        let err = engine.analyze_adhoc("Choco Bar", "sugar").await.unwrap_err();
        assert_eq!(err, LlmError::Unavailable("connection refused".to_string()));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let provider = Arc::new(
            FakeProvider::returning("R1", "C1", "H1").with_delay(Duration::from_millis(500)),
        );
        let engine = AnalysisEngine::new(provider, Duration::from_millis(20));

        let err = engine.generate(&choco_bar()).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(reason) if reason.contains("timed out")));
    }
}
