pub mod gemini;
pub mod openai;
pub mod traits;
pub mod utils;

use std::sync::Arc;

use crate::config::{LlmProviderKind, ProviderConfig};
use gemini::gemini::GeminiProvider;
use openai::openai::OpenAiCompatProvider;
use traits::CompletionProvider;

pub const SYSTEM_MESSAGE: &str = "You are a food scientist and registered dietitian. \
You read ingredient lists and nutrition tables critically, compare them with how packaged \
foods are marketed, and give practical, evidence-based advice. You always answer with the \
exact JSON structure you are asked for.";

pub fn build_provider(config: &ProviderConfig) -> Arc<dyn CompletionProvider> {
    match config.kind {
        LlmProviderKind::Gemini => Arc::new(GeminiProvider::new(config, SYSTEM_MESSAGE.to_string())),
        LlmProviderKind::Groq => {
            Arc::new(OpenAiCompatProvider::new(config, SYSTEM_MESSAGE.to_string()))
        }
    }
}
