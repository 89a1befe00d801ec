use log::warn;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::food::config::CatalogConfig;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingKey(String),
    #[error("{key} is not a valid URL: {value}")]
    InvalidUrl { key: String, value: String },
    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProviderKind {
    #[default]
    Gemini,
    Groq,
}

impl LlmProviderKind {
    fn env_prefix(&self) -> &'static str {
        match self {
            LlmProviderKind::Gemini => "GEMINI",
            LlmProviderKind::Groq => "GROQ",
        }
    }
}

impl FromStr for LlmProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(LlmProviderKind::Gemini),
            "groq" => Ok(LlmProviderKind::Groq),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: LlmProviderKind,
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub temperature: f32,
}

impl ProviderConfig {
    pub fn from_lookup<F>(kind: LlmProviderKind, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = kind.env_prefix();

        let api_key_var = format!("{}_API_KEY", prefix);
        let api_key = lookup(&api_key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingKey(api_key_var))?;

        let model = lookup(&format!("{}_MODEL", prefix)).unwrap_or_else(|| match kind {
            LlmProviderKind::Gemini => "gemini-1.5-flash".to_string(),
            LlmProviderKind::Groq => "llama3-8b-8192".to_string(),
        });

        let url_var = format!("{}_API_URL", prefix);
        let api_url = lookup(&url_var).unwrap_or_else(|| match kind {
            LlmProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta".to_string(),
            LlmProviderKind::Groq => "https://api.groq.com/openai/v1".to_string(),
        });
        let api_url = validated_url(&url_var, api_url)?;

        let temperature = parse_or(lookup, "LLM_TEMPERATURE", 0.7);

        Ok(Self {
            kind,
            api_key,
            model,
            api_url,
            temperature,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub provider: ProviderConfig,
    pub llm_timeout: Duration,
    pub freshness_window: chrono::Duration,
    pub persist_attempts: u32,
    pub catalog: CatalogConfig,
}

impl Config {
    /// Reads configuration from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = match lookup("LLM_PROVIDER") {
            Some(value) => value.parse()?,
            None => LlmProviderKind::default(),
        };
        let provider = ProviderConfig::from_lookup(kind, &lookup)?;

        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/products.db"));

        let catalog_url = lookup("OFF_API_URL")
            .unwrap_or_else(|| "https://world.openfoodfacts.org".to_string());
        let catalog = CatalogConfig {
            base_url: validated_url("OFF_API_URL", catalog_url)?,
            user_agent: lookup("OFF_USER_AGENT")
                .unwrap_or_else(|| format!("reality-check/{}", env!("CARGO_PKG_VERSION"))),
        };

        Ok(Self {
            database_path,
            provider,
            llm_timeout: Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT_SECS", 60)),
            freshness_window: chrono::Duration::hours(parse_or(&lookup, "FRESHNESS_HOURS", 24)),
            persist_attempts: parse_or(&lookup, "PERSIST_ATTEMPTS", 3u32).max(1),
            catalog,
        })
    }
}

fn validated_url(key: &str, value: String) -> Result<String, ConfigError> {
    match Url::parse(&value) {
        Ok(_) => Ok(value.trim_end_matches('/').to_string()),
        Err(_) => Err(ConfigError::InvalidUrl {
            key: key.to_string(),
            value,
        }),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_gemini_key() {
        let config = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "g-key")])).unwrap();

        assert_eq!(config.provider.kind, LlmProviderKind::Gemini);
        assert_eq!(config.provider.model, "gemini-1.5-flash");
        assert_eq!(
            config.provider.api_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(config.database_path, PathBuf::from("data/products.db"));
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.freshness_window, chrono::Duration::hours(24));
        assert_eq!(config.persist_attempts, 3);
        assert_eq!(config.catalog.base_url, "https://world.openfoodfacts.org");
    }

    #[test]
    fn test_missing_api_key() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingKey("GEMINI_API_KEY".to_string()));
    }

    #[test]
    fn test_groq_provider_and_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("LLM_PROVIDER", "Groq"),
            ("GROQ_API_KEY", "q-key"),
            ("GROQ_MODEL", "mixtral-8x7b-32768"),
            ("LLM_TIMEOUT_SECS", "15"),
            ("FRESHNESS_HOURS", "not-a-number"),
            ("PERSIST_ATTEMPTS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.provider.kind, LlmProviderKind::Groq);
        assert_eq!(config.provider.api_key, "q-key");
        assert_eq!(config.provider.model, "mixtral-8x7b-32768");
        assert_eq!(config.provider.api_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.llm_timeout, Duration::from_secs(15));
        assert_eq!(config.freshness_window, chrono::Duration::hours(24));
        assert_eq!(config.persist_attempts, 1);
    }

    #[test]
    fn test_rejects_bad_url_and_provider() {
        let err = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "g-key"),
            ("OFF_API_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = Config::from_lookup(lookup_from(&[("LLM_PROVIDER", "mistral")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownProvider("mistral".to_string()));
    }
}
