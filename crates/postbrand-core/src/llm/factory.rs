//! Provider factory for creating LLM providers from configuration.
//!
//! Resolves the primary/fallback/embedding engines from `LlmConfig` into
//! concrete provider instances, abstracting away provider-specific
//! construction.

use super::anthropic::AnthropicProvider;
use super::openai_compat::OpenAiCompatProvider;
use super::LlmProvider;
use crate::config::{LlmConfig, LlmEngineConfig};
use crate::error::LlmError;

/// Construct a provider for a single engine configuration.
pub fn create_provider(engine: &LlmEngineConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    match engine.provider.as_str() {
        "openai" => {
            let api_key = engine
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(LlmError::NotConfigured)?
                .to_string();

            let base_url = engine
                .base_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .unwrap_or("https://api.openai.com/v1")
                .to_string();

            let model = if engine.model.is_empty() {
                "gpt-4o-mini".to_string()
            } else {
                engine.model.clone()
            };

            tracing::info!(provider = "openai", model = %model, base_url = %base_url, "creating LLM provider");

            Ok(Box::new(OpenAiCompatProvider::new(
                base_url,
                api_key,
                model,
                "openai".to_string(),
            )))
        }
        "ollama" => {
            let base_url = engine
                .base_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .unwrap_or("http://localhost:11434/v1")
                .to_string();

            let model = if engine.model.is_empty() {
                "llama3.1".to_string()
            } else {
                engine.model.clone()
            };

            tracing::info!(provider = "ollama", model = %model, base_url = %base_url, "creating LLM provider");

            Ok(Box::new(OpenAiCompatProvider::new(
                base_url,
                "ollama".to_string(),
                model,
                "ollama".to_string(),
            )))
        }
        "anthropic" => {
            let api_key = engine
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(LlmError::NotConfigured)?
                .to_string();

            let model = if engine.model.is_empty() {
                "claude-sonnet-4-5-20250514".to_string()
            } else {
                engine.model.clone()
            };

            tracing::info!(provider = "anthropic", model = %model, "creating LLM provider");

            if let Some(base_url) = engine.base_url.as_deref().filter(|u| !u.is_empty()) {
                Ok(Box::new(AnthropicProvider::with_base_url(
                    api_key,
                    model,
                    base_url.to_string(),
                )))
            } else {
                Ok(Box::new(AnthropicProvider::new(api_key, model)))
            }
        }
        _ => Err(LlmError::NotConfigured),
    }
}

/// Build the primary generation provider.
pub fn create_primary(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    create_provider(&config.primary)
}

/// Build the fallback generation provider, if one is configured. Used by
/// `ContentPipeline` after the primary engine fails.
pub fn create_fallback(config: &LlmConfig) -> Result<Option<Box<dyn LlmProvider>>, LlmError> {
    config
        .fallback
        .as_ref()
        .map(create_provider)
        .transpose()
}

/// Build the embedding-capable provider: the configured `embedding` engine
/// if present, otherwise the primary engine (which may itself reject
/// `embed()` with [`LlmError::EmbeddingsUnsupported`] at call time, e.g. a
/// primary of Anthropic with no separate embedding engine configured).
pub fn create_embedder(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    match &config.embedding {
        Some(engine) => create_provider(engine),
        None => create_provider(&config.primary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(provider: &str, api_key: Option<&str>) -> LlmEngineConfig {
        LlmEngineConfig {
            provider: provider.to_string(),
            api_key: api_key.map(str::to_string),
            model: String::new(),
            base_url: None,
        }
    }

    #[test]
    fn create_openai_provider() {
        let provider = create_provider(&engine("openai", Some("sk-test"))).expect("create");
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn create_openai_requires_api_key() {
        assert!(matches!(
            create_provider(&engine("openai", None)),
            Err(LlmError::NotConfigured)
        ));
    }

    #[test]
    fn create_ollama_provider_needs_no_key() {
        let provider = create_provider(&engine("ollama", None)).expect("create");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn create_anthropic_requires_api_key() {
        assert!(matches!(
            create_provider(&engine("anthropic", None)),
            Err(LlmError::NotConfigured)
        ));
    }

    #[test]
    fn create_unknown_provider_returns_not_configured() {
        assert!(matches!(
            create_provider(&engine("mystery", Some("k"))),
            Err(LlmError::NotConfigured)
        ));
    }

    #[test]
    fn create_fallback_is_none_when_unconfigured() {
        let config = LlmConfig {
            primary: engine("openai", Some("sk-test")),
            fallback: None,
            embedding: None,
            timeout_secs: 60,
        };
        assert!(create_fallback(&config).unwrap().is_none());
    }

    #[test]
    fn create_embedder_falls_back_to_primary_when_unconfigured() {
        let config = LlmConfig {
            primary: engine("openai", Some("sk-test")),
            fallback: None,
            embedding: None,
            timeout_secs: 60,
        };
        let embedder = create_embedder(&config).expect("create");
        assert_eq!(embedder.name(), "openai");
    }

    #[test]
    fn create_embedder_prefers_dedicated_engine() {
        let config = LlmConfig {
            primary: engine("anthropic", Some("sk-ant-test")),
            fallback: None,
            embedding: Some(engine("openai", Some("sk-test"))),
            timeout_secs: 60,
        };
        let embedder = create_embedder(&config).expect("create");
        assert_eq!(embedder.name(), "openai");
    }
}
