//! Configuration validation logic.

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Validate the configuration, returning all errors found (not just the first).
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        match self.llm.primary.provider.as_str() {
            "openai" | "anthropic" | "ollama" => {}
            "" => errors.push(ConfigError::MissingField {
                field: "llm.primary.provider".to_string(),
            }),
            _ => errors.push(ConfigError::InvalidValue {
                field: "llm.primary.provider".to_string(),
                message: "must be openai, anthropic, or ollama".to_string(),
            }),
        }

        if matches!(self.llm.primary.provider.as_str(), "openai" | "anthropic")
            && self
                .llm
                .primary
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .is_none()
        {
            errors.push(ConfigError::MissingField {
                field: format!(
                    "llm.primary.api_key (required for {} provider)",
                    self.llm.primary.provider
                ),
            });
        }

        if self.social.client_id.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "social.client_id".to_string(),
            });
        }
        if self.social.redirect_uri.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "social.redirect_uri".to_string(),
            });
        }

        match &self.secrets.encryption_key {
            Some(key) => {
                let decoded = base64::Engine::decode(
                    &base64::engine::general_purpose::STANDARD,
                    key,
                )
                .ok();
                if decoded.map(|d| d.len()) != Some(32) {
                    errors.push(ConfigError::InvalidValue {
                        field: "secrets.encryption_key".to_string(),
                        message: "must be 32 bytes, base64-encoded".to_string(),
                    });
                }
            }
            None => errors.push(ConfigError::MissingField {
                field: "secrets.encryption_key".to_string(),
            }),
        }

        if self.secrets.jwt_signing_secret.as_deref().unwrap_or("").is_empty() {
            errors.push(ConfigError::MissingField {
                field: "secrets.jwt_signing_secret".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.pipeline.similarity_threshold) {
            errors.push(ConfigError::InvalidValue {
                field: "pipeline.similarity_threshold".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            });
        }

        if self.pipeline.max_attempts == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "pipeline.max_attempts".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.pipeline.content_max_len == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "pipeline.content_max_len".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.queue.generate_concurrency == 0
            || self.queue.publish_concurrency == 0
            || self.queue.token_refresh_concurrency == 0
        {
            errors.push(ConfigError::InvalidValue {
                field: "queue.*_concurrency".to_string(),
                message: "each queue must have at least one worker".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmEngineConfig;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.llm.primary = LlmEngineConfig {
            provider: "openai".to_string(),
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
        };
        config.social.client_id = "client-1".to_string();
        config.social.redirect_uri = "https://example.com/callback".to_string();
        config.secrets.encryption_key =
            Some(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [0u8; 32]));
        config.secrets.jwt_signing_secret = Some("super-secret".to_string());
        config
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn missing_llm_provider_fails() {
        let mut config = valid_config();
        config.llm.primary.provider = String::new();
        let errors = config.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingField { field } if field == "llm.primary.provider")));
    }

    #[test]
    fn bad_encryption_key_length_fails() {
        let mut config = valid_config();
        config.secrets.encryption_key = Some("dG9vLXNob3J0".to_string());
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { field, .. } if field == "secrets.encryption_key"
        )));
    }

    #[test]
    fn similarity_threshold_out_of_range_fails() {
        let mut config = valid_config();
        config.pipeline.similarity_threshold = 1.5;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { field, .. } if field == "pipeline.similarity_threshold"
        )));
    }

    #[test]
    fn zero_concurrency_fails() {
        let mut config = valid_config();
        config.queue.publish_concurrency = 0;
        let errors = config.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidValue { field, .. } if field == "queue.*_concurrency")));
    }
}
