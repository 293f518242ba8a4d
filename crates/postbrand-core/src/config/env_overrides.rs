//! Environment variable overrides for configuration.
//!
//! Variables use the `POSTBRAND_` prefix with double underscores separating
//! nested keys, e.g. `POSTBRAND_LLM__PRIMARY__API_KEY`.

use super::Config;
use crate::error::ConfigError;
use std::env;

impl Config {
    pub(super) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = env::var("POSTBRAND_STORE__DSN") {
            self.store.dsn = val;
        }

        if let Ok(val) = env::var("POSTBRAND_LLM__PRIMARY__PROVIDER") {
            self.llm.primary.provider = val;
        }
        if let Ok(val) = env::var("POSTBRAND_LLM__PRIMARY__API_KEY") {
            self.llm.primary.api_key = Some(val);
        }
        if let Ok(val) = env::var("POSTBRAND_LLM__PRIMARY__MODEL") {
            self.llm.primary.model = val;
        }
        if let Ok(val) = env::var("POSTBRAND_LLM__FALLBACK__PROVIDER") {
            let mut fallback = self.llm.fallback.clone().unwrap_or_default();
            fallback.provider = val;
            self.llm.fallback = Some(fallback);
        }
        if let Ok(val) = env::var("POSTBRAND_LLM__FALLBACK__API_KEY") {
            let mut fallback = self.llm.fallback.clone().unwrap_or_default();
            fallback.api_key = Some(val);
            self.llm.fallback = Some(fallback);
        }

        if let Ok(val) = env::var("POSTBRAND_SOCIAL__CLIENT_ID") {
            self.social.client_id = val;
        }
        if let Ok(val) = env::var("POSTBRAND_SOCIAL__CLIENT_SECRET") {
            self.social.client_secret = Some(val);
        }
        if let Ok(val) = env::var("POSTBRAND_SOCIAL__REDIRECT_URI") {
            self.social.redirect_uri = val;
        }

        if let Ok(val) = env::var("POSTBRAND_CHAT__ACCESS_TOKEN") {
            self.chat.access_token = Some(val);
        }
        if let Ok(val) = env::var("POSTBRAND_CHAT__SIGNING_SECRET") {
            self.chat.signing_secret = Some(val);
        }
        if let Ok(val) = env::var("POSTBRAND_CHAT__ADMIN_USER_ID") {
            self.chat.admin_user_id = Some(val);
        }

        if let Ok(val) = env::var("POSTBRAND_SECRETS__ENCRYPTION_KEY") {
            self.secrets.encryption_key = Some(val);
        }
        if let Ok(val) = env::var("POSTBRAND_SECRETS__JWT_SIGNING_SECRET") {
            self.secrets.jwt_signing_secret = Some(val);
        }

        if let Ok(val) = env::var("POSTBRAND_SERVER__HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("POSTBRAND_SERVER__PORT") {
            self.server.port = val.parse().map_err(|_| ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "must be a valid port number".to_string(),
            })?;
        }
        if let Ok(val) = env::var("POSTBRAND_SERVER__BASE_URL") {
            self.server.base_url = Some(val);
        }

        if let Ok(val) = env::var("POSTBRAND_LOGGING__LEVEL") {
            self.logging.level = val;
        }

        Ok(())
    }
}
