//! Token service: lazily refreshed client-credentials tokens for the
//! sandbox API.
//!
//! The cache is owned by the service instance and consulted under a lock; no
//! process-wide state survives the instance.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::cache::TokenCache;
use crate::credentials::SecretsStore;
use crate::error::TokenError;
use crate::oauth::TokenEndpoint;

pub const PREVIEW_TOKEN_URL: &str =
    "https://api.preview.platform.athenahealth.com/oauth2/v1/token";
pub const DEFAULT_SCOPE: &str =
    "system/Patient.read system/Appointment.read system/Encounter.read";
pub const DEFAULT_SECRET_ID: &str = "athena-preview-creds";

/// Refresh this long before the advertised expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Token service configuration; defaults target the preview sandbox.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub token_url: String,
    pub scope: String,
    pub secret_id: String,
    pub refresh_margin: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_url: PREVIEW_TOKEN_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            secret_id: DEFAULT_SECRET_ID.to_string(),
            refresh_margin: REFRESH_MARGIN,
        }
    }
}

impl TokenConfig {
    /// Read overrides from the environment (how the Lambda is configured).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_url: std::env::var("GOVHEALTH_TOKEN_URL").unwrap_or(defaults.token_url),
            scope: std::env::var("GOVHEALTH_TOKEN_SCOPE").unwrap_or(defaults.scope),
            secret_id: std::env::var("GOVHEALTH_SECRET_ID").unwrap_or(defaults.secret_id),
            refresh_margin: defaults.refresh_margin,
        }
    }
}

pub struct TokenService {
    cache: Mutex<TokenCache>,
    secrets: SecretsStore,
    endpoint: TokenEndpoint,
    config: TokenConfig,
}

impl TokenService {
    pub fn new(secrets: SecretsStore, config: TokenConfig) -> Self {
        let endpoint = TokenEndpoint::new(config.token_url.clone());
        Self {
            cache: Mutex::new(TokenCache::new()),
            secrets,
            endpoint,
            config,
        }
    }

    /// Build a service from ambient AWS configuration and environment
    /// overrides.
    pub async fn from_env() -> Self {
        let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let secrets = SecretsStore::new(aws_sdk_secretsmanager::Client::new(&aws));
        Self::new(secrets, TokenConfig::from_env())
    }

    /// Return the cached token, refreshing it through the OAuth endpoint when
    /// missing or expired.
    pub async fn access_token(&self) -> Result<String, TokenError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.current(Instant::now()) {
            log::debug!("Serving cached access token");
            return Ok(token.to_string());
        }

        log::info!("Access token missing or expired; requesting a fresh one");
        let creds = self.secrets.api_credentials(&self.config.secret_id).await?;
        let grant = self
            .endpoint
            .client_credentials(&creds, &self.config.scope)
            .await?;

        let access_token = grant.access_token.clone();
        cache.store(
            grant.access_token,
            Duration::from_secs(grant.expires_in),
            self.config.refresh_margin,
            Instant::now(),
        );
        Ok(access_token)
    }

    /// The JSON payload served to callers of the token endpoint.
    pub async fn payload(&self) -> Result<serde_json::Value, TokenError> {
        Ok(serde_json::json!({ "access_token": self.access_token().await? }))
    }
}
