//! Error types for token operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Secrets Manager could not produce the credential secret.
    #[error("failed to read secret '{secret_id}': {reason}")]
    Secret { secret_id: String, reason: String },

    /// The secret payload is not the expected credential JSON.
    #[error("secret '{secret_id}' is not valid credential JSON: {source}")]
    SecretFormat {
        secret_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    /// The endpoint answered but the payload lacked the expected fields.
    #[error("malformed token response: {0}")]
    Malformed(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("timed out waiting for the OAuth callback")]
    CallbackTimeout,

    #[error("callback listener failed: {0}")]
    Callback(#[from] std::io::Error),
}
