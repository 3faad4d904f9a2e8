//! API credentials, stored as JSON in Secrets Manager.

use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;

use crate::error::TokenError;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ApiCredentials {
    /// Parse the JSON payload stored in the secret.
    pub fn from_secret_string(secret_id: &str, payload: &str) -> Result<Self, TokenError> {
        serde_json::from_str(payload).map_err(|source| TokenError::SecretFormat {
            secret_id: secret_id.to_string(),
            source,
        })
    }
}

pub struct SecretsStore {
    client: SecretsClient,
}

impl SecretsStore {
    pub fn new(client: SecretsClient) -> Self {
        Self { client }
    }

    pub async fn api_credentials(&self, secret_id: &str) -> Result<ApiCredentials, TokenError> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| TokenError::Secret {
                secret_id: secret_id.to_string(),
                reason: DisplayErrorContext(e).to_string(),
            })?;

        let payload = response.secret_string().ok_or_else(|| TokenError::Secret {
            secret_id: secret_id.to_string(),
            reason: "secret has no string payload".to_string(),
        })?;

        ApiCredentials::from_secret_string(secret_id, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_parse_from_secret_json() {
        let creds = ApiCredentials::from_secret_string(
            "athena-preview-creds",
            r#"{"client_id": "0oa1abc", "client_secret": "s3cret"}"#,
        )
        .unwrap();
        assert_eq!(creds.client_id, "0oa1abc");
        assert_eq!(creds.client_secret, "s3cret");
    }

    #[test]
    fn test_missing_field_is_a_format_error() {
        let err =
            ApiCredentials::from_secret_string("athena-preview-creds", r#"{"client_id": "x"}"#)
                .unwrap_err();
        assert!(matches!(err, TokenError::SecretFormat { secret_id, .. } if secret_id == "athena-preview-creds"));
    }

    #[test]
    fn test_non_json_payload_is_a_format_error() {
        let err = ApiCredentials::from_secret_string("athena-preview-creds", "not json")
            .unwrap_err();
        assert!(matches!(err, TokenError::SecretFormat { .. }));
    }
}
