//! OAuth2 token endpoint client: client-credentials and authorization-code
//! grants against the sandbox.

use serde::Deserialize;

use crate::credentials::ApiCredentials;
use crate::error::TokenError;

/// A granted access token and its advertised lifetime in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

pub struct TokenEndpoint {
    http: reqwest::Client,
    token_url: String,
}

impl TokenEndpoint {
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: token_url.into(),
        }
    }

    /// Two-legged client-credentials grant.
    pub async fn client_credentials(
        &self,
        creds: &ApiCredentials,
        scope: &str,
    ) -> Result<TokenGrant, TokenError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("scope", scope),
        ];
        self.request_token(&form).await
    }

    /// Exchange an authorization code captured from the browser redirect.
    pub async fn authorization_code(
        &self,
        creds: &ApiCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, TokenError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
        ];
        self.request_token(&form).await
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenGrant, TokenError> {
        let response = self.http.post(&self.token_url).form(form).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Endpoint { status, body });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> ApiCredentials {
        ApiCredentials {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_client_credentials_grant_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v1/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("scope=system%2FPatient.read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-123",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = TokenEndpoint::new(format!("{}/oauth2/v1/token", server.uri()));
        let grant = endpoint
            .client_credentials(&creds(), "system/Patient.read")
            .await
            .unwrap();

        assert_eq!(grant.access_token, "tok-123");
        assert_eq!(grant.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_authorization_code_grant_sends_code_and_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc123"))
            .and(body_string_contains(
                "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "user-tok",
                "expires_in": 300
            })))
            .mount(&server)
            .await;

        let endpoint = TokenEndpoint::new(server.uri());
        let grant = endpoint
            .authorization_code(&creds(), "abc123", "http://localhost:8080/callback")
            .await
            .unwrap();

        assert_eq!(grant.access_token, "user-tok");
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let endpoint = TokenEndpoint::new(server.uri());
        let err = endpoint
            .client_credentials(&creds(), "system/Patient.read")
            .await
            .unwrap_err();

        match err {
            TokenError::Endpoint { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid_client");
            }
            other => panic!("expected Endpoint error, got {other:?}"),
        }
    }
}
