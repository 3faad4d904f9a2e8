//! SigV4-signed access to the deployed token endpoint.
//!
//! The endpoint sits behind IAM auth, so the demo client signs its GET for
//! `execute-api` the same way the AWS CLI would. No API secrets live in the
//! client; only AWS credentials are involved.

use std::time::SystemTime;

use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;

use crate::error::TokenError;

const SIGNING_SERVICE: &str = "execute-api";

pub struct SignedTokenClient {
    http: reqwest::Client,
    region: String,
    credentials: Credentials,
}

impl SignedTokenClient {
    pub fn new(region: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            region: region.into(),
            credentials,
        }
    }

    /// Resolve credentials from the default provider chain.
    pub async fn from_env(region: impl Into<String>) -> Result<Self, TokenError> {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let provider = config
            .credentials_provider()
            .ok_or_else(|| TokenError::Signing("no AWS credentials available".to_string()))?;
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(Self::new(region, credentials))
    }

    /// Fetch an access token from the deployed endpoint.
    pub async fn fetch_token(&self, url: &str) -> Result<String, TokenError> {
        let signed_headers = self.sign_get(url)?;

        let mut request = self.http.get(url);
        for (name, value) in signed_headers {
            request = request.header(name, value);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TokenError::Endpoint {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let payload: serde_json::Value = response.json().await?;
        payload
            .get("access_token")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .ok_or_else(|| TokenError::Malformed("response had no access_token".to_string()))
    }

    /// Produce the headers a SigV4-signed GET of `url` must carry.
    fn sign_get(&self, url: &str) -> Result<Vec<(String, String)>, TokenError> {
        let identity = self.credentials.clone().into();
        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SIGNING_SERVICE)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let params = SigningParams::from(params);

        let signable = SignableRequest::new(
            "GET",
            url,
            [("accept", "application/json")].into_iter(),
            SignableBody::Bytes(&[]),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| TokenError::Signing(e.to_string()))?
            .into_parts();

        let mut request = http::Request::builder()
            .method("GET")
            .uri(url)
            .header("accept", "application/json")
            .body(())
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        instructions.apply_to_request_http1x(&mut request);

        Ok(request
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client() -> SignedTokenClient {
        SignedTokenClient::new(
            "us-east-1",
            Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"),
        )
    }

    #[tokio::test]
    async fn test_signed_get_carries_authorization_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/default/athena-token-server"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "signed-tok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = test_client()
            .fetch_token(&format!("{}/default/athena-token-server", server.uri()))
            .await
            .unwrap();

        assert_eq!(token, "signed-tok");
    }

    #[tokio::test]
    async fn test_missing_access_token_field_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "oops": true })),
            )
            .mount(&server)
            .await;

        let err = test_client().fetch_token(&server.uri()).await.unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_denied_request_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let err = test_client().fetch_token(&server.uri()).await.unwrap_err();
        assert!(matches!(err, TokenError::Endpoint { status: 403, .. }));
    }
}
