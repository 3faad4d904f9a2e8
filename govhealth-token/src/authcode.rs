//! Authorization-code flow helpers: the authorize URL the operator opens in
//! a browser, and the one-shot local listener that captures the redirect.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use uuid::Uuid;

use crate::error::TokenError;

pub const PREVIEW_AUTHORIZE_URL: &str =
    "https://api.preview.platform.athenahealth.com/oauth2/v1/authorize";
/// The sandbox rejects authorize requests without an explicit audience.
pub const PREVIEW_AUDIENCE: &str = "https://api.preview.platform.athenahealth.com/fhir/r4";
pub const DEFAULT_USER_SCOPE: &str = "fhir/Patient.* openid fhirUser";

const SUCCESS_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<h1>Success! Close this tab and return to the terminal.</h1>";
const BAD_REQUEST_RESPONSE: &str = "HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n";

/// Parameters for the browser half of the flow.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub audience: String,
}

impl AuthorizeRequest {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: DEFAULT_USER_SCOPE.to_string(),
            state: Uuid::new_v4().to_string(),
            audience: PREVIEW_AUDIENCE.to_string(),
        }
    }
}

/// Build the URL the operator opens in a browser.
pub fn authorize_url(base: &str, request: &AuthorizeRequest) -> Result<Url, TokenError> {
    Ok(Url::parse_with_params(
        base,
        &[
            ("response_type", "code"),
            ("client_id", request.client_id.as_str()),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("scope", request.scope.as_str()),
            ("state", request.state.as_str()),
            ("aud", request.audience.as_str()),
        ],
    )?)
}

/// The authorization code captured from the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCode {
    pub code: String,
    pub state: Option<String>,
}

/// One-shot local rendezvous for the OAuth redirect. Serves exactly one
/// successful callback, then is done.
pub struct CallbackListener {
    listener: TcpListener,
}

impl CallbackListener {
    pub async fn bind(port: u16) -> Result<Self, TokenError> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TokenError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait until a request carrying `?code=` arrives or the deadline passes.
    /// Requests without a code get a 400 and the wait continues.
    pub async fn recv(self, timeout: Duration) -> Result<AuthCode, TokenError> {
        tokio::time::timeout(timeout, self.accept_loop())
            .await
            .map_err(|_| TokenError::CallbackTimeout)?
    }

    async fn accept_loop(self) -> Result<AuthCode, TokenError> {
        loop {
            let (stream, _peer) = self.listener.accept().await?;
            if let Some(code) = answer_request(stream).await? {
                return Ok(code);
            }
        }
    }
}

async fn answer_request(mut stream: TcpStream) -> Result<Option<AuthCode>, TokenError> {
    let mut buf = vec![0u8; 4096];
    let read = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..read]);

    let code = request.lines().next().and_then(parse_request_line);
    let response = if code.is_some() {
        SUCCESS_RESPONSE
    } else {
        BAD_REQUEST_RESPONSE
    };
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await.ok();
    Ok(code)
}

/// Pull `code` and `state` out of a request line like
/// `GET /callback?code=abc&state=xyz HTTP/1.1`.
fn parse_request_line(line: &str) -> Option<AuthCode> {
    let target = line.split_whitespace().nth(1)?;
    let query = target.split_once('?')?.1;

    let mut code = None;
    let mut state = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    code.map(|code| AuthCode { code, state })
}
