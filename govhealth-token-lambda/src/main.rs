// Lambda entry point for the token service.
//
// Built as `bootstrap` per the provided runtime contract:
//   cargo build -p govhealth-token-lambda --release
//
// The service instance owns the token cache, so a warm container keeps
// serving the cached token across invocations.

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};

use govhealth_token::TokenService;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let service = TokenService::from_env().await;
    let service = &service;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        Ok::<Value, Error>(handle(service, event).await)
    }))
    .await
}

/// Serve the cached token as an API Gateway proxy response.
async fn handle(service: &TokenService, _event: LambdaEvent<Value>) -> Value {
    match service.payload().await {
        Ok(body) => proxy_response(200, &body),
        Err(err) => {
            log::error!("Token refresh failed: {err}");
            proxy_response(502, &json!({ "error": "failed to obtain access token" }))
        }
    }
}

fn proxy_response(status_code: u16, body: &Value) -> Value {
    json!({
        "statusCode": status_code,
        "headers": { "Content-Type": "application/json" },
        "body": body.to_string(),
    })
}
