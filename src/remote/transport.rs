//! Remote call transport.
//!
//! The gateway and the sync runner only see the [`Transport`] trait, so tests
//! can swap in a scripted implementation.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::time::Duration;

use super::types::{ApiEnvelope, ApiRequest, Site};
use crate::error::TransportError;

/// Sends one remote call and returns the decoded payload.
pub trait Transport: Send + Sync {
  fn send<'a>(
    &'a self,
    site: &'a Site,
    method: &'a str,
    params: &'a Value,
  ) -> BoxFuture<'a, Result<Value, TransportError>>;
}

/// HTTP transport: POSTs `{method, params, token}` as JSON to the site URL.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new(timeout: Duration) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| TransportError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self { client })
  }

  async fn post(&self, site: &Site, method: &str, params: &Value) -> Result<Value, TransportError> {
    let body = ApiRequest {
      method,
      params,
      token: &site.token,
    };

    let response = self
      .client
      .post(&site.url)
      .json(&body)
      .send()
      .await
      .map_err(classify)?;

    let status = response.status();
    if !status.is_success() {
      return Err(TransportError::Server {
        code: format!("http-{}", status.as_u16()),
        message: status.canonical_reason().unwrap_or("").to_string(),
      });
    }

    let bytes = response.bytes().await.map_err(classify)?;
    decode_envelope(&bytes)
  }
}

impl Transport for HttpTransport {
  fn send<'a>(
    &'a self,
    site: &'a Site,
    method: &'a str,
    params: &'a Value,
  ) -> BoxFuture<'a, Result<Value, TransportError>> {
    self.post(site, method, params).boxed()
  }
}

fn classify(e: reqwest::Error) -> TransportError {
  if e.is_timeout() {
    TransportError::Timeout
  } else if e.is_decode() {
    TransportError::Malformed(e.to_string())
  } else {
    TransportError::Unreachable(e.to_string())
  }
}

/// Decode a response body into its payload or the server's rejection.
pub(crate) fn decode_envelope(body: &[u8]) -> Result<Value, TransportError> {
  let envelope: ApiEnvelope =
    serde_json::from_slice(body).map_err(|e| TransportError::Malformed(e.to_string()))?;

  if envelope.success {
    return Ok(envelope.data.unwrap_or(Value::Null));
  }

  match envelope.error {
    Some(err) => Err(TransportError::Server {
      code: err.code,
      message: err.message,
    }),
    None => Err(TransportError::Malformed(
      "failure response without error details".to_string(),
    )),
  }
}
