use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A remote endpoint plus the credential used to talk to it.
#[derive(Clone, PartialEq, Eq)]
pub struct Site {
  /// Stable identifier, used to scope queued operations and settings
  pub id: String,
  /// Endpoint receiving remote calls
  pub url: String,
  /// Opaque token attached to every call
  pub token: String,
}

impl Site {
  pub fn new(id: impl Into<String>, url: impl Into<String>, token: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      url: url.into(),
      token: token.into(),
    }
  }
}

impl std::fmt::Debug for Site {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Site")
      .field("id", &self.id)
      .field("url", &self.url)
      .field("token", &"<redacted>")
      .finish()
  }
}

/// Body of a remote call request.
#[derive(Debug, Serialize)]
pub(crate) struct ApiRequest<'a> {
  pub method: &'a str,
  pub params: &'a Value,
  pub token: &'a str,
}

/// Response envelope: `{success: true, data}` or `{success: false, error}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope {
  pub success: bool,
  #[serde(default)]
  pub data: Option<Value>,
  #[serde(default)]
  pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
  #[serde(default, deserialize_with = "code_as_string")]
  pub code: String,
  #[serde(default)]
  pub message: String,
}

/// Servers send error codes as either strings or numbers.
fn code_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v = Value::deserialize(deserializer)?;
  Ok(match v {
    Value::String(s) => s,
    Value::Null => String::new(),
    other => other.to_string(),
  })
}
