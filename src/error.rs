//! Error types for remote calls, file transfers and gateway outcomes.

/// Failure reported by the remote-call transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
  /// The request never reached the server.
  #[error("connection failed: {0}")]
  Unreachable(String),

  /// The request was sent but no answer arrived in time.
  #[error("request timed out")]
  Timeout,

  /// The server answered and rejected the call.
  #[error("server rejected call ({code}): {message}")]
  Server { code: String, message: String },

  /// The response could not be decoded.
  #[error("malformed response: {0}")]
  Malformed(String),
}

impl TransportError {
  /// Whether the failure looks like lost connectivity rather than a rejection.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Unreachable(_) | Self::Timeout)
  }
}

/// Failure reported by the file transfer collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
  #[error("connection failed: {0}")]
  Unreachable(String),

  #[error("transfer rejected with HTTP {0}")]
  Http(u16),

  #[error("local file error: {0}")]
  Io(String),
}

impl TransferError {
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Unreachable(_))
  }
}

impl From<std::io::Error> for TransferError {
  fn from(e: std::io::Error) -> Self {
    Self::Io(e.to_string())
  }
}

/// Why a gateway call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
  /// No connectivity and no usable cached value.
  #[error("offline and no cached data available")]
  Offline,

  #[error("transport error: {0}")]
  Transport(String),

  #[error("server error {code}: {message}")]
  Server { code: String, message: String },

  #[error("malformed response: {0}")]
  Malformed(String),

  #[error("transfer failed: {0}")]
  Transfer(String),

  /// The local cache or queue could not be read or written.
  #[error("local storage error: {0}")]
  Storage(String),
}

impl From<TransportError> for GatewayError {
  fn from(e: TransportError) -> Self {
    match e {
      TransportError::Server { code, message } => Self::Server { code, message },
      TransportError::Malformed(msg) => Self::Malformed(msg),
      other => Self::Transport(other.to_string()),
    }
  }
}

impl From<TransferError> for GatewayError {
  fn from(e: TransferError) -> Self {
    Self::Transfer(e.to_string())
  }
}

impl From<color_eyre::Report> for GatewayError {
  fn from(e: color_eyre::Report) -> Self {
    Self::Storage(e.to_string())
  }
}
