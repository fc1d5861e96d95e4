//! Error types for the load generator

use thiserror::Error;

/// Errors returned by a single call against the matchmaking frontend.
///
/// These never cross task boundaries: the session that hit one logs it and
/// ends its own lifecycle.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Cannot reach frontend: {0}")]
    Connection(String),

    #[error("Frontend returned {code}: {message}")]
    Rpc { code: String, message: String },

    #[error("Update stream failed: {0}")]
    Stream(String),

    #[error("Invalid frontend endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ClientError {
    /// Whether the backend could not be reached at all
    pub fn is_connection(&self) -> bool {
        matches!(self, ClientError::Connection(_))
    }
}

impl From<tonic::Status> for ClientError {
    fn from(status: tonic::Status) -> Self {
        if status.code() == tonic::Code::Unavailable || is_transport_failure(&status) {
            return ClientError::Connection(status.message().to_string());
        }
        ClientError::Rpc {
            code: format!("{:?}", status.code()),
            message: status.message().to_string(),
        }
    }
}

/// Whether a status was produced by the channel rather than by the frontend
fn is_transport_failure(status: &tonic::Status) -> bool {
    let mut source = std::error::Error::source(status);
    while let Some(err) = source {
        if err.is::<tonic::transport::Error>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Configuration errors, fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Frontend host must not be empty")]
    EmptyHost,

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Invalid status address {0:?}: {1}")]
    InvalidStatusAddr(String, String),
}

/// Logger initialization errors, fatal at startup
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(String),

    #[error("Failed to install metrics recorder: {0}")]
    Recorder(String),
}
