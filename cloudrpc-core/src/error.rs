//! # Errors
//!
//! Every fallible operation of the dispatcher returns a [`DispatchError`]. Its variants follow
//! how callers are expected to react:
//!
//! * **[`ConfigurationError`]**: the client is misconfigured (missing descriptor file, unknown
//!   service, bad URL). Fatal, never retried.
//! * **`Auth`**: the token exchange failed. Surfaced verbatim, never retried.
//! * **[`TransportError`]**: the RPC ran and failed. Carries the mapped `http_status`.
//!   Only `UNAVAILABLE` is transient.
//! * **[`ProtocolError`]**: the request or response does not fit the schema.
use crate::{BoxError, fields::ConversionError, grpc::client::GrpcRequestError};
use std::path::PathBuf;
use tonic::Status;

pub use crate::grpc::status::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to read file descriptor set '{path}': '{source}'")]
    DescriptorNotFound {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to decode file descriptor set '{path}': '{source}'")]
    InvalidDescriptor {
        path: PathBuf,
        source: prost_reflect::DescriptorError,
    },
    #[error("Service '{0}' is not declared in the service descriptor")]
    UnknownService(String),
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Invalid TLS configuration for '{0}': {1}")]
    InvalidTls(String, #[source] tonic::transport::Error),
    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Service '{service}' not found in '{path}'")]
    ServiceNotFound { service: String, path: PathBuf },
    #[error("Method '{method}' not found in service '{service}'")]
    MethodNotFound { service: String, method: String },
    #[error("Request does not match the input of '{method}': '{source}'")]
    InvalidRequest {
        method: String,
        source: serde_json::Error,
    },
    #[error("Method '{method}' is {actual}, it cannot be called as {expected}")]
    CallKindMismatch {
        method: String,
        actual: &'static str,
        expected: &'static str,
    },
    #[error("Invalid value for pagination option '{option}': expected {expected}")]
    InvalidOption {
        option: &'static str,
        expected: &'static str,
    },
    #[error("Unexpected response: field '{field}' {reason}")]
    UnexpectedResponse { field: String, reason: &'static str },
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Failed to obtain credentials: '{0}'")]
    Auth(#[source] BoxError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("gRPC client request error: '{0}'")]
    Request(GrpcRequestError),
}

impl DispatchError {
    /// Whether reissuing the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Transport(err) if err.is_transient())
    }

    /// The HTTP status of a transport failure.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DispatchError::Transport(err) => Some(err.http_status),
            _ => None,
        }
    }
}

impl From<Status> for DispatchError {
    fn from(status: Status) -> Self {
        DispatchError::Transport(status.into())
    }
}

impl From<ConversionError> for DispatchError {
    fn from(err: ConversionError) -> Self {
        DispatchError::Protocol(err.into())
    }
}

impl From<GrpcRequestError> for DispatchError {
    fn from(err: GrpcRequestError) -> Self {
        match err {
            // An unreachable endpoint is what grpc reports as UNAVAILABLE, keep it retryable.
            GrpcRequestError::ClientNotReady(source) => {
                Status::unavailable(format!("Transport not ready: {source}")).into()
            }
            other => DispatchError::Request(other),
        }
    }
}
