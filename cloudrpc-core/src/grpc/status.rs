//! # Status Mapping
//!
//! Callers of the Google Cloud wrappers inspect errors by HTTP status, not by gRPC code.
//! This module holds the fixed table translating every gRPC status code into the
//! `(http_status, reason)` pair exposed on [`TransportError`].
//!
//! The table is a compatibility surface: callers match on `http_status`, so entries
//! must never change.
use tonic::{Code, Status};

/// Maps a gRPC status code to its HTTP status and reason phrase.
pub fn http_status(code: Code) -> (u16, &'static str) {
    match code {
        Code::Ok => (200, "OK"),
        Code::Cancelled => (499, "Client Closed Request"),
        Code::Unknown => (500, "Internal Server Error"),
        Code::InvalidArgument => (400, "Bad Request"),
        Code::DeadlineExceeded => (504, "Gateway Timeout"),
        Code::NotFound => (404, "Not Found"),
        Code::AlreadyExists => (409, "Conflict"),
        Code::PermissionDenied => (403, "Forbidden"),
        Code::ResourceExhausted => (429, "Too Many Requests"),
        Code::FailedPrecondition => (412, "Precondition Failed"),
        Code::Aborted => (409, "Conflict"),
        Code::OutOfRange => (400, "Bad Request"),
        Code::Unimplemented => (501, "Not Implemented"),
        Code::Internal => (500, "Internal Server Error"),
        Code::Unavailable => (503, "Service Unavailable"),
        Code::DataLoss => (500, "Internal Server Error"),
        Code::Unauthenticated => (401, "Unauthorized"),
    }
}

/// A failed RPC, decorated with the HTTP status its gRPC code maps to.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} ({http_status}): {}", .status.message())]
pub struct TransportError {
    /// The numeric gRPC status code (e.g. `14` for `UNAVAILABLE`).
    pub code: i32,
    /// The HTTP status paired with `code`.
    pub http_status: u16,
    /// The HTTP reason phrase paired with `code`.
    pub message: &'static str,
    /// The status as returned by the transport.
    pub status: Status,
}

impl TransportError {
    /// Whether the failure is transient and the call can be reissued as is.
    pub fn is_transient(&self) -> bool {
        self.status.code() == Code::Unavailable
    }
}

impl From<Status> for TransportError {
    fn from(status: Status) -> Self {
        let (http_status, message) = http_status(status.code());
        Self {
            code: status.code() as i32,
            http_status,
            message,
            status,
        }
    }
}
