//! # Generic gRPC Client
//!
//! This module wraps a standard `tonic` client to provide a generic interface for
//! gRPC communication. It is agnostic to the specific Protobuf messages being exchanged.
//!
//! ## How it works
//!
//! The [`GrpcClient`] utilizes the [`super::codec::JsonCodec`] to handle serialization.
//! It does not need to know the structure of the data it is sending; it simply ensures
//! the connection is ready and passes the `DynamicMessage` and `MethodDescriptor`
//! to the codec.
//!
//! ## Features
//!
//! * **Dynamic Pathing**: Constructs the HTTP/2 path (e.g., `/package.Service/Method`) at runtime.
//! * **Metadata Handling**: Converts standard Rust string tuples into Tonic's `MetadataMap` for headers,
//!   and attaches the bearer `authorization` value of the client credentials.
//! * **Deadlines**: Sends the remaining time as `grpc-timeout` and enforces the deadline locally.
use super::codec::JsonCodec;
use crate::BoxError;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::str::FromStr;
use tokio::time::Instant;
use tonic::{
    Status, Streaming,
    client::GrpcService,
    metadata::{
        AsciiMetadataValue, MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

/// Per-call options attached to the outgoing request.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Custom gRPC metadata (headers).
    pub headers: Vec<(String, String)>,
    /// The `authorization` metadata value, if the call is authenticated.
    pub authorization: Option<AsciiMetadataValue>,
    /// Absolute point in time after which the call fails with `DEADLINE_EXCEEDED`.
    pub deadline: Option<Instant>,
}

/// A generic gRPC client performing calls described by a [`MethodDescriptor`].
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }

    /// Performs a Unary gRPC call (Single Request -> Single Response).
    ///
    /// # Returns
    /// * `Ok(Ok(Value))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error, or the deadline elapsed.
    /// * `Err(GrpcRequestError)` - Failed to build the request or connect.
    pub async fn unary(
        &mut self,
        method: MethodDescriptor,
        payload: DynamicMessage,
        options: CallOptions,
    ) -> Result<Result<serde_json::Value, Status>, GrpcRequestError> {
        let deadline = options.deadline;
        let call = async {
            self.client
                .ready()
                .await
                .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

            let codec = JsonCodec::new(method.output());
            let path = http_path(&method);
            let request = build_request(payload, options)?;

            let result = self.client.unary(request, path, codec).await;
            Ok::<_, GrpcRequestError>(result.map(tonic::Response::into_inner))
        };

        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .unwrap_or_else(|_| Ok(Err(deadline_exceeded()))),
            None => call.await,
        }
    }

    /// Performs a Server Streaming gRPC call (Single Request -> Stream of Responses).
    ///
    /// The deadline only bounds the call setup; once the stream is returned the caller
    /// decides how long to consume it.
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(Stream))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to build the request or connect.
    pub async fn server_streaming(
        &mut self,
        method: MethodDescriptor,
        payload: DynamicMessage,
        options: CallOptions,
    ) -> Result<Result<Streaming<serde_json::Value>, Status>, GrpcRequestError> {
        let deadline = options.deadline;
        let call = async {
            self.client
                .ready()
                .await
                .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

            let codec = JsonCodec::new(method.output());
            let path = http_path(&method);
            let request = build_request(payload, options)?;

            let result = self.client.server_streaming(request, path, codec).await;
            Ok::<_, GrpcRequestError>(result.map(tonic::Response::into_inner))
        };

        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .unwrap_or_else(|_| Ok(Err(deadline_exceeded()))),
            None => call.await,
        }
    }
}

fn deadline_exceeded() -> Status {
    Status::deadline_exceeded("Deadline elapsed before the call completed")
}

fn http_path(method: &MethodDescriptor) -> http::uri::PathAndQuery {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path).expect("valid gRPC path")
}

fn build_request<T>(
    payload: T,
    options: CallOptions,
) -> Result<tonic::Request<T>, GrpcRequestError> {
    let mut request = tonic::Request::new(payload);

    if let Some(deadline) = options.deadline {
        request.set_timeout(deadline.saturating_duration_since(Instant::now()));
    }

    if let Some(authorization) = options.authorization {
        request.metadata_mut().insert("authorization", authorization);
    }

    for (k, v) in options.headers {
        let key =
            MetadataKey::from_str(&k).map_err(|source| GrpcRequestError::InvalidMetadataKey {
                key: k.clone(),
                source,
            })?;
        let val = MetadataValue::from_str(&v)
            .map_err(|source| GrpcRequestError::InvalidMetadataValue { key: k, source })?;
        request.metadata_mut().insert(key, val);
    }
    Ok(request)
}
