//! # Service Stubs
//!
//! A [`Stub`] is a callable proxy for one remote gRPC service: it pairs the service schema
//! with a transport and exposes every RPC by name.
use crate::{
    BoxError,
    error::{DispatchError, ProtocolError},
    grpc::client::{CallOptions, GrpcClient},
};
use futures_util::stream::BoxStream;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor, ServiceDescriptor};
use tokio_stream::StreamExt;
use tonic::{client::GrpcService, transport::Channel};

/// Builds [`Stub`]s for one service schema, bound to any transport.
#[derive(Debug, Clone)]
pub struct StubConstructor {
    service: ServiceDescriptor,
}

impl StubConstructor {
    pub(crate) fn new(service: ServiceDescriptor) -> Self {
        Self { service }
    }

    /// The schema of the service this constructor builds stubs for.
    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn construct<S>(&self, channel: S) -> Stub<S>
    where
        S: GrpcService<tonic::body::Body>,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        Stub {
            service: self.service.clone(),
            grpc_client: GrpcClient::new(channel),
        }
    }
}

/// A live proxy for a remote service. Cloning is cheap and shares the transport.
#[derive(Debug, Clone)]
pub struct Stub<S = Channel> {
    service: ServiceDescriptor,
    grpc_client: GrpcClient<S>,
}

impl<S> Stub<S> {
    /// Resolves an RPC of this service by name.
    pub fn method(&self, name: &str) -> Result<MethodDescriptor, ProtocolError> {
        self.service
            .methods()
            .find(|m| m.name() == name)
            .ok_or_else(|| ProtocolError::MethodNotFound {
                service: self.service.full_name().to_string(),
                method: name.to_string(),
            })
    }
}

impl<S> Stub<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Invokes a unary RPC. Failures are mapped to [`crate::error::TransportError`].
    pub async fn call(
        &mut self,
        method: MethodDescriptor,
        message: DynamicMessage,
        options: CallOptions,
    ) -> Result<serde_json::Value, DispatchError> {
        let response = self.grpc_client.unary(method, message, options).await?;
        Ok(response?)
    }

    /// Invokes a server-streaming RPC.
    ///
    /// A failure to start the call is returned as an error; a failure mid-stream is yielded
    /// as the last item of the stream.
    pub async fn call_streaming(
        &mut self,
        method: MethodDescriptor,
        message: DynamicMessage,
        options: CallOptions,
    ) -> Result<BoxStream<'static, Result<serde_json::Value, DispatchError>>, DispatchError> {
        let stream = self
            .grpc_client
            .server_streaming(method, message, options)
            .await??;

        Ok(Box::pin(stream.map(|item| item.map_err(DispatchError::from))))
    }
}

/// Validates `fields` against the input of `method` and builds the outgoing message.
pub fn encode_request(
    method: &MethodDescriptor,
    fields: serde_json::Value,
) -> Result<DynamicMessage, ProtocolError> {
    DynamicMessage::deserialize(method.input(), fields).map_err(|source| {
        ProtocolError::InvalidRequest {
            method: method.full_name().to_string(),
            source,
        }
    })
}
