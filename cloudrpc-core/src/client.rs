//! # Dispatcher
//!
//! The [`Dispatcher`] turns a [`LogicalRequest`] into a gRPC call and its result into JSON.
//!
//! For every request it:
//!
//! 1. Resolves the client credentials (once per client, see [`credentials`]).
//! 2. Fetches or builds the [`Stub`] of the logical service. Stubs are cached per dispatcher.
//! 3. Strips pagination control fields and translates field names to the wire convention
//!    (`snake_case`).
//! 4. Encodes the fields against the method input, failing before any call on a mismatch.
//! 5. Invokes the RPC under a deadline and the [`retry`] policy.
//!
//! Responses keep the proto field names. Failures carry the HTTP status paired with the
//! gRPC code (see [`crate::grpc::status`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use cloudrpc_core::client::{
//!     Dispatcher, LogicalRequest, ProtoService, ServiceDescriptor,
//!     credentials::StaticTokenProvider,
//! };
//! use cloudrpc_core::config::ClientConfig;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = ServiceDescriptor::new("pubsub", "v1", "https://pubsub.googleapis.com")
//!     .with_proto_service(
//!         "Publisher",
//!         ProtoService::new("google/pubsub/v1/pubsub.binpb", "google.pubsub.v1.Publisher"),
//!     );
//!
//! let dispatcher = Dispatcher::new(descriptor, ClientConfig::from_env()?)
//!     .with_token_provider(Arc::new(StaticTokenProvider::new("ya29.token")));
//!
//! let _topic = dispatcher
//!     .dispatch(
//!         LogicalRequest::new("Publisher", "GetTopic")
//!             .with_field("topic", serde_json::json!("projects/p/topics/t")),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
pub mod connector;
pub mod credentials;
pub mod retry;
mod stub_cache;
mod types;

pub use stub_cache::StubCache;
pub use types::*;

use crate::{
    BoxError,
    config::ClientConfig,
    error::{ConfigurationError, DispatchError, ProtocolError},
    fields,
    grpc::client::CallOptions,
    paginate::{self, Page, PageSource, PagedQuery, Paginated},
    proto::{
        loader::ProtoLoader,
        stub::{Stub, encode_request},
    },
};
use connector::{ChannelConnector, Connector, SharedService};
use credentials::{CredentialHandle, CredentialResolver, TokenProvider};
use futures_util::{Stream, stream::BoxStream};
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use retry::RetryPolicy;
use serde_json::Value;
use std::{fmt::Debug, path::PathBuf, sync::Arc};
use tokio::time::Instant;
use tonic::{client::GrpcService, transport::Channel};
use tracing::debug;

/// Dispatches logical requests to the services of one [`ServiceDescriptor`].
///
/// Dispatch takes `&self`: a dispatcher can be shared (e.g. behind an `Arc`) by concurrent
/// tasks, which then share its stubs and credentials.
pub struct Dispatcher<S = Channel> {
    descriptor: ServiceDescriptor,
    config: ClientConfig,
    loader: ProtoLoader,
    connector: Box<dyn Connector<S>>,
    credentials: CredentialResolver,
    stubs: StubCache<S>,
    retry: RetryPolicy,
}

impl Dispatcher<Channel> {
    /// A dispatcher connecting to the URLs of `descriptor` over real channels.
    pub fn new(descriptor: ServiceDescriptor, config: ClientConfig) -> Self {
        Self::with_connector(descriptor, config, ChannelConnector)
    }
}

impl<S> Dispatcher<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// A dispatcher sending every call to the in-process `service`.
    pub fn from_service(descriptor: ServiceDescriptor, config: ClientConfig, service: S) -> Self {
        Self::with_connector(descriptor, config, SharedService(service))
    }
}

impl<S> Dispatcher<S> {
    pub fn with_connector(
        descriptor: ServiceDescriptor,
        config: ClientConfig,
        connector: impl Connector<S> + 'static,
    ) -> Self {
        Self {
            loader: ProtoLoader::new(config.proto_dir.clone()),
            credentials: CredentialResolver::new(descriptor.security, None),
            retry: RetryPolicy::new(config.retry.clone()),
            connector: Box::new(connector),
            stubs: StubCache::default(),
            descriptor,
            config,
        }
    }

    /// Sets the source of access tokens for secure services.
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.credentials = CredentialResolver::new(self.descriptor.security, Some(provider));
        self
    }

    /// Serves the proto services declared with `path` from an in-memory descriptor set.
    pub fn with_file_descriptor_set(
        mut self,
        path: impl Into<PathBuf>,
        bytes: &[u8],
    ) -> Result<Self, ConfigurationError> {
        self.loader = self.loader.with_file_descriptor_set(path, bytes)?;
        Ok(self)
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stubs(&self) -> &StubCache<S> {
        &self.stubs
    }

    /// Exchanges a new access token. Calls issued afterwards carry it.
    pub async fn refresh_credentials(&self) -> Result<(), DispatchError> {
        self.credentials.refresh().await.map(|_| ())
    }
}

/// A fully prepared call: everything a retry needs to reissue it.
struct PreparedCall<S> {
    stub: Stub<S>,
    method: MethodDescriptor,
    message: DynamicMessage,
    options: CallOptions,
}

impl<S> Dispatcher<S>
where
    S: GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Executes a unary RPC and returns its response as JSON.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The response message, with proto field names. `Value::Null` when the
    ///   client is sandboxed.
    /// * `Err(DispatchError)` - See [`DispatchError`] for the failure classes.
    pub async fn dispatch(&self, request: LogicalRequest) -> Result<Value, DispatchError> {
        if self.config.sandboxed {
            debug!(
                service = %request.service,
                method = %request.method,
                "Sandboxed, skipping call"
            );
            return Ok(Value::Null);
        }

        let call = self.prepare(request, false).await?;

        self.retry
            .run(|| {
                let mut stub = call.stub.clone();
                let (method, message, options) =
                    (call.method.clone(), call.message.clone(), call.options.clone());
                async move { stub.call(method, message, options).await }
            })
            .await
    }

    /// Executes a server-streaming RPC.
    ///
    /// Starting the call is retried like [`Dispatcher::dispatch`]; a failure once messages
    /// flow ends the stream with that error. A sandboxed client returns an empty stream.
    pub async fn dispatch_stream(
        &self,
        request: LogicalRequest,
    ) -> Result<BoxStream<'static, Result<Value, DispatchError>>, DispatchError> {
        if self.config.sandboxed {
            debug!(
                service = %request.service,
                method = %request.method,
                "Sandboxed, skipping call"
            );
            return Ok(Box::pin(futures_util::stream::empty()));
        }

        let call = self.prepare(request, true).await?;

        self.retry
            .run(|| {
                let mut stub = call.stub.clone();
                let (method, message, options) =
                    (call.method.clone(), call.message.clone(), call.options.clone());
                async move { stub.call_streaming(method, message, options).await }
            })
            .await
    }

    /// Runs a list RPC, fetching one page or every page depending on
    /// [`PagedQuery::auto_paginate`].
    pub async fn list(
        &self,
        method: &ListMethod,
        query: PagedQuery,
    ) -> Result<Paginated<Value>, DispatchError> {
        paginate::run(ListPages::new(self, method), query).await
    }

    /// Streams the items of a list RPC, fetching pages as the stream is consumed.
    pub fn list_stream<'a>(
        &'a self,
        method: &'a ListMethod,
        query: PagedQuery,
    ) -> impl Stream<Item = Result<Value, DispatchError>> + 'a {
        paginate::into_stream(ListPages::new(self, method), query)
    }

    async fn prepare(
        &self,
        request: LogicalRequest,
        streaming: bool,
    ) -> Result<PreparedCall<S>, DispatchError> {
        let credentials = self.credentials.get().await?;
        let stub = self.stub(&request.service, &credentials)?;
        let method = stub.method(&request.method)?;

        let expected = if streaming { "server streaming" } else { "unary" };
        let actual = call_kind(&method);
        if actual != expected {
            return Err(ProtocolError::CallKindMismatch {
                method: method.full_name().to_string(),
                actual,
                expected,
            }
            .into());
        }

        let mut wire_fields = request.fields;
        fields::strip_control_fields(&mut wire_fields);
        let message = encode_request(&method, fields::snakeize(Value::Object(wire_fields)))?;

        let deadline = request
            .timeout
            .or(self.config.default_timeout)
            .map(|timeout| Instant::now() + timeout);

        debug!(
            service = %request.service,
            method = %method.full_name(),
            deadline = ?deadline,
            "Dispatching request"
        );

        Ok(PreparedCall {
            stub,
            method,
            message,
            options: CallOptions {
                headers: request.headers,
                authorization: credentials.authorization().cloned(),
                deadline,
            },
        })
    }

    fn stub(
        &self,
        service: &str,
        credentials: &CredentialHandle,
    ) -> Result<Stub<S>, DispatchError> {
        self.stubs.get_or_try_insert_with(service, || {
            let proto = self
                .descriptor
                .proto_services
                .get(service)
                .ok_or_else(|| ConfigurationError::UnknownService(service.to_string()))?;
            let base_url = proto.base_url.as_deref().unwrap_or(&self.descriptor.base_url);

            let constructor = self.loader.load(proto)?;
            let channel = self.connector.connect(base_url, credentials)?;

            debug!(service, grpc_service = %proto.service, base_url, "Created stub");
            Ok(constructor.construct(channel))
        })
    }
}

impl<S> Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("descriptor", &self.descriptor)
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

fn call_kind(method: &MethodDescriptor) -> &'static str {
    match (method.is_client_streaming(), method.is_server_streaming()) {
        (false, false) => "unary",
        (false, true) => "server streaming",
        (true, false) => "client streaming",
        (true, true) => "bidirectional streaming",
    }
}

/// A paginated list RPC.
///
/// The response is expected to carry the page items in a repeated field (`items_field`,
/// proto name) and the cursor of the next page in `next_page_token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMethod {
    pub service: String,
    pub method: String,
    pub items_field: String,
}

impl ListMethod {
    pub fn new(
        service: impl Into<String>,
        method: impl Into<String>,
        items_field: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            items_field: items_field.into(),
        }
    }

    /// Extracts a page from one response of this method.
    ///
    /// A missing (or `null`) items field is an empty page. A `next_page_token` that is
    /// absent or empty ends the listing.
    pub fn page(&self, query: &PagedQuery, response: Value) -> Result<Page<Value>, ProtocolError> {
        let items = match response.get(&self.items_field) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(ProtocolError::UnexpectedResponse {
                    field: self.items_field.clone(),
                    reason: "is not a list",
                });
            }
        };

        let next_query = response
            .get("next_page_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(|token| query.with_page_token(token));

        Ok(Page {
            items,
            next_query,
            response,
        })
    }
}

struct ListPages<'a, S> {
    dispatcher: &'a Dispatcher<S>,
    method: &'a ListMethod,
}

impl<'a, S> ListPages<'a, S> {
    fn new(dispatcher: &'a Dispatcher<S>, method: &'a ListMethod) -> Self {
        Self { dispatcher, method }
    }
}

impl<S> PageSource for ListPages<'_, S>
where
    S: GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    type Item = Value;
    type Error = DispatchError;

    async fn fetch_page(&mut self, query: &PagedQuery) -> Result<Page<Value>, DispatchError> {
        let mut request = LogicalRequest::new(&self.method.service, &self.method.method);
        request.fields = query.wire_fields();

        let response = self.dispatcher.dispatch(request).await?;
        Ok(self.method.page(query, response)?)
    }
}
