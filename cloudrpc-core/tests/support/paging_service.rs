//! An in-process `test.paging.v1.InstanceAdmin` server.
//!
//! It is a plain `tower` service over `http` requests, so a dispatcher can use it as its
//! channel. Every call is recorded, and failures can be scripted before the real handler runs.
use super::descriptor::paging_descriptor_set;
use futures_util::{
    future::BoxFuture,
    stream::{self, BoxStream},
};
use prost::Message;
use prost_reflect::{
    DescriptorPool, DynamicMessage, MessageDescriptor, MethodDescriptor, SerializeOptions,
    ServiceDescriptor,
};
use serde_json::{Value, json};
use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Duration,
};
use tonic::{
    Code, Status,
    body::Body,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
    codegen::Service,
    metadata::MetadataMap,
    server::{Grpc, ServerStreamingService, UnaryService},
};

pub const SERVICE: &str = "test.paging.v1.InstanceAdmin";

/// A call as the server saw it. The body uses proto field names.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub body: Value,
    pub metadata: MetadataMap,
}

impl RecordedCall {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.to_str().ok())
    }
}

struct Failure {
    code: Code,
    remaining: Option<usize>,
}

struct State {
    service: ServiceDescriptor,
    calls: Mutex<Vec<RecordedCall>>,
    failure: Mutex<Option<Failure>>,
    pages: Mutex<Vec<usize>>,
    delay: Mutex<Option<Duration>>,
}

#[derive(Clone)]
pub struct InstanceAdmin {
    state: Arc<State>,
}

impl Default for InstanceAdmin {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceAdmin {
    pub fn new() -> Self {
        let pool = DescriptorPool::decode(paging_descriptor_set().as_slice())
            .expect("valid descriptor set");
        let service = pool.get_service_by_name(SERVICE).expect("service exists");

        Self {
            state: Arc::new(State {
                service,
                calls: Mutex::default(),
                failure: Mutex::default(),
                pages: Mutex::new(vec![0]),
                delay: Mutex::default(),
            }),
        }
    }

    /// Serves `ListInstances` as pages of the given sizes, chained with `page-<n>` tokens.
    pub fn with_pages(self, sizes: &[usize]) -> Self {
        *self.state.pages.lock().unwrap() = sizes.to_vec();
        self
    }

    /// Delays every successful response.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.state.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Fails the next `times` calls with `code`.
    pub fn fail_next(&self, times: usize, code: Code) {
        *self.state.failure.lock().unwrap() = (times > 0).then_some(Failure {
            code,
            remaining: Some(times),
        });
    }

    /// Fails every call with `code`.
    pub fn fail_always(&self, code: Code) {
        *self.state.failure.lock().unwrap() = Some(Failure {
            code,
            remaining: None,
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }
}

impl State {
    fn record(&self, method: &str, metadata: &MetadataMap, body: &Value) {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            body: body.clone(),
            metadata: metadata.clone(),
        });
    }

    fn next_failure(&self) -> Option<Status> {
        let mut slot = self.failure.lock().unwrap();
        let failure = slot.as_mut()?;
        let code = failure.code;

        if let Some(remaining) = failure.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                *slot = None;
            }
        }

        Some(Status::new(code, "scripted failure"))
    }

    async fn accept(&self, method: &str, request: tonic::Request<Value>) -> Result<Value, Status> {
        let (metadata, _, body) = request.into_parts();
        self.record(method, &metadata, &body);

        if let Some(status) = self.next_failure() {
            return Err(status);
        }

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(body)
    }

    fn list_instances(&self, body: &Value) -> Value {
        let pages = self.pages.lock().unwrap().clone();
        let index = body["page_token"]
            .as_str()
            .and_then(|token| token.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        let instances: Vec<Value> = (0..pages.get(index).copied().unwrap_or(0))
            .map(|i| json!({ "name": format!("instances/{index}-{i}") }))
            .collect();

        if index + 1 < pages.len() {
            json!({ "instances": instances, "next_page_token": format!("page-{}", index + 1) })
        } else {
            json!({ "instances": instances })
        }
    }

    fn unary(&self, method: &str, body: Value) -> Result<Value, Status> {
        match method {
            "ListInstances" => Ok(self.list_instances(&body)),
            "GetInstance" => match body["name"].as_str() {
                Some(name) if name.ends_with("/missing") => {
                    Err(Status::not_found(format!("{name} does not exist")))
                }
                Some(name) => Ok(json!({ "name": name, "display_name": "Test", "serve_nodes": 3 })),
                None => Err(Status::invalid_argument("name is required")),
            },
            "CreateInstance" => {
                let mut instance = body["instance"].clone();
                let name = format!(
                    "{}/instances/{}",
                    body["parent"].as_str().unwrap_or_default(),
                    body["instance_id"].as_str().unwrap_or_default()
                );
                instance["name"] = Value::from(name);
                Ok(instance)
            }
            other => Err(Status::unimplemented(format!("{other} is not unary"))),
        }
    }

    fn watch(&self, body: &Value) -> Vec<Result<Value, Status>> {
        let mut events: Vec<_> = (0..3)
            .map(|i| Ok(json!({ "name": format!("instances/watch-{i}") })))
            .collect();

        if body["filter"] == "interrupt" {
            events.truncate(1);
            events.push(Err(Status::internal("watch interrupted")));
        }

        events
    }
}

struct UnaryHandler {
    state: Arc<State>,
    method: String,
}

impl UnaryService<Value> for UnaryHandler {
    type Response = Value;
    type Future = BoxFuture<'static, Result<tonic::Response<Value>, Status>>;

    fn call(&mut self, request: tonic::Request<Value>) -> Self::Future {
        let state = self.state.clone();
        let method = self.method.clone();

        Box::pin(async move {
            let body = state.accept(&method, request).await?;
            state.unary(&method, body).map(tonic::Response::new)
        })
    }
}

struct WatchHandler {
    state: Arc<State>,
}

impl ServerStreamingService<Value> for WatchHandler {
    type Response = Value;
    type ResponseStream = BoxStream<'static, Result<Value, Status>>;
    type Future = BoxFuture<'static, Result<tonic::Response<Self::ResponseStream>, Status>>;

    fn call(&mut self, request: tonic::Request<Value>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let body = state.accept("WatchInstances", request).await?;
            let events: Self::ResponseStream = Box::pin(stream::iter(state.watch(&body)));
            Ok(tonic::Response::new(events))
        })
    }
}

impl Service<http::Request<Body>> for InstanceAdmin {
    type Response = http::Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let method = request
                .uri()
                .path()
                .strip_prefix(&format!("/{SERVICE}/"))
                .and_then(|name| state.service.methods().find(|m| m.name() == name));

            let Some(method) = method else {
                return Ok(Status::unimplemented("unknown method").into_http());
            };

            let mut grpc = Grpc::new(ValueCodec::new(&method));
            let response = match (method.is_client_streaming(), method.is_server_streaming()) {
                (false, false) => {
                    let handler = UnaryHandler {
                        state,
                        method: method.name().to_string(),
                    };
                    grpc.unary(handler, request).await
                }
                (false, true) => grpc.server_streaming(WatchHandler { state }, request).await,
                _ => Status::unimplemented("streaming requests are not served").into_http(),
            };

            Ok(response)
        })
    }
}

/// Server side codec: requests decode to JSON, JSON responses encode against the output.
struct ValueCodec {
    input: MessageDescriptor,
    output: MessageDescriptor,
}

impl ValueCodec {
    fn new(method: &MethodDescriptor) -> Self {
        Self {
            input: method.input(),
            output: method.output(),
        }
    }
}

impl Codec for ValueCodec {
    type Encode = Value;
    type Decode = Value;
    type Encoder = ValueEncoder;
    type Decoder = ValueDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        ValueEncoder(self.output.clone())
    }

    fn decoder(&mut self) -> Self::Decoder {
        ValueDecoder(self.input.clone())
    }
}

struct ValueEncoder(MessageDescriptor);

impl Encoder for ValueEncoder {
    type Item = Value;
    type Error = Status;

    fn encode(&mut self, item: Value, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        let message = DynamicMessage::deserialize(self.0.clone(), item)
            .map_err(|e| Status::internal(format!("response does not fit the schema: {e}")))?;
        message.encode_raw(dst);
        Ok(())
    }
}

struct ValueDecoder(MessageDescriptor);

impl Decoder for ValueDecoder {
    type Item = Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Value>, Status> {
        let mut message = DynamicMessage::new(self.0.clone());
        message
            .merge(src)
            .map_err(|e| Status::internal(format!("undecodable request: {e}")))?;

        let options = SerializeOptions::new().use_proto_field_name(true);
        let value = message
            .serialize_with_options(serde_json::value::Serializer, &options)
            .map_err(|e| Status::internal(format!("unserializable request: {e}")))?;

        Ok(Some(value))
    }
}
