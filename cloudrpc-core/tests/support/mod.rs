#![allow(dead_code)]

pub mod descriptor;
pub mod paging_service;

use cloudrpc_core::{
    client::{Dispatcher, ProtoService, SecurityMode, ServiceDescriptor, retry::RetryConfig},
    config::ClientConfig,
};
use paging_service::{InstanceAdmin, SERVICE};
use serde_json::{Map, Value};
use std::time::Duration;

pub const DESCRIPTOR_PATH: &str = "test/paging/v1/paging.binpb";

pub fn service_descriptor() -> ServiceDescriptor {
    ServiceDescriptor::new("paging", "v1", "http://paging.test")
        .with_security(SecurityMode::Insecure)
        .with_proto_service("InstanceAdmin", ProtoService::new(DESCRIPTOR_PATH, SERVICE))
}

/// Retries without waiting, so tests run in real time.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        retry: RetryConfig {
            initial_delay: Duration::ZERO,
            ..RetryConfig::default()
        },
        ..ClientConfig::default()
    }
}

pub fn dispatcher_with(server: &InstanceAdmin, config: ClientConfig) -> Dispatcher<InstanceAdmin> {
    Dispatcher::from_service(service_descriptor(), config, server.clone())
        .with_file_descriptor_set(DESCRIPTOR_PATH, &descriptor::paging_descriptor_set())
        .expect("valid descriptor set")
}

pub fn dispatcher(server: &InstanceAdmin) -> Dispatcher<InstanceAdmin> {
    dispatcher_with(server, test_config())
}

/// The map of a `json!({ .. })` object literal.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
