//! # Generic gRPC Transport
//!
//! This module contains the low-level building blocks for performing gRPC calls using
//! dynamic message types.
//!
//! Unlike standard `tonic` clients which are strongly typed (e.g., `ListInstancesRequest`),
//! the components here work with `DynamicMessage` requests and `serde_json::Value`
//! responses, transcoding them to and from Protobuf binary format on the fly.
pub mod client;
pub mod codec;
pub mod status;
