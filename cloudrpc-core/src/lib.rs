//! # cloudrpc core
//!
//! `cloudrpc_core` is the shared RPC layer behind Google Cloud client wrappers (Bigtable,
//! Pub/Sub, Logging, Resource Manager, ...). Wrappers describe *what* to call; this crate
//! takes care of *how*: loading service schemas at runtime, authenticating, translating
//! field names, retrying transient failures and walking paginated listings.
//!
//! ## Key Components
//!
//! * **[`client::Dispatcher`]:** The main entry point. Turns a [`client::LogicalRequest`] into a
//!   gRPC call against a cached stub and returns the response as JSON.
//! * **[`client::credentials`]:** Exchanges access tokens for transport credentials, cached
//!   per client.
//! * **[`client::retry`]:** Retries `UNAVAILABLE` failures with a configurable policy.
//! * **[`paginate`]:** Single page, accumulate-all and lazy stream views over list RPCs.
//! * **[`proto`]:** Loads binary `FileDescriptorSet`s and builds callable stubs from them.
//!
//! ## Internal clients
//!
//! * **[`grpc::client::GrpcClient`]:** A dynamic gRPC client using a custom JSON codec.
//! * **[`grpc::status`]:** The gRPC code to HTTP status table surfaced in every failure.
//!
//! ## JsonCodec
//!
//! An implementation of `tonic::codec::Codec` that encodes `DynamicMessage`s and decodes
//! responses straight into `serde_json::Value`, keeping the proto field names.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
//!
//! See the README.md for more details about usage.
pub mod client;
pub mod config;
pub mod error;
pub mod fields;
pub mod grpc;
pub mod paginate;
pub mod proto;

#[cfg(test)]
#[path = "../tests/support/descriptor.rs"]
mod test_support;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
