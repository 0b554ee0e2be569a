//! # Protocol Definitions
//!
//! This module resolves the protocol definitions of the services a client talks to and turns
//! them into callable stubs.
//!
//! Definitions are binary `FileDescriptorSet`s (as produced by
//! `protoc --include_imports --descriptor_set_out`), loaded at runtime with `prost-reflect`,
//! so no code generation is needed to talk to a new API.
pub mod loader;
pub mod stub;
