//! # Dynamic Message <-> JSON Codec
//!
//! This module implements `tonic::codec::Codec` so that `tonic` can transport schema-less
//! payloads, bypassing the need for generated Rust structs.
//!
//! ## How it works
//!
//! 1. **Encoder (DynamicMessage -> Proto)**:
//!    - Takes a `DynamicMessage` already validated against the input `MessageDescriptor`
//!      by the dispatcher, so schema mismatches never reach the wire.
//!    - Serializes it into the generic gRPC byte buffer.
//!
//! 2. **Decoder (Proto -> JSON)**:
//!    - Reads raw bytes from the wire.
//!    - Decodes them into a `DynamicMessage` using the output `MessageDescriptor`.
//!    - Converts the message into a `serde_json::Value`, keeping the proto (snake_case)
//!      field names. Responses are handed to callers in the wire convention.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, SerializeOptions};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A custom Codec that sends `DynamicMessage`s and receives `serde_json::Value`s.
pub struct JsonCodec {
    /// Schema for the output message.
    res_desc: MessageDescriptor,
}

impl JsonCodec {
    /// Creates a new `JsonCodec` decoding responses with `res_desc`.
    pub fn new(res_desc: MessageDescriptor) -> Self {
        Self { res_desc }
    }
}

impl Codec for JsonCodec {
    type Encode = DynamicMessage;
    type Decode = serde_json::Value;

    type Encoder = DynamicEncoder;
    type Decoder = JsonDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder::new(self.res_desc.clone())
    }
}

/// Responsible for encoding a validated message into Protobuf bytes.
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode_raw(dst);
        Ok(())
    }
}

/// Responsible for decoding Protobuf bytes into a JSON value.
pub struct JsonDecoder {
    desc: MessageDescriptor,
    options: SerializeOptions,
}

impl JsonDecoder {
    pub fn new(desc: MessageDescriptor) -> Self {
        Self {
            desc,
            options: SerializeOptions::new().use_proto_field_name(true),
        }
    }
}

impl Decoder for JsonDecoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.desc.clone());
        msg.merge(src)
            .map_err(|e| Status::internal(format!("Failed to decode Protobuf bytes: {}", e)))?;

        let value = msg
            .serialize_with_options(serde_json::value::Serializer, &self.options)
            .map_err(|e| Status::internal(format!("Failed to map response to JSON: {}", e)))?;

        Ok(Some(value))
    }
}
