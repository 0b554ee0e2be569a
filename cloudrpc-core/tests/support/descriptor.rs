//! Descriptor set of the `test.paging.v1` package, built in code so tests need no `protoc`.
//!
//! ```proto
//! message Instance { string name = 1; string display_name = 2; int32 serve_nodes = 3; }
//! message ListInstancesRequest {
//!   string parent = 1; string page_token = 2; int32 page_size = 3; string filter = 4;
//! }
//! message ListInstancesResponse { repeated Instance instances = 1; string next_page_token = 2; }
//! message GetInstanceRequest { string name = 1; }
//! message CreateInstanceRequest {
//!   string parent = 1; string instance_id = 2; Instance instance = 3;
//! }
//!
//! service InstanceAdmin {
//!   rpc ListInstances(ListInstancesRequest) returns (ListInstancesResponse);
//!   rpc GetInstance(GetInstanceRequest) returns (Instance);
//!   rpc CreateInstance(CreateInstanceRequest) returns (Instance);
//!   rpc WatchInstances(ListInstancesRequest) returns (stream Instance);
//!   rpc ImportInstances(stream Instance) returns (ListInstancesResponse);
//! }
//! ```
use prost::Message;
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};

const PACKAGE: &str = "test.paging.v1";

fn field(name: &str, json_name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        json_name: Some(json_name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn message_field(name: &str, json_name: &str, number: i32, message: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(format!(".{PACKAGE}.{message}")),
        ..field(name, json_name, number, Type::Message)
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn method(
    name: &str,
    input: &str,
    output: &str,
    client_streaming: bool,
    server_streaming: bool,
) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(format!(".{PACKAGE}.{input}")),
        output_type: Some(format!(".{PACKAGE}.{output}")),
        client_streaming: Some(client_streaming),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

/// The encoded `FileDescriptorSet`, as `protoc --include_imports -o` would write it.
pub fn paging_descriptor_set() -> Vec<u8> {
    let instances = FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..message_field("instances", "instances", 1, "Instance")
    };

    let file = FileDescriptorProto {
        name: Some("test/paging/v1/paging.proto".to_string()),
        package: Some(PACKAGE.to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            message(
                "Instance",
                vec![
                    field("name", "name", 1, Type::String),
                    field("display_name", "displayName", 2, Type::String),
                    field("serve_nodes", "serveNodes", 3, Type::Int32),
                ],
            ),
            message(
                "ListInstancesRequest",
                vec![
                    field("parent", "parent", 1, Type::String),
                    field("page_token", "pageToken", 2, Type::String),
                    field("page_size", "pageSize", 3, Type::Int32),
                    field("filter", "filter", 4, Type::String),
                ],
            ),
            message(
                "ListInstancesResponse",
                vec![
                    instances,
                    field("next_page_token", "nextPageToken", 2, Type::String),
                ],
            ),
            message(
                "GetInstanceRequest",
                vec![field("name", "name", 1, Type::String)],
            ),
            message(
                "CreateInstanceRequest",
                vec![
                    field("parent", "parent", 1, Type::String),
                    field("instance_id", "instanceId", 2, Type::String),
                    message_field("instance", "instance", 3, "Instance"),
                ],
            ),
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("InstanceAdmin".to_string()),
            method: vec![
                method(
                    "ListInstances",
                    "ListInstancesRequest",
                    "ListInstancesResponse",
                    false,
                    false,
                ),
                method("GetInstance", "GetInstanceRequest", "Instance", false, false),
                method("CreateInstance", "CreateInstanceRequest", "Instance", false, false),
                method("WatchInstances", "ListInstancesRequest", "Instance", false, true),
                method(
                    "ImportInstances",
                    "Instance",
                    "ListInstancesResponse",
                    true,
                    false,
                ),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    FileDescriptorSet { file: vec![file] }.encode_to_vec()
}
