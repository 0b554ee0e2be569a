use serde::Deserialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, path::PathBuf, time::Duration};

/// Identifies the remote API a client talks to.
///
/// A descriptor is immutable once built and owned by a single [`super::Dispatcher`].
/// It can be deserialized from JSON:
///
/// ```rust
/// use cloudrpc_core::client::{SecurityMode, ServiceDescriptor};
///
/// let descriptor: ServiceDescriptor = serde_json::from_value(serde_json::json!({
///     "service": "bigtableadmin",
///     "apiVersion": "v2",
///     "baseUrl": "https://bigtableadmin.googleapis.com",
///     "protoServices": {
///         "BigtableInstanceAdmin": {
///             "path": "google/bigtable/admin/v2/bigtable_instance_admin.binpb",
///             "service": "google.bigtable.admin.v2.BigtableInstanceAdmin"
///         }
///     }
/// })).unwrap();
///
/// assert_eq!(descriptor.security, SecurityMode::Secure);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    /// Short name of the API (e.g. `pubsub`).
    pub service: String,
    /// API version (e.g. `v1`).
    pub api_version: String,
    /// Base URL used by every proto service without an override.
    pub base_url: String,
    /// Whether calls go over TLS with credentials or over plaintext.
    #[serde(default)]
    pub security: SecurityMode,
    /// Logical service name -> protocol definition.
    pub proto_services: BTreeMap<String, ProtoService>,
}

impl ServiceDescriptor {
    pub fn new(
        service: impl Into<String>,
        api_version: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            api_version: api_version.into(),
            base_url: base_url.into(),
            security: SecurityMode::default(),
            proto_services: BTreeMap::new(),
        }
    }

    /// Declares a proto service reachable under the logical `name`.
    pub fn with_proto_service(mut self, name: impl Into<String>, proto: ProtoService) -> Self {
        self.proto_services.insert(name.into(), proto);
        self
    }

    pub fn with_security(mut self, security: SecurityMode) -> Self {
        self.security = security;
        self
    }

    /// The URL stubs of the proto service `name` connect to.
    pub fn endpoint_for(&self, name: &str) -> Option<&str> {
        self.proto_services
            .get(name)
            .map(|proto| proto.base_url.as_deref().unwrap_or(&self.base_url))
    }
}

/// Where to find the protocol definition of one gRPC service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoService {
    /// Path of the binary `FileDescriptorSet`, relative to the loader base directory.
    pub path: PathBuf,
    /// Fully qualified gRPC service name (e.g. `google.pubsub.v1.Publisher`).
    pub service: String,
    /// Overrides [`ServiceDescriptor::base_url`] for this service.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProtoService {
    pub fn new(path: impl Into<PathBuf>, service: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            service: service.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// TLS channel plus a bearer token on every call.
    #[default]
    Secure,
    /// Plaintext, unauthenticated. Meant for emulators and in-process services.
    Insecure,
}

/// The caller-facing description of an RPC, before wire-format translation.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalRequest {
    /// Logical service name, a key of [`ServiceDescriptor::proto_services`].
    pub service: String,
    /// The name of the method to call (e.g. `ListInstances`).
    pub method: String,
    /// Request fields in camelCase.
    pub fields: Map<String, Value>,
    /// Overrides the client default timeout.
    pub timeout: Option<Duration>,
    /// Custom gRPC metadata (headers) to attach to the request.
    pub headers: Vec<(String, String)>,
}

impl LogicalRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            fields: Map::new(),
            timeout: None,
            headers: Vec::new(),
        }
    }

    /// Replaces the request fields.
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields = fields;
        self
    }

    /// Sets a single request field, keeping the others.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}
