//! Per-request state threaded through every pipeline phase.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use respipe_core::tenant::{self, TenantId};

use crate::descriptor::OperationKind;

/// A resource as seen by the pipeline.
pub type Resource = Value;

/// Protocol version assumed when the caller does not supply one.
pub const DEFAULT_VERSION: &str = "R4";

#[derive(Debug)]
struct ContextInner {
    operation: OperationKind,
    resource_type: String,
    version: String,
    tenant_id: Option<TenantId>,
    request_id: Uuid,
    timestamp: DateTime<Utc>,
    input: RwLock<Option<Resource>>,
    output: RwLock<Option<Resource>>,
    user_id: RwLock<Option<String>>,
    client_id: RwLock<Option<String>>,
    attributes: DashMap<String, Value>,
}

/// State of one request, shared by every plugin that handles it.
///
/// Cloning is cheap and yields a handle to the *same* request state: the
/// orchestrator hands clones to background hooks, which may therefore
/// observe and race with writes made by later phases. Hooks running in the
/// background must not assume exclusive access; concurrent writes to a slot
/// resolve as last-writer-wins.
#[derive(Debug, Clone)]
pub struct PluginContext {
    inner: Arc<ContextInner>,
}

impl PluginContext {
    /// Starts building a context for `operation` on `resource_type`.
    pub fn builder(
        operation: OperationKind,
        resource_type: impl Into<String>,
    ) -> PluginContextBuilder {
        PluginContextBuilder::new(operation, resource_type)
    }

    /// Creates a context with default metadata.
    pub fn new(operation: OperationKind, resource_type: impl Into<String>) -> Self {
        Self::builder(operation, resource_type).build()
    }

    /// The operation being executed.
    pub fn operation(&self) -> &OperationKind {
        &self.inner.operation
    }

    /// The resource type the operation targets.
    pub fn resource_type(&self) -> &str {
        &self.inner.resource_type
    }

    /// Protocol version negotiated for the request.
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// Tenant the request belongs to, if any.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.inner.tenant_id.as_ref()
    }

    /// Unique request identifier.
    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    /// When the context was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.inner.timestamp
    }

    /// Resource supplied by the caller, possibly replaced by BEFORE plugins.
    pub fn input_resource(&self) -> Option<Resource> {
        read(&self.inner.input)
    }

    /// Replaces the input resource.
    pub fn set_input_resource(&self, resource: Option<Resource>) {
        write(&self.inner.input, resource);
    }

    /// Resource produced by the operation, possibly replaced by AFTER plugins.
    pub fn output_resource(&self) -> Option<Resource> {
        read(&self.inner.output)
    }

    /// Replaces the output resource.
    pub fn set_output_resource(&self, resource: Option<Resource>) {
        write(&self.inner.output, resource);
    }

    /// Authenticated user, once known.
    pub fn user_id(&self) -> Option<String> {
        read(&self.inner.user_id)
    }

    /// Records the authenticated user.
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        write(&self.inner.user_id, Some(user_id.into()));
    }

    /// Calling client application, once known.
    pub fn client_id(&self) -> Option<String> {
        read(&self.inner.client_id)
    }

    /// Records the calling client application.
    pub fn set_client_id(&self, client_id: impl Into<String>) {
        write(&self.inner.client_id, Some(client_id.into()));
    }

    /// Gets an attribute, deserialized into `T`.
    ///
    /// Returns `None` when the key is absent or holds a value of another shape.
    pub fn attribute<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner
            .attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.value().clone()).ok())
    }

    /// Gets the raw attribute value.
    pub fn attribute_value(&self, key: &str) -> Option<Value> {
        self.inner.attributes.get(key).map(|v| v.value().clone())
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.attributes.insert(key.into(), value.into());
    }

    /// Whether an attribute is present.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.inner.attributes.contains_key(key)
    }

    /// Removes an attribute, returning its value.
    pub fn remove_attribute(&self, key: &str) -> Option<Value> {
        self.inner.attributes.remove(key).map(|(_, v)| v)
    }
}

/// Builder for [`PluginContext`].
#[derive(Debug)]
pub struct PluginContextBuilder {
    operation: OperationKind,
    resource_type: String,
    version: String,
    tenant_id: Option<Option<TenantId>>,
    request_id: Option<Uuid>,
    input: Option<Resource>,
}

impl PluginContextBuilder {
    fn new(operation: OperationKind, resource_type: impl Into<String>) -> Self {
        Self {
            operation,
            resource_type: resource_type.into(),
            version: DEFAULT_VERSION.to_string(),
            tenant_id: None,
            request_id: None,
            input: None,
        }
    }

    /// Sets the protocol version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the tenant explicitly. Without this, the tenant installed for
    /// the building task is used.
    pub fn with_tenant(mut self, tenant_id: Option<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Sets the request id. A random one is generated otherwise.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Sets the initial input resource.
    pub fn with_input(mut self, resource: Resource) -> Self {
        self.input = Some(resource);
        self
    }

    /// Builds the context.
    pub fn build(self) -> PluginContext {
        let tenant_id = self.tenant_id.unwrap_or_else(tenant::current_tenant);

        PluginContext {
            inner: Arc::new(ContextInner {
                operation: self.operation,
                resource_type: self.resource_type,
                version: self.version,
                tenant_id,
                request_id: self.request_id.unwrap_or_else(Uuid::new_v4),
                timestamp: Utc::now(),
                input: RwLock::new(self.input),
                output: RwLock::new(None),
                user_id: RwLock::new(None),
                client_id: RwLock::new(None),
                attributes: DashMap::new(),
            }),
        }
    }
}

fn read<T: Clone>(slot: &RwLock<T>) -> T {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(slot: &RwLock<T>, value: T) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}
