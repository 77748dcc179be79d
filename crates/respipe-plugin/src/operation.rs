//! Outcome of the wrapped core operation.

use std::collections::BTreeMap;

use http::StatusCode;
use thiserror::Error;

use respipe_core::error::PipelineError;

use crate::context::Resource;
use crate::result::PluginResult;

/// Failure raised by a core operation or by the AFTER phase wrapped around it.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    /// The operation reported a failure.
    #[error("{0}")]
    Failed(String),
    /// The operation panicked.
    #[error("operation panicked: {0}")]
    Panicked(String),
    /// A pipeline error propagated out of the operation.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl OperationError {
    /// Creates a failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// The bare message, without kind prefixes.
    pub fn message(&self) -> &str {
        match self {
            Self::Failed(m) | Self::Panicked(m) => m,
            Self::Pipeline(e) => &e.message,
        }
    }
}

/// Result of a wrapped operation as returned to the operation-handling layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Resulting resource, if any.
    pub resource: Option<Resource>,
    /// HTTP status to report.
    pub status: StatusCode,
    /// Response headers (e.g. `ETag`, `Location`).
    pub headers: BTreeMap<String, String>,
    /// Failure reason, set on failures only.
    pub message: Option<String>,
}

impl OperationResult {
    /// A successful result with an explicit status.
    pub fn success(resource: Option<Resource>, status: StatusCode) -> Self {
        Self {
            success: true,
            resource,
            status,
            headers: BTreeMap::new(),
            message: None,
        }
    }

    /// A `200 OK` result.
    pub fn ok(resource: Resource) -> Self {
        Self::success(Some(resource), StatusCode::OK)
    }

    /// A `201 Created` result.
    pub fn created(resource: Resource) -> Self {
        Self::success(Some(resource), StatusCode::CREATED)
    }

    /// A `204 No Content` result.
    pub fn no_content() -> Self {
        Self::success(None, StatusCode::NO_CONTENT)
    }

    /// A failed result.
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            resource: None,
            status,
            headers: BTreeMap::new(),
            message: Some(message.into()),
        }
    }

    /// The generic `500` failure reported for an operation error.
    pub fn from_error(err: &OperationError) -> Self {
        Self::failure(StatusCode::INTERNAL_SERVER_ERROR, err.message())
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replaces the resource.
    pub fn with_resource(mut self, resource: Option<Resource>) -> Self {
        self.resource = resource;
        self
    }

    /// Looks up a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Converts into the equivalent plugin result: a failure becomes an
    /// abort, a success carrying a resource becomes a modification.
    pub fn into_plugin_result(self) -> PluginResult {
        match (self.success, self.resource) {
            (false, _) => PluginResult::Abort {
                status: self.status,
                message: self.message.unwrap_or_default(),
            },
            (true, Some(resource)) => PluginResult::ContinueWithResource(resource),
            (true, None) => PluginResult::Continue,
        }
    }
}

impl From<PluginResult> for OperationResult {
    fn from(result: PluginResult) -> Self {
        match result {
            PluginResult::Abort { status, message } => Self::failure(status, message),
            other => Self::success(other.into_resource(), StatusCode::OK),
        }
    }
}
