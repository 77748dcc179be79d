//! Outcome of a single plugin phase invocation.

use http::StatusCode;

use crate::context::Resource;

/// What a plugin hook tells the orchestrator to do next.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PluginResult {
    /// Continue to the next plugin.
    #[default]
    Continue,
    /// Continue, replacing the phase's resource slot with this resource.
    ContinueWithResource(Resource),
    /// Stop running the remaining plugins of this phase. A carried resource
    /// is applied to the phase's resource slot first.
    SkipRemaining(Option<Resource>),
    /// Refuse the operation.
    Abort {
        /// HTTP status reported to the caller.
        status: StatusCode,
        /// Human-readable reason.
        message: String,
    },
}

impl PluginResult {
    /// Creates a continue result.
    pub fn proceed() -> Self {
        Self::Continue
    }

    /// Creates a continue result carrying a modified resource.
    pub fn modified(resource: Resource) -> Self {
        Self::ContinueWithResource(resource)
    }

    /// Creates a skip-remaining result without a resource.
    pub fn skip() -> Self {
        Self::SkipRemaining(None)
    }

    /// Creates a skip-remaining result carrying a resource.
    pub fn skip_with(resource: Resource) -> Self {
        Self::SkipRemaining(Some(resource))
    }

    /// Creates an abort result.
    pub fn abort(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Abort {
            status,
            message: message.into(),
        }
    }

    /// Abort synthesized for a plugin that failed instead of answering.
    pub fn plugin_error(message: impl std::fmt::Display) -> Self {
        Self::abort(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Plugin error: {message}"),
        )
    }

    /// Whether this result refuses the operation.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort { .. })
    }

    /// Whether this result stops the current phase.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkipRemaining(_))
    }

    /// The resource carried by this result, if any.
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::ContinueWithResource(r) | Self::SkipRemaining(Some(r)) => Some(r),
            _ => None,
        }
    }

    /// Consumes the result, returning the carried resource.
    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Self::ContinueWithResource(r) | Self::SkipRemaining(Some(r)) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_accessor() {
        assert_eq!(PluginResult::proceed().resource(), None);
        assert_eq!(PluginResult::skip().resource(), None);
        let r = json!({"resourceType": "Patient"});
        assert_eq!(PluginResult::modified(r.clone()).resource(), Some(&r));
        assert_eq!(PluginResult::skip_with(r.clone()).into_resource(), Some(r));
    }

    #[test]
    fn test_plugin_error_is_500_abort() {
        let result = PluginResult::plugin_error("boom");
        match result {
            PluginResult::Abort { status, message } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "Plugin error: boom");
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }
}
