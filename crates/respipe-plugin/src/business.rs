//! Business-rule view over the plugin context.

use http::StatusCode;

use respipe_core::tenant::TenantId;

use crate::context::{PluginContext, Resource};
use crate::descriptor::OperationKind;
use crate::result::PluginResult;

/// Phase a business rule is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessPhase {
    /// Before the core operation; the resource is the request input.
    Before,
    /// After the core operation; the resource is the operation output.
    After,
}

/// Read/write view of a request as seen by business rules.
///
/// The resource shown depends on the phase: the input slot before the
/// operation and the output slot after it. Writes go straight to the
/// underlying [`PluginContext`], so the next rule sees them.
#[derive(Debug, Clone)]
pub struct BusinessContext {
    context: PluginContext,
    phase: BusinessPhase,
}

impl BusinessContext {
    /// Wraps a plugin context for the BEFORE phase.
    pub fn new(context: PluginContext) -> Self {
        Self {
            context,
            phase: BusinessPhase::Before,
        }
    }

    /// Wraps a plugin context for a given phase.
    pub fn for_phase(context: PluginContext, phase: BusinessPhase) -> Self {
        Self { context, phase }
    }

    /// Current phase.
    pub fn phase(&self) -> BusinessPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: BusinessPhase) {
        self.phase = phase;
    }

    /// The underlying plugin context.
    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Operation being executed.
    pub fn operation(&self) -> &OperationKind {
        self.context.operation()
    }

    /// Resource type being operated on.
    pub fn resource_type(&self) -> &str {
        self.context.resource_type()
    }

    /// Tenant of the request.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.context.tenant_id()
    }

    /// Authenticated user.
    pub fn user_id(&self) -> Option<String> {
        self.context.user_id()
    }

    /// Resource under evaluation for the current phase.
    pub fn resource(&self) -> Option<Resource> {
        match self.phase {
            BusinessPhase::Before => self.context.input_resource(),
            BusinessPhase::After => self.context.output_resource(),
        }
    }

    /// Replaces the resource under evaluation for the current phase.
    pub fn set_resource(&self, resource: Resource) {
        match self.phase {
            BusinessPhase::Before => self.context.set_input_resource(Some(resource)),
            BusinessPhase::After => self.context.set_output_resource(Some(resource)),
        }
    }
}

/// Outcome of evaluating business rules.
#[derive(Debug, Clone, PartialEq)]
pub enum BusinessResult {
    /// Rules are satisfied; proceed unchanged.
    Proceed,
    /// Rules are satisfied after modifying the resource.
    Modified(Resource),
    /// A rule refused the operation.
    Abort {
        /// HTTP status reported to the caller.
        status: StatusCode,
        /// Reason for the refusal.
        message: String,
    },
}

impl BusinessResult {
    /// Refusal with `422 Unprocessable Entity`, the usual status for a
    /// violated rule.
    pub fn violation(message: impl Into<String>) -> Self {
        Self::Abort {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    /// Refusal with an explicit status.
    pub fn abort(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Abort {
            status,
            message: message.into(),
        }
    }

    /// Whether a rule refused the operation.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort { .. })
    }
}

impl From<BusinessResult> for PluginResult {
    fn from(result: BusinessResult) -> Self {
        match result {
            BusinessResult::Proceed => PluginResult::Continue,
            BusinessResult::Modified(resource) => PluginResult::ContinueWithResource(resource),
            BusinessResult::Abort { status, message } => PluginResult::Abort { status, message },
        }
    }
}

impl From<PluginResult> for BusinessResult {
    fn from(result: PluginResult) -> Self {
        match result {
            PluginResult::Continue | PluginResult::SkipRemaining(None) => BusinessResult::Proceed,
            PluginResult::ContinueWithResource(resource)
            | PluginResult::SkipRemaining(Some(resource)) => BusinessResult::Modified(resource),
            PluginResult::Abort { status, message } => BusinessResult::Abort { status, message },
        }
    }
}
