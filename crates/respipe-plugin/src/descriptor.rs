//! Operation kinds and the descriptors plugins use to declare what they
//! apply to.

use serde::{Deserialize, Serialize};

/// Kind of resource operation being executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create a new resource.
    Create,
    /// Read the current version of a resource.
    Read,
    /// Read a specific version of a resource.
    Vread,
    /// Replace a resource.
    Update,
    /// Partially modify a resource.
    Patch,
    /// Delete a resource.
    Delete,
    /// Search resources of a type.
    Search,
    /// Read the version history of a resource.
    History,
    /// A named custom operation (e.g. `$validate`).
    Extended(String),
}

impl OperationKind {
    /// Returns the string name of this operation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Vread => "vread",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Search => "search",
            Self::History => "history",
            Self::Extended(name) => name,
        }
    }

    /// Whether this operation changes stored state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::Patch | Self::Delete
        )
    }

    /// Whether this operation only reads stored state.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::Read | Self::Vread | Self::Search | Self::History
        )
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Matches the resource type used to select every type.
pub const ANY_RESOURCE_TYPE: &str = "*";

/// Selects the (resource type, operation) combinations a plugin applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationDescriptor {
    /// Matches every operation on every resource type.
    All,
    /// Matches one operation on one resource type, or on every type when
    /// the resource type is [`ANY_RESOURCE_TYPE`].
    Specific {
        /// Resource type name, e.g. `"Patient"`.
        resource_type: String,
        /// Operation kind.
        operation: OperationKind,
    },
}

impl OperationDescriptor {
    /// Descriptor matching everything.
    pub fn all() -> Self {
        Self::All
    }

    /// Descriptor for one operation on one resource type.
    pub fn new(resource_type: impl Into<String>, operation: OperationKind) -> Self {
        Self::Specific {
            resource_type: resource_type.into(),
            operation,
        }
    }

    /// Descriptor for one operation on every resource type.
    pub fn any_type(operation: OperationKind) -> Self {
        Self::new(ANY_RESOURCE_TYPE, operation)
    }

    /// Returns whether this descriptor selects the given combination.
    pub fn matches(&self, resource_type: &str, operation: &OperationKind) -> bool {
        match self {
            Self::All => true,
            Self::Specific {
                resource_type: rt,
                operation: op,
            } => op == operation && (rt == ANY_RESOURCE_TYPE || rt == resource_type),
        }
    }
}
