//! # respipe-plugin
//!
//! Plugin orchestration around resource operations. Provides:
//!
//! - The [`Plugin`] contract with BEFORE / AFTER / ON_ERROR hooks
//! - Priority-ordered matching by resource type and operation
//! - Veto and resource rewriting from BEFORE, side effects from AFTER
//! - Fire-and-forget async-mode hooks on a bounded background pool with
//!   tenant propagation
//! - Capability adapters (authentication, authorization, cache, business
//!   rules, performance)

pub mod business;
pub mod capabilities;
pub mod context;
pub mod descriptor;
mod guard;
pub mod macros;
pub mod operation;
pub mod orchestrator;
pub mod plugin;
pub mod prelude;
pub mod registry;
pub mod result;
pub mod worker;

pub use business::{BusinessContext, BusinessPhase, BusinessResult};
pub use context::{PluginContext, Resource};
pub use descriptor::{OperationDescriptor, OperationKind};
pub use operation::{OperationError, OperationResult};
pub use orchestrator::{Phase, PluginOrchestrator};
pub use plugin::{Capability, ExecutionMode, Plugin, PluginError, PluginInfo};
pub use registry::PluginRegistry;
pub use result::PluginResult;
pub use worker::BackgroundPool;
