//! # respipe-core
//!
//! Core crate for respipe. Contains the unified error system,
//! configuration schemas, tracing setup, and the tenant context that
//! request infrastructure installs before the pipeline runs.
//!
//! This crate has **no** internal dependencies on other respipe crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod result;
pub mod tenant;

pub use error::{ErrorKind, PipelineError};
pub use result::PipelineResult;
pub use tenant::{TenantBaton, TenantId};
