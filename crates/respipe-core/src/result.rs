//! Convenience result type alias for respipe.

use crate::error::PipelineError;

/// A specialized `Result` type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
