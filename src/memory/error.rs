//! Memory subsystem error handling
//!
//! Helpers that turn driver-side and lookup failures into [`EngineError`]s
//! and report coding errors through the log before handing them back.

use crate::error::{EngineError, EngineResult};

/// Type alias for memory operation results
pub type MemoryResult<T> = EngineResult<T>;

/// Helper trait for memory error contexts
pub trait MemoryErrorContext<T> {
    fn memory_context(self, context: &str) -> MemoryResult<T>;
}

impl<T, E> MemoryErrorContext<T> for Result<T, E>
where
    E: Into<EngineError>,
{
    fn memory_context(self, context: &str) -> MemoryResult<T> {
        self.map_err(|e| {
            let err = e.into();
            log::debug!("[memory] {}: {}", context, err);
            err
        })
    }
}

impl<T> MemoryErrorContext<T> for Option<T> {
    fn memory_context(self, context: &str) -> MemoryResult<T> {
        self.ok_or_else(|| EngineError::ResourceNotFound {
            resource_type: "buffer resource".to_string(),
            id: context.to_string(),
        })
    }
}

/// Report a coding error and return it
///
/// Coding errors never abort the caller's frame; they are logged here and the
/// offending call becomes a no-op.
pub fn coding_error(err: EngineError) -> EngineError {
    log::error!("[memory] coding error: {}", err);
    err
}

/// Create an invalid range error
pub fn invalid_range_error(context: impl std::fmt::Display) -> EngineError {
    coding_error(EngineError::InvalidRange {
        context: context.to_string(),
    })
}

/// Create an invalid source error
pub fn invalid_source_error(name: &str) -> EngineError {
    coding_error(EngineError::InvalidSource {
        name: name.to_string(),
    })
}
