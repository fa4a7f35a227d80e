//! Error taxonomy for the pipeline.
//!
//! Conditional-check failures on the store are control-flow outcomes
//! ([`crate::ports::InsertOutcome`], [`crate::ports::LockOutcome`]), never
//! errors. Only transport and service failures surface here.

use thiserror::Error;

/// Store transport or service failure. Conditional-check failures are not
/// represented here.
#[derive(Debug, Clone, Error)]
#[error("store request failed: {0}")]
pub struct StoreError(pub String);

/// Downstream worker invocation failure.
#[derive(Debug, Clone, Error)]
#[error("worker invocation failed: {0}")]
pub struct InvokeError(pub String);

/// Per-item handler failure.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Malformed envelope or attribute. Terminal for the offending item:
    /// logged, counted, never retried, never batch-fatal.
    #[error("malformed input: {0}")]
    Decode(String),

    /// Structurally valid input with the wrong cardinality or missing
    /// fields. Same propagation rules as [`PipelineError::Decode`].
    #[error("unexpected record shape: {0}")]
    Shape(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl PipelineError {
    /// Rejections are item-local validation failures; they must never fail a
    /// batch, while store and invoke failures may, per handler policy.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Shape(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_decode_and_shape_only() {
        assert!(PipelineError::Decode("bad json".into()).is_rejection());
        assert!(PipelineError::Shape("two records".into()).is_rejection());
        assert!(!PipelineError::from(StoreError("timeout".into())).is_rejection());
        assert!(!PipelineError::from(InvokeError("throttled".into())).is_rejection());
    }
}
