// Crate-wide error type for the AI processing core

use thiserror::Error;

/// Errors produced by the AI core, grouped by how they are handled:
/// configuration errors surface to the caller, provider and capability
/// errors participate in load-balancer failover, data errors are terminal
/// task-item failures, and cancellation unwinds silently.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("model '{model}' does not support {capability}")]
    CapabilityMismatch {
        model: String,
        capability: &'static str,
    },

    #[error("data error: {0}")]
    Data(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("operation cancelled")]
    Cancelled,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the load balancer should move on to the next provider after
    /// seeing this error. Cancellation aborts the sequence; everything else
    /// is retriable on another provider.
    pub fn is_failover_candidate(&self) -> bool {
        !matches!(self, CoreError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_mismatch_message() {
        let err = CoreError::CapabilityMismatch {
            model: "clip-vit".to_string(),
            capability: "chat completion",
        };
        assert_eq!(
            err.to_string(),
            "model 'clip-vit' does not support chat completion"
        );
    }

    #[test]
    fn test_cancellation_is_not_retried() {
        assert!(!CoreError::Cancelled.is_failover_candidate());
        assert!(CoreError::Provider("timeout".into()).is_failover_candidate());
    }
}
