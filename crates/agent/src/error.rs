//! Request-fatal errors of the orchestration loop.

use thiserror::Error;
use wayfarer_core::ProviderError;

/// Why a run ended without a final answer.
///
/// Localized action failures never show up here; they are fed back to the
/// reasoning step as error payloads.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("reasoning retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ProviderError },

    #[error("reasoning call rejected: {0}")]
    ReasoningRejected(ProviderError),

    #[error("round-trip limit of {limit} exceeded")]
    RoundTripLimitExceeded { limit: u32 },

    #[error("run cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RunError {
    /// Machine-readable reason carried by the `failed` event.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RetriesExhausted { .. } => "retries exhausted",
            Self::ReasoningRejected(_) => "reasoning call rejected",
            Self::RoundTripLimitExceeded { .. } => "round-trip limit exceeded",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_stable() {
        let transient = ProviderError::Network("reset".into());
        assert_eq!(
            RunError::RetriesExhausted {
                attempts: 3,
                last: transient.clone()
            }
            .reason(),
            "retries exhausted"
        );
        assert_eq!(RunError::ReasoningRejected(transient).reason(), "reasoning call rejected");
        assert_eq!(
            RunError::RoundTripLimitExceeded { limit: 2 }.reason(),
            "round-trip limit exceeded"
        );
        assert_eq!(RunError::Cancelled.reason(), "cancelled");
        assert_eq!(RunError::Internal("x".into()).reason(), "internal error");
    }

    #[test]
    fn display_includes_cause() {
        let err = RunError::RetriesExhausted {
            attempts: 3,
            last: ProviderError::ApiError {
                status_code: 503,
                message: "overloaded".into(),
            },
        };
        assert!(err.to_string().contains("503"));
    }
}
