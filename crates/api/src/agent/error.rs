//! Agent loop failures.

use thiserror::Error;

use crate::claude::ClaudeError;
use crate::db::RepositoryError;

use super::retry::RetryError;
use super::state::InvalidTransition;

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Authentication,
    Generic,
}

/// Errors that end a conversation turn.
///
/// The `Display` text is safe to show to a shopper.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Service temporarily unavailable due to rate limits. Please try again in a minute.")]
    RateLimited { attempts: u32 },

    #[error("Authentication failed. Please check your API configuration.")]
    Unauthenticated,

    #[error("Agent failed: no final answer within {limit} steps")]
    TurnBudgetExceeded { limit: usize },

    #[error("Agent failed: {0}")]
    Model(ClaudeError),

    #[error("Agent failed: {0}")]
    Store(#[from] RepositoryError),

    #[error("Agent failed: {0}")]
    InvalidTransition(#[from] InvalidTransition),
}

impl AgentError {
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Unauthenticated => FailureKind::Authentication,
            _ => FailureKind::Generic,
        }
    }
}

impl From<RetryError<ClaudeError>> for AgentError {
    fn from(err: RetryError<ClaudeError>) -> Self {
        match err {
            RetryError::MaxRetriesExceeded { attempts, .. } => Self::RateLimited { attempts },
            RetryError::Operation(ClaudeError::Unauthorized(_)) => Self::Unauthenticated,
            RetryError::Operation(ClaudeError::RateLimited(_)) => Self::RateLimited { attempts: 1 },
            RetryError::Operation(other) => Self::Model(other),
        }
    }
}
