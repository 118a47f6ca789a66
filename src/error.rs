//! Typed errors for calls that cross an external boundary.
//!
//! Everything inside the crate reports failures through `anyhow`; the
//! embedding provider and the agent matcher are the exceptions, because the
//! retry layer has to tell transient failures apart from permanent ones.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
        transient: bool,
    },

    #[error("{operation} task aborted: {message}")]
    Join {
        operation: &'static str,
        message: String,
    },
}

impl ExternalError {
    pub fn failed(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Failed {
            operation,
            message: err.to_string(),
            transient: true,
        }
    }

    pub fn permanent(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Failed {
            operation,
            message: err.to_string(),
            transient: false,
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Failed { transient, .. } => *transient,
            Self::Join { .. } => false,
        }
    }
}
