use thiserror::Error;

use crate::pcf::{Command, ParseError};

/// Failure reported by an [`crate::dispatch::AdminChannel`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("submitting command: {reason}")]
    Submit { reason: String },

    #[error("receiving reply: {reason}")]
    Receive { reason: String },

    #[error("channel closed")]
    Closed,
}

/// Errors returned by collection operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    #[error("{command}: {source}")]
    Transport {
        command: Command,
        source: TransportError,
    },

    #[error("{command}: malformed reply: {source}")]
    Protocol { command: Command, source: ParseError },

    #[error("configuration: {0}")]
    Configuration(String),
}

impl CollectError {
    pub(crate) fn not_initialized() -> Self {
        Self::Configuration("attribute registry used before initialization".to_string())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Protocol { .. } => "protocol",
            Self::Configuration(_) => "configuration",
        }
    }
}
