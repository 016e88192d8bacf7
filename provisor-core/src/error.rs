use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configuration was rejected.
///
/// Carries the warnings collected along the way, and the single problem that
/// blocks the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(default)]
    pub warnings: Vec<String>,
    pub error: String,
}

impl ValidationError {
    pub fn new(error: impl Into<String>) -> Self {
        ValidationError {
            warnings: Vec::new(),
            error: error.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if !self.warnings.is_empty() {
            write!(f, " (warnings: {})", self.warnings.join("; "))?;
        }
        Ok(())
    }
}

/// A failure reported by provider logic, e.g. a cloud API refusing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        ProviderError {
            message: message.into(),
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// The connection to a remote provider failed, or a message could not be
/// encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors of the provider contract.
///
/// These are values: a remote provider's errors are sent over the wire in
/// this form and come out unchanged on the other side. Only `Transport` is
/// produced by the bridge itself.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Error {
    #[error("{0}")]
    Validation(ValidationError),
    #[error("{0}")]
    Provider(ProviderError),
    #[error("transport error: {0}")]
    Transport(TransportError),
    #[error("no provider registered under the name {name:?}")]
    NotFound { name: String },
    #[error("a provider is already registered under the name {name:?}")]
    NameConflict { name: String },
    #[error("invalid provider {name:?}: {reason}")]
    InvalidProvider { name: String, reason: String },
}

impl Error {
    pub fn provider(message: impl Into<String>) -> Self {
        Error::Provider(ProviderError::new(message))
    }

    pub fn validation(error: impl Into<String>) -> Self {
        Error::Validation(ValidationError::new(error))
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport(TransportError::new(message))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
