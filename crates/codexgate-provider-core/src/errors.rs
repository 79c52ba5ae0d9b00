use std::error::Error;
use std::fmt;

use crate::provider::{UpstreamFailure, UpstreamTransportErrorKind};

#[derive(Debug, Clone)]
pub enum ProviderError {
    Unsupported(&'static str),
    InvalidConfig(String),
    MissingCredentialField(&'static str),
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Unsupported(what) => write!(f, "unsupported: {what}"),
            ProviderError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            ProviderError::MissingCredentialField(field) => {
                write!(f, "missing credential field: {field}")
            }
            ProviderError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for ProviderError {}

/// Errors that end a dispatched call. Every other failure degrades instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The credential cannot be used or refreshed; the user has to log in again.
    AuthExpired { reason: String },
    /// No HTTP response was received. Never retried locally.
    NetworkFailure {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
}

impl DispatchError {
    pub fn auth_expired(reason: impl Into<String>) -> Self {
        DispatchError::AuthExpired {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::AuthExpired { reason } => write!(f, "authentication expired: {reason}"),
            DispatchError::NetworkFailure { kind, message } => {
                write!(f, "network failure ({kind:?}): {message}")
            }
        }
    }
}

impl Error for DispatchError {}

impl From<UpstreamFailure> for DispatchError {
    fn from(failure: UpstreamFailure) -> Self {
        DispatchError::NetworkFailure {
            kind: failure.kind,
            message: failure.message,
        }
    }
}
