//! Error types shared across the workspace: local validation failures and
//! failures surfaced by the external collaborators.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid length for {kind}: expected {expected}, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("empty {0}")]
    EmptyId(&'static str),
    #[error("not an ipfs content address: {0}")]
    InvalidContentAddress(String),
    #[error("malformed {entity} row: {message}")]
    MalformedRow {
        entity: &'static str,
        message: String,
    },
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// Which external collaborator produced a failure. Errors are tagged so a
/// support ticket can name the failing service without guesswork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Auth,
    Directory,
    Wallet,
    ContentStore,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collaborator::Auth => "auth",
            Collaborator::Directory => "directory",
            Collaborator::Wallet => "wallet",
            Collaborator::ContentStore => "content store",
        };
        f.write_str(name)
    }
}

/// Error model for collaborator calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{collaborator} request timed out")]
    Timeout { collaborator: Collaborator },
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: Collaborator,
        message: String,
    },
    #[error("{collaborator} rejected request: {message}")]
    Rejected {
        collaborator: Collaborator,
        message: String,
    },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("an account already exists for {0}")]
    DuplicateEmail(String),
    #[error(transparent)]
    Malformed(#[from] ValidationError),
}

impl ServiceError {
    pub fn unavailable(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            message: message.into(),
        }
    }

    pub fn rejected(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::Rejected {
            collaborator,
            message: message.into(),
        }
    }

    pub fn collaborator(&self) -> Option<Collaborator> {
        match self {
            Self::Timeout { collaborator }
            | Self::Unavailable { collaborator, .. }
            | Self::Rejected { collaborator, .. } => Some(*collaborator),
            Self::InvalidCredentials | Self::DuplicateEmail(_) => Some(Collaborator::Auth),
            Self::Malformed(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{Collaborator, ServiceError};

    #[test]
    fn retryable_classification() {
        assert!(ServiceError::Timeout {
            collaborator: Collaborator::Wallet
        }
        .is_retryable());
        assert!(ServiceError::unavailable(Collaborator::Directory, "down").is_retryable());
        assert!(!ServiceError::rejected(Collaborator::Wallet, "bad tx").is_retryable());
        assert!(!ServiceError::InvalidCredentials.is_retryable());
    }

    #[test]
    fn auth_specific_errors_tag_auth() {
        assert_eq!(
            ServiceError::InvalidCredentials.collaborator(),
            Some(Collaborator::Auth)
        );
        assert_eq!(
            ServiceError::DuplicateEmail("a@b.cm".into()).collaborator(),
            Some(Collaborator::Auth)
        );
    }
}
