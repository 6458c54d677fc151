//! Error types for psr-registry
//!
//! The first four variants are the registry's failure taxonomy and are always
//! surfaced to callers as-is. `Storage` covers durability-layer failures.

use psr_common::{Identity, PitchId};
use thiserror::Error;

/// Registry operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Caller is not the authorized writer
    #[error("Caller '{caller}' is not the authorized writer")]
    Unauthorized { caller: Identity },

    /// A record already exists for the identifier
    #[error("Score already recorded for pitch {0}")]
    DuplicateEntry(PitchId),

    /// Overall score fails the positivity constraint
    #[error("Overall score must be greater than zero")]
    InvalidScore,

    /// Read of an absent identifier
    #[error("No score recorded for pitch {0}")]
    NotFound(PitchId),

    /// Durability layer failed; nothing was recorded
    #[error("Storage error: {0}")]
    Storage(String),
}

impl RegistryError {
    /// Stable snake_case identifier for API clients
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Unauthorized { .. } => "unauthorized",
            RegistryError::DuplicateEntry(_) => "duplicate_entry",
            RegistryError::InvalidScore => "invalid_score",
            RegistryError::NotFound(_) => "not_found",
            RegistryError::Storage(_) => "storage",
        }
    }
}

impl From<crate::journal::JournalError> for RegistryError {
    fn from(err: crate::journal::JournalError) -> Self {
        RegistryError::Storage(err.to_string())
    }
}

/// Convenience Result type using RegistryError
pub type Result<T> = std::result::Result<T, RegistryError>;
