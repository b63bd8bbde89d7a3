//! Registry error types

use super::identity::SourceId;

/// Error type for registry and pairing operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A required registration field is missing or empty
    #[error("{0} is required")]
    Validation(&'static str),

    /// The pairing code is already bound to a durable identity
    #[error("Connection code already in use by {existing}")]
    DuplicateCode { existing: SourceId },

    /// No durable identity is bound to the pairing code
    #[error("Invalid connection code")]
    UnknownCode,
}
