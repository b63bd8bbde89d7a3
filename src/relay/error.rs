//! Relay error types

use crate::registry::SourceId;

/// Error type for relay operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The requested source has no live connection
    #[error("Computer is not connected")]
    SourceUnavailable(SourceId),
}
