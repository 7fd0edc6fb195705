//! Registry Error Types

use schema_validator::ValidationError;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("On-demand feature view {name} not found in project {project}")]
    NotFound { name: String, project: String },

    /// Record or transformation body could not be decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Backing store failure
    #[error("Storage error: {0}")]
    StorageError(String),
}
