//! Derivation Error Types

use feature_model::{TableError, ValueType};
use schema_validator::{BodyError, ValidationError};
use thiserror::Error;

/// Errors raised while resolving inputs or executing a transformation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The view failed validation when it was compiled
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A declared input column is absent from the caller's context
    #[error("Missing input column {column} from source {source_name}")]
    MissingInput { column: String, source_name: String },

    /// Request-time fields absent from the caller's rows
    #[error("Required request data {} missing from entity rows", .columns.join(", "))]
    MissingRequestData { columns: Vec<String> },

    /// A present input column disagrees with its declared type
    #[error("Input column {column} expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// The transformation failed on one row of a batch
    #[error("Batch row {row} failed: {source}")]
    BatchExecution {
        row: usize,
        source: Box<EngineError>,
    },

    /// A produced value does not match the validated output schema
    #[error("Output {feature} expected {expected}, got {actual}")]
    OutputType {
        feature: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Output {0} was not produced by the transformation")]
    MissingOutput(String),

    #[error("Transformation failed: {0}")]
    Transform(#[from] BodyError),

    #[error("Batch of {rows} rows exceeds limit of {limit}")]
    BatchTooLarge { rows: usize, limit: usize },

    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

impl EngineError {
    /// Innermost error, looking through batch row wrappers
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::BatchExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
