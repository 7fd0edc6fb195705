//! Validation Error Types

use expression::ProgramError;
use feature_model::ValueType;
use thiserror::Error;

/// Errors raised while registering an on-demand feature view
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// View name or project is empty
    #[error("Invalid view identity: {0}")]
    InvalidName(String),

    /// No sources declared
    #[error("View {0} declares no sources")]
    NoSources(String),

    /// A source contributes no columns
    #[error("Source {0} contributes no columns")]
    EmptySource(String),

    /// No output features declared
    #[error("View {0} declares no output features")]
    EmptyOutputSchema(String),

    #[error("Duplicate output feature: {0}")]
    DuplicateFeature(String),

    #[error("Feature {feature} has unsupported value type {value_type}")]
    UnsupportedValueType {
        feature: String,
        value_type: ValueType,
    },

    /// Two sources contribute the same column with different types
    #[error("Input column {column} declared as {first} and {second}")]
    ConflictingInput {
        column: String,
        first: ValueType,
        second: ValueType,
    },

    /// Two sources provide a column under one name and one of them has no
    /// full feature name to tell them apart
    #[error("Input column {column} from source {source_alias} collides with another source")]
    AmbiguousInput {
        column: String,
        source_alias: String,
    },

    /// The transformation reads a bare name several sources provide
    #[error("Input {input} is provided by several sources; use one of {}", .candidates.join(", "))]
    AmbiguousReference {
        input: String,
        candidates: Vec<String>,
    },

    /// The transformation reads a column no source provides
    #[error("Transformation input {input} is not provided by any source")]
    UnsatisfiedInput { input: String },

    #[error("Output {feature} declared as {declared} but transformation produces {inferred}")]
    OutputTypeMismatch {
        feature: String,
        declared: ValueType,
        inferred: ValueType,
    },

    /// Declared output the transformation does not produce
    #[error("Declared output {0} is not produced by the transformation")]
    MissingOutput(String),

    /// Produced output that was never declared
    #[error("Transformation produces undeclared output {0}")]
    UndeclaredOutput(String),

    #[error("Invalid transformation expression: {0}")]
    Expression(#[from] ProgramError),

    #[error("Transform {0} is not registered")]
    UnknownTransform(String),

    /// Registered transform failed on a sample row
    #[error("Transform {transform} failed on sample input: {message}")]
    ProbeFailed { transform: String, message: String },
}
