//! Schema Inference and Validation
//!
//! Resolves the merged input schema of an on-demand feature view, compiles
//! its transformation body and checks the declared outputs against what the
//! body actually produces.

mod compiled;
mod error;
mod schema;
mod validator;

pub use compiled::{BodyError, CompiledBody, CompiledTransform, ViewDefinition};
pub use error::ValidationError;
pub use schema::{InputColumn, InputSchema};
pub use validator::{ValidationConfig, Validator};
