//! Transformation Definitions and Registered Transforms

use crate::table::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a registered transform while processing a row
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Transform {transform} failed: {message}")]
pub struct TransformError {
    pub transform: String,
    pub message: String,
}

impl TransformError {
    pub fn new(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            transform: transform.into(),
            message: message.into(),
        }
    }
}

/// One output of an expression body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputExpr {
    /// Output feature name
    pub output: String,
    /// Expression source text
    pub source: String,
}

/// Transformation written in the portable expression language
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionBody {
    pub outputs: Vec<OutputExpr>,
}

impl ExpressionBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output (builder style)
    pub fn with_output(mut self, output: impl Into<String>, source: impl Into<String>) -> Self {
        self.outputs.push(OutputExpr {
            output: output.into(),
            source: source.into(),
        });
        self
    }
}

/// Reference to a statically registered transform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformRef {
    pub name: String,
    pub version: u32,
}

impl fmt::Display for TransformRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}

/// Executable body of a transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformBody {
    Expression(ExpressionBody),
    Registered(TransformRef),
}

/// Named, versioned transformation of an on-demand feature view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationSpec {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub body: TransformBody,
}

fn default_version() -> u32 {
    1
}

impl TransformationSpec {
    pub fn expression(name: impl Into<String>, body: ExpressionBody) -> Self {
        Self {
            name: name.into(),
            version: 1,
            body: TransformBody::Expression(body),
        }
    }

    pub fn registered(name: impl Into<String>, transform: TransformRef) -> Self {
        Self {
            name: name.into(),
            version: transform.version,
            body: TransformBody::Registered(transform),
        }
    }
}

/// A statically registered row transform.
///
/// Implementations must be pure: the output may depend only on `inputs`.
/// The same call serves batch and online derivation.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> u32 {
        1
    }

    /// Input columns the transform reads
    fn inputs(&self) -> Vec<String>;

    /// Derive the output features of one row
    fn apply(&self, inputs: &Row) -> Result<Row, TransformError>;
}

/// Registry of statically linked transforms, keyed by name and version
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<TransformRef, Arc<dyn Transform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform, replacing any previous one with the same name and version
    pub fn register(&mut self, transform: Arc<dyn Transform>) {
        let key = TransformRef {
            name: transform.name().to_string(),
            version: transform.version(),
        };
        self.transforms.insert(key, transform);
    }

    pub fn with(mut self, transform: Arc<dyn Transform>) -> Self {
        self.register(transform);
        self
    }

    pub fn get(&self, reference: &TransformRef) -> Option<Arc<dyn Transform>> {
        self.transforms.get(reference).cloned()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}
