//! Compiled, Validated Transformations

use crate::schema::InputSchema;
use expression::{Program, ProgramEvalError};
use feature_model::{
    FeatureSpec, OnDemandFeatureView, Row, SourceBinding, Transform, TransformError,
    TransformationSpec,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a transformation body on one row
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BodyError {
    #[error(transparent)]
    Expression(#[from] ProgramEvalError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Executable form of a transformation body
#[derive(Clone)]
pub enum CompiledBody {
    Program(Program),
    Registered(Arc<dyn Transform>),
}

impl fmt::Debug for CompiledBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledBody::Program(p) => f.debug_tuple("Program").field(p).finish(),
            CompiledBody::Registered(t) => f
                .debug_tuple("Registered")
                .field(&format!("{}@v{}", t.name(), t.version()))
                .finish(),
        }
    }
}

impl CompiledBody {
    /// Run the body on one resolved input row
    pub fn apply(&self, row: &Row) -> Result<Row, BodyError> {
        match self {
            CompiledBody::Program(program) => Ok(program.evaluate(row)?),
            CompiledBody::Registered(transform) => Ok(transform.apply(row)?),
        }
    }
}

/// The parts of a view definition a compile depends on
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    pub features: Vec<FeatureSpec>,
    pub sources: BTreeMap<String, SourceBinding>,
    pub transformation: TransformationSpec,
}

impl ViewDefinition {
    pub fn of(view: &OnDemandFeatureView) -> Self {
        Self {
            features: view.features.clone(),
            sources: view.sources.clone(),
            transformation: view.transformation.clone(),
        }
    }

    /// Whether `view` still has this definition
    pub fn matches(&self, view: &OnDemandFeatureView) -> bool {
        self.features == view.features
            && self.sources == view.sources
            && self.transformation == view.transformation
    }
}

/// A view's transformation after successful validation.
///
/// Immutable; shared read-only across concurrent derivations.
#[derive(Debug, Clone)]
pub struct CompiledTransform {
    /// Transformation name, for diagnostics
    pub name: String,
    pub version: u32,
    /// Columns every derivation must supply
    pub inputs: InputSchema,
    /// Declared outputs, in output order
    pub outputs: Vec<FeatureSpec>,
    pub body: CompiledBody,
    /// Definition this was compiled from
    pub definition: ViewDefinition,
}

impl CompiledTransform {
    pub fn output_schema(&self) -> &[FeatureSpec] {
        &self.outputs
    }

    pub fn input_schema(&self) -> &InputSchema {
        &self.inputs
    }

    /// Whether this compile is still current for `view`
    pub fn compiled_from(&self, view: &OnDemandFeatureView) -> bool {
        self.definition.matches(view)
    }
}
