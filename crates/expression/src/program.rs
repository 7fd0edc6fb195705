//! Compiled Multi-Output Programs

use crate::error::{EvalError, ExprError};
use crate::parser::parse;
use crate::typed::{compile, TypedExpr};
use feature_model::{ExpressionBody, FeatureSpec, Row, ValueType};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// Compile failure attributed to one output
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Output {output}: {source}")]
pub struct ProgramError {
    pub output: String,
    #[source]
    pub source: ExprError,
}

/// Evaluation failure attributed to one output
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Output {output}: {source}")]
pub struct ProgramEvalError {
    pub output: String,
    #[source]
    pub source: EvalError,
}

#[derive(Debug, Clone)]
struct CompiledOutput {
    name: String,
    expr: TypedExpr,
    columns: BTreeSet<String>,
}

/// An expression body compiled against an input schema
#[derive(Debug, Clone)]
pub struct Program {
    outputs: Vec<CompiledOutput>,
}

impl Program {
    /// Parse and type-check every output of `body`
    pub fn compile(
        body: &ExpressionBody,
        schema: &BTreeMap<String, ValueType>,
    ) -> Result<Self, ProgramError> {
        let mut outputs = Vec::with_capacity(body.outputs.len());
        let mut seen = BTreeSet::new();

        for output in &body.outputs {
            let wrap = |source| ProgramError {
                output: output.output.clone(),
                source,
            };
            if !seen.insert(output.output.as_str()) {
                return Err(wrap(ExprError::DuplicateOutput(output.output.clone())));
            }
            let ast = parse(&output.source).map_err(wrap)?;
            let expr = compile(&ast, schema).map_err(wrap)?;
            debug!(
                "Compiled output {} as {} from {:?}",
                output.output,
                expr.value_type(),
                output.source
            );
            outputs.push(CompiledOutput {
                name: output.output.clone(),
                expr,
                columns: ast.columns(),
            });
        }

        Ok(Self { outputs })
    }

    /// Input columns referenced by any output
    pub fn input_columns(&self) -> BTreeSet<String> {
        self.outputs
            .iter()
            .flat_map(|o| o.columns.iter().cloned())
            .collect()
    }

    /// Output names and inferred types, in declaration order
    pub fn output_schema(&self) -> Vec<FeatureSpec> {
        self.outputs
            .iter()
            .map(|o| FeatureSpec::new(o.name.clone(), o.expr.value_type()))
            .collect()
    }

    /// Evaluate all outputs on one row
    pub fn evaluate(&self, row: &Row) -> Result<Row, ProgramEvalError> {
        let mut out = Row::new();
        for output in &self.outputs {
            let value = output.expr.evaluate(row).map_err(|source| ProgramEvalError {
                output: output.name.clone(),
                source,
            })?;
            out.insert(output.name.clone(), value);
        }
        Ok(out)
    }
}
