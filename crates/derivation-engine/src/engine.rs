//! Derivation Engine
//!
//! Batch and online derivation share one per-row path: the resolver selects
//! the inputs, the compiled body runs on each row, and the outputs are checked
//! against the validated schema. Batch results are therefore row-for-row
//! identical to online results.

use crate::cache::TransformCache;
use crate::error::EngineError;
use crate::resolver::InputResolver;
use feature_model::{Column, FeatureSpec, OnDemandFeatureView, Row, Table, Value};
use schema_validator::{CompiledTransform, Validator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest batch accepted in one call
    pub max_batch_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_rows: 1_000_000,
        }
    }
}

/// Execution shape of a derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Historical retrieval over many joined rows
    Batch,
    /// A single low-latency request
    Online,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Batch => "batch",
            ExecutionMode::Online => "online",
        }
    }
}

/// Caller context for one derivation
#[derive(Debug, Clone, Copy)]
pub enum DerivationInput<'a> {
    Batch(&'a Table),
    Online(&'a Row),
}

impl DerivationInput<'_> {
    pub fn mode(&self) -> ExecutionMode {
        match self {
            DerivationInput::Batch(_) => ExecutionMode::Batch,
            DerivationInput::Online(_) => ExecutionMode::Online,
        }
    }
}

/// Derived feature values, shaped like the input
#[derive(Debug, Clone, PartialEq)]
pub enum DerivationOutput {
    Batch(Table),
    Online(Row),
}

impl DerivationOutput {
    pub fn into_table(self) -> Option<Table> {
        match self {
            DerivationOutput::Batch(table) => Some(table),
            DerivationOutput::Online(_) => None,
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            DerivationOutput::Online(row) => Some(row),
            DerivationOutput::Batch(_) => None,
        }
    }
}

/// Executes on-demand feature views
#[derive(Debug, Clone)]
pub struct DerivationEngine {
    config: EngineConfig,
    validator: Validator,
    cache: Arc<TransformCache>,
}

impl DerivationEngine {
    pub fn new(config: EngineConfig, validator: Validator, cache: Arc<TransformCache>) -> Self {
        Self {
            config,
            validator,
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn cache(&self) -> &Arc<TransformCache> {
        &self.cache
    }

    /// Validated, cached compile of `view`
    pub fn compile(&self, view: &OnDemandFeatureView) -> Result<Arc<CompiledTransform>, EngineError> {
        Ok(self
            .cache
            .get_or_compile(view, |v| self.validator.validate(v))?)
    }

    /// Declared output schema of a validated view
    pub fn output_schema(&self, view: &OnDemandFeatureView) -> Result<Vec<FeatureSpec>, EngineError> {
        Ok(self.compile(view)?.output_schema().to_vec())
    }

    /// Drop the cached compile of a view after it changed
    pub fn invalidate(&self, project: &str, name: &str) {
        self.cache.invalidate(project, name);
    }

    /// Derive the view's features for a batch or online context
    pub fn derive(
        &self,
        view: &OnDemandFeatureView,
        input: DerivationInput<'_>,
    ) -> Result<DerivationOutput, EngineError> {
        let mode = input.mode();
        let start = Instant::now();

        let result = match input {
            DerivationInput::Batch(table) => self.derive_batch(view, table).map(DerivationOutput::Batch),
            DerivationInput::Online(row) => self.derive_online(view, row).map(DerivationOutput::Online),
        };

        metrics::histogram!("odfv_derive_latency_us", "mode" => mode.as_str())
            .record(start.elapsed().as_micros() as f64);
        if let Err(e) = &result {
            metrics::counter!("odfv_derive_errors_total", "mode" => mode.as_str()).increment(1);
            warn!("Derivation of {}/{} failed: {}", view.project, view.name, e);
        }
        result
    }

    /// Derive one output row per input row, in input order
    pub fn derive_batch(&self, view: &OnDemandFeatureView, table: &Table) -> Result<Table, EngineError> {
        if table.num_rows() > self.config.max_batch_rows {
            return Err(EngineError::BatchTooLarge {
                rows: table.num_rows(),
                limit: self.config.max_batch_rows,
            });
        }

        let compiled = self.compile(view)?;
        check_request_data(view, |name| table.column(name).is_some())?;
        let resolved = InputResolver::new(compiled.input_schema()).resolve_table(table)?;
        debug!(
            "Deriving {}/{} over {} rows",
            view.project,
            view.name,
            resolved.num_rows()
        );

        let mut values: Vec<Vec<_>> = compiled
            .outputs
            .iter()
            .map(|_| Vec::with_capacity(resolved.num_rows()))
            .collect();

        for (index, row) in resolved.rows().enumerate() {
            let derived = derive_row(&compiled, &row).map_err(|e| EngineError::BatchExecution {
                row: index,
                source: Box::new(e),
            })?;
            for (column, value) in values.iter_mut().zip(derived) {
                column.push(value);
            }
        }

        let columns = compiled
            .outputs
            .iter()
            .zip(values)
            .map(|(feature, values)| Column::new(feature.name.clone(), feature.value_type, values))
            .collect();
        let output = Table::new(columns)?;

        metrics::counter!("odfv_rows_derived_total", "mode" => "batch")
            .increment(output.num_rows() as u64);
        Ok(output)
    }

    /// Derive a single output row
    pub fn derive_online(&self, view: &OnDemandFeatureView, context: &Row) -> Result<Row, EngineError> {
        let compiled = self.compile(view)?;
        check_request_data(view, |name| context.get(name).is_some())?;
        let resolved = InputResolver::new(compiled.input_schema()).resolve_row(context)?;
        let derived = derive_row(&compiled, &resolved)?;

        metrics::counter!("odfv_rows_derived_total", "mode" => "online").increment(1);
        Ok(compiled
            .outputs
            .iter()
            .map(|f| f.name.clone())
            .zip(derived)
            .collect())
    }
}

impl Default for DerivationEngine {
    fn default() -> Self {
        Self::new(
            EngineConfig::default(),
            Validator::default(),
            Arc::new(TransformCache::new()),
        )
    }
}

/// Fail with every request field the caller did not supply
fn check_request_data<F>(view: &OnDemandFeatureView, present: F) -> Result<(), EngineError>
where
    F: Fn(&str) -> bool,
{
    let columns: Vec<String> = view
        .request_data_schema()
        .into_keys()
        .filter(|name| !present(name))
        .collect();
    if columns.is_empty() {
        Ok(())
    } else {
        Err(EngineError::MissingRequestData { columns })
    }
}

/// Run the body on one resolved row and return the declared outputs in order
fn derive_row(
    compiled: &CompiledTransform,
    row: &Row,
) -> Result<Vec<Value>, EngineError> {
    let mut produced = compiled.body.apply(row)?;

    compiled
        .outputs
        .iter()
        .map(|feature| {
            let value = produced
                .remove(&feature.name)
                .ok_or_else(|| EngineError::MissingOutput(feature.name.clone()))?;
            if !value.conforms_to(feature.value_type) {
                return Err(EngineError::OutputType {
                    feature: feature.name.clone(),
                    expected: feature.value_type,
                    actual: value.value_type(),
                });
            }
            Ok(value)
        })
        .collect()
}
