//! Input Resolution
//!
//! Selects the declared input columns out of a caller context, accepting
//! either bare or full feature names, and presents them under bare names.

use crate::error::EngineError;
use feature_model::{Column, Row, Table, Value, ValueType};
use schema_validator::{InputColumn, InputSchema};

/// Resolves caller contexts against a view's merged input schema
#[derive(Debug, Clone, Copy)]
pub struct InputResolver<'a> {
    schema: &'a InputSchema,
}

impl<'a> InputResolver<'a> {
    pub fn new(schema: &'a InputSchema) -> Self {
        Self { schema }
    }

    /// Resolve a single online request row
    pub fn resolve_row(&self, context: &Row) -> Result<Row, EngineError> {
        let mut resolved = Row::new();
        for input in self.schema.columns() {
            let value = input
                .lookup_names()
                .find_map(|name| context.get(name))
                .ok_or_else(|| missing(input))?;
            check_value(input, value)?;
            resolved.insert(input.name.clone(), value.clone());
        }
        Ok(resolved)
    }

    /// Resolve a batch table, keeping row order
    pub fn resolve_table(&self, context: &Table) -> Result<Table, EngineError> {
        let mut columns = Vec::with_capacity(self.schema.len());
        for input in self.schema.columns() {
            let column = input
                .lookup_names()
                .find_map(|name| context.column(name))
                .ok_or_else(|| missing(input))?;
            // An untyped all-null column stands in for entities the store lacks
            if column.value_type != input.value_type && column.value_type != ValueType::Null {
                return Err(EngineError::TypeMismatch {
                    column: input.name.clone(),
                    expected: input.value_type,
                    actual: column.value_type,
                });
            }
            columns.push(Column::new(
                input.name.clone(),
                input.value_type,
                column.values.clone(),
            ));
        }
        Ok(Table::new(columns)?)
    }

    /// Resolve a batch supplied row by row into a table with bare names
    pub fn resolve_rows(&self, rows: &[Row]) -> Result<Table, EngineError> {
        let resolved = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                self.resolve_row(row).map_err(|e| EngineError::BatchExecution {
                    row: index,
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table::from_rows(&self.schema.to_feature_specs(), &resolved)?)
    }
}

fn missing(input: &InputColumn) -> EngineError {
    EngineError::MissingInput {
        column: input.name.clone(),
        source_name: input.source_name.clone(),
    }
}

fn check_value(input: &InputColumn, value: &Value) -> Result<(), EngineError> {
    if value.conforms_to(input.value_type) {
        return Ok(());
    }
    Err(EngineError::TypeMismatch {
        column: input.name.clone(),
        expected: input.value_type,
        actual: value.value_type(),
    })
}
