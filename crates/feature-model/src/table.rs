//! Rows and Columnar Tables

use crate::value::{Value, ValueType};
use crate::view::FeatureSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors while assembling a table
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("Column {column} has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Column {column} row {row}: value of type {actual} does not conform to {expected}")]
    NonConformingValue {
        column: String,
        row: usize,
        expected: ValueType,
        actual: ValueType,
    },
}

/// A single named row of values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A typed column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub value_type: ValueType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, value_type: ValueType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            value_type,
            values,
        }
    }
}

/// Columnar table of equal-length, typed columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    /// Build a table, checking column lengths, names and value types
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let num_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        let mut seen = std::collections::BTreeSet::new();

        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
            if column.values.len() != num_rows {
                return Err(TableError::RaggedColumn {
                    column: column.name.clone(),
                    expected: num_rows,
                    actual: column.values.len(),
                });
            }
            if let Some((row, value)) = column
                .values
                .iter()
                .enumerate()
                .find(|(_, v)| !v.conforms_to(column.value_type))
            {
                return Err(TableError::NonConformingValue {
                    column: column.name.clone(),
                    row,
                    expected: column.value_type,
                    actual: value.value_type(),
                });
            }
        }

        Ok(Self { columns, num_rows })
    }

    /// Empty table with the given schema
    pub fn empty(schema: &[FeatureSpec]) -> Self {
        Self {
            columns: schema
                .iter()
                .map(|f| Column::new(f.name.clone(), f.value_type, Vec::new()))
                .collect(),
            num_rows: 0,
        }
    }

    /// Build a table from rows, taking column order and types from `schema`.
    ///
    /// Fields missing from a row become `Null`.
    pub fn from_rows(schema: &[FeatureSpec], rows: &[Row]) -> Result<Self, TableError> {
        let columns = schema
            .iter()
            .map(|f| {
                let values = rows
                    .iter()
                    .map(|r| r.get(&f.name).cloned().unwrap_or(Value::Null))
                    .collect();
                Column::new(f.name.clone(), f.value_type, values)
            })
            .collect();
        Self::new(columns)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Schema of this table in column order
    pub fn schema(&self) -> Vec<FeatureSpec> {
        self.columns
            .iter()
            .map(|c| FeatureSpec::new(c.name.clone(), c.value_type))
            .collect()
    }

    /// Materialize row `index` (all columns)
    pub fn row(&self, index: usize) -> Option<Row> {
        if index >= self.num_rows {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.values[index].clone()))
                .collect(),
        )
    }

    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.num_rows).filter_map(move |i| self.row(i))
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}
