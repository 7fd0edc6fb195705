//! Derivation Endpoint

use crate::{ServerError, SharedState};
use axum::{
    extract::{Path, State},
    Json,
};
use derivation_engine::{
    DerivationInput, DerivationOutput, EngineError, ExecutionMode, InputResolver,
};
use feature_model::{OnDemandFeatureView, Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller row; a JSON `null` is a missing feature value
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct RequestRow(BTreeMap<String, Option<Value>>);

impl From<RequestRow> for Row {
    fn from(row: RequestRow) -> Self {
        row.0
            .into_iter()
            .map(|(name, value)| (name, value.unwrap_or(Value::Null)))
            .collect()
    }
}

/// Derive request: one `row` online, or `rows` as a batch
#[derive(Debug, Deserialize)]
pub struct DeriveRequest {
    pub mode: ExecutionMode,
    #[serde(default)]
    pub row: Option<RequestRow>,
    #[serde(default)]
    pub rows: Option<Vec<RequestRow>>,
    /// Overrides the server default
    #[serde(default)]
    pub full_feature_names: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DeriveResponse {
    pub mode: ExecutionMode,
    /// Output column names, in declared order
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
}

pub async fn derive(
    State(state): State<SharedState>,
    Path((project, name)): Path<(String, String)>,
    Json(request): Json<DeriveRequest>,
) -> Result<Json<DeriveResponse>, ServerError> {
    let state = state.read().await;
    let view = state.registry.load(&name, &project)?;
    let full = request
        .full_feature_names
        .unwrap_or(state.config.full_feature_names);

    let output = match request.mode {
        ExecutionMode::Online => {
            let row: Row = request
                .row
                .ok_or_else(|| {
                    ServerError::BadRequest("online derivation requires `row`".to_string())
                })?
                .into();
            state.engine.derive(&view, DerivationInput::Online(&row))?
        }
        ExecutionMode::Batch => {
            let rows = request.rows.ok_or_else(|| {
                ServerError::BadRequest("batch derivation requires `rows`".to_string())
            })?;
            let limit = state.engine.config().max_batch_rows;
            if rows.len() > limit {
                return Err(EngineError::BatchTooLarge {
                    rows: rows.len(),
                    limit,
                }
                .into());
            }
            let rows: Vec<Row> = rows.into_iter().map(Row::from).collect();
            let compiled = state.engine.compile(&view)?;
            let table = InputResolver::new(compiled.input_schema()).resolve_rows(&rows)?;
            state.engine.derive(&view, DerivationInput::Batch(&table))?
        }
    };

    let columns = view
        .features
        .iter()
        .map(|f| view.output_column_name(&f.name, full))
        .collect();
    let response = match output {
        DerivationOutput::Online(row) => DeriveResponse {
            mode: ExecutionMode::Online,
            columns,
            row: Some(rename(&view, row, full)),
            rows: None,
        },
        DerivationOutput::Batch(table) => DeriveResponse {
            mode: ExecutionMode::Batch,
            columns,
            row: None,
            rows: Some(table.rows().map(|r| rename(&view, r, full)).collect()),
        },
    };
    Ok(Json(response))
}

fn rename(view: &OnDemandFeatureView, row: Row, full_feature_names: bool) -> Row {
    row.iter()
        .map(|(name, value)| (view.output_column_name(name, full_feature_names), value.clone()))
        .collect()
}
