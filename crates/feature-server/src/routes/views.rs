//! On-Demand Feature View Registry Endpoints

use crate::{ServerError, SharedState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use feature_model::{FeatureSpec, OnDemandFeatureView};
use serde::Serialize;

/// Output schema of a view
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub features: Vec<FeatureSpec>,
    /// Output column names with the view prefix
    pub full_feature_names: Vec<String>,
}

pub async fn list_views(
    State(state): State<SharedState>,
    Path(project): Path<String>,
) -> Result<Json<Vec<OnDemandFeatureView>>, ServerError> {
    let state = state.read().await;
    Ok(Json(state.registry.list(&project)?))
}

pub async fn get_view(
    State(state): State<SharedState>,
    Path((project, name)): Path<(String, String)>,
) -> Result<Json<OnDemandFeatureView>, ServerError> {
    let state = state.read().await;
    Ok(Json(state.registry.load(&name, &project)?))
}

/// Create or replace a view
pub async fn apply_view(
    State(state): State<SharedState>,
    Path((project, name)): Path<(String, String)>,
    Json(view): Json<OnDemandFeatureView>,
) -> Result<Json<OnDemandFeatureView>, ServerError> {
    if view.name != name || view.project != project {
        return Err(ServerError::BadRequest(format!(
            "body defines {}/{} but path is {}/{}",
            view.project, view.name, project, name
        )));
    }
    let state = state.write().await;
    Ok(Json(state.registry.save(view)?))
}

pub async fn delete_view(
    State(state): State<SharedState>,
    Path((project, name)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    let state = state.write().await;
    state.registry.delete(&name, &project)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_schema(
    State(state): State<SharedState>,
    Path((project, name)): Path<(String, String)>,
) -> Result<Json<SchemaResponse>, ServerError> {
    let state = state.read().await;
    let view = state.registry.load(&name, &project)?;
    let features = state.engine.output_schema(&view)?;
    let full_feature_names = features
        .iter()
        .map(|f| view.output_column_name(&f.name, true))
        .collect();
    Ok(Json(SchemaResponse {
        features,
        full_feature_names,
    }))
}
