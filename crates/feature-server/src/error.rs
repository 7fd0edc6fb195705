//! HTTP Error Mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derivation_engine::EngineError;
use registry_adapter::RegistryError;
use serde_json::json;
use thiserror::Error;

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Metrics are disabled")]
    MetricsDisabled,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Registry(RegistryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ServerError::Registry(RegistryError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Engine(e) => match e.root_cause() {
                EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::MissingInput { .. }
                | EngineError::MissingRequestData { .. }
                | EngineError::TypeMismatch { .. }
                | EngineError::BatchTooLarge { .. }
                | EngineError::Table(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::MetricsDisabled => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
