use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use saleflow_order::{ReconcileError, RepositoryError};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Validation(Vec<FieldError>),
    Conflict(String),
    /// Planning or ERP could not be reached; details stay in the log
    Gateway(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "success": false,
                    "validationErrors": errors,
                    "duplicateOrder": false,
                }),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Gateway(msg) => {
                tracing::error!("Gateway failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "External system unavailable, please retry" }),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        let message = err.to_string();
        match err {
            ReconcileError::Validation(e) => AppError::Validation(vec![FieldError::new(e.field(), message)]),
            ReconcileError::Change(_) | ReconcileError::NothingToSubmit(_) => {
                AppError::Validation(vec![FieldError::new("lines", message)])
            }
            ReconcileError::Transition(_) => AppError::Conflict(message),
            ReconcileError::Gateway { .. } => AppError::Gateway(message),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ContractNotFound(contract_no) => AppError::Validation(vec![FieldError::new(
                "contractNo",
                format!("Contract not found: {}", contract_no),
            )]),
            other => AppError::Anyhow(other.into()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}
