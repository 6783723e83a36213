//! JSON error responses for the HTTP surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::ConvertError;

/// Message returned when `/convert` receives no body.
pub const MISSING_BODY: &str = "Missing body: send raw EML bytes";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

/// Request-level failures, each rendered as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing body: send raw EML bytes")]
    MissingBody,

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingBody => StatusCode::BAD_REQUEST,
            ApiError::Convert(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, stderr) = match self {
            ApiError::MissingBody => (MISSING_BODY.to_string(), None),
            ApiError::Convert(ConvertError::Failed { diagnostics, .. }) => {
                ("eml2pdf failed".to_string(), Some(diagnostics.clone()))
            }
            ApiError::Convert(ConvertError::NoOutput) => {
                ("eml2pdf produced no PDF".to_string(), None)
            }
            ApiError::Convert(ConvertError::Timeout(timeout)) => {
                (format!("eml2pdf timed out after {timeout:?}"), None)
            }
            ApiError::Convert(ConvertError::Spawn { .. }) => {
                ("failed to run eml2pdf".to_string(), None)
            }
            ApiError::Convert(ConvertError::Io(_)) => ("internal error".to_string(), None),
        };
        ErrorBody { error, stderr }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::MissingBody => warn!(%status, "Rejected request without body"),
            ApiError::Convert(ConvertError::Spawn { .. } | ConvertError::Io(_)) => {
                error!(%status, error = %self, "Conversion error")
            }
            ApiError::Convert(e) => warn!(%status, error = %e, "Conversion error"),
        }
        (status, Json(self.body())).into_response()
    }
}
