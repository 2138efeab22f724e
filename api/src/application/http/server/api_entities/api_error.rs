use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use listquery_core::domain::query::SchemaValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Rejection returned by the list-query extractors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] SchemaValidationError),
}

/// One rejected input, located by its wire path (`pageSize`, `sort[1].order`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IssueResponse {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub status: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<IssueResponse>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "E_VALIDATION",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let issues = match self {
            ApiError::Validation(error) => error
                .issues
                .iter()
                .map(|issue| IssueResponse {
                    path: issue.path(),
                    message: issue.to_string(),
                })
                .collect(),
        };

        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            status: self.status().as_u16() as i64,
            issues,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = serde_json::to_string(&self.to_error_response()).unwrap_or_else(|_| {
            r#"{"code":"E_INTERNAL_SERVER_ERROR","message":"Failed to serialize error response"}"#
                .to_string()
        });

        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(body.clone().into())
            .unwrap_or_else(|_| Response::new(body.into()))
    }
}
