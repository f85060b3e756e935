use std::error::Error as StdError;

use axum::Json;
use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::application::error::ErrorReport;
use crate::application::validation::{FieldError, ValidationResult};

/// `{"Error": ..., "Errors": [{field: message}, ...]}`.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "Errors", skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Map<String, Value>>,
}

/// Aborted request. Client errors carry the structured body; server errors
/// carry nothing but the diagnostic report.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    errors: Vec<FieldError>,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            report: ErrorReport::from_message(source, status, message.clone()),
            message,
            errors: Vec::new(),
        }
    }

    pub fn bad_request(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::BAD_REQUEST, message)
    }

    pub fn validation(source: &'static str, result: ValidationResult) -> Self {
        let mut error = Self::bad_request(source, result.summary());
        error.errors = result.into_errors();
        error
    }

    /// Internal fault; `err` is logged but never shown to the client.
    pub fn internal(source: &'static str, err: &dyn StdError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: String::new(),
            errors: Vec::new(),
            report: ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, err),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = if self.status.is_server_error() {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = self.status;
            response
        } else {
            let body = ApiErrorBody {
                error: self.message,
                errors: self
                    .errors
                    .into_iter()
                    .map(|FieldError { field, message }| {
                        let mut entry = Map::new();
                        entry.insert(field, Value::String(message));
                        entry
                    })
                    .collect(),
            };
            (self.status, Json(body)).into_response()
        };
        // The logging middleware reads this; it never reaches the client.
        self.report.attach(&mut response);
        response
    }
}
