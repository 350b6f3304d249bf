use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::jobs::{EncryptionError, JobError, QueueError};
use crate::result_store::ResultStoreError;
use crate::telemetry::TelemetryError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Job(JobError),
    Encryption(EncryptionError),
    Queue(QueueError),
    ResultStore(ResultStoreError),
    InvalidInput(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Job(err) => write!(f, "job error: {}", err),
            AppError::Encryption(err) => write!(f, "encryption error: {}", err),
            AppError::Queue(err) => write!(f, "queue error: {}", err),
            AppError::ResultStore(err) => write!(f, "result store error: {}", err),
            AppError::InvalidInput(detail) => write!(f, "invalid input: {}", detail),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Job(err) => Some(err),
            AppError::Encryption(err) => Some(err),
            AppError::Queue(err) => Some(err),
            AppError::ResultStore(err) => Some(err),
            AppError::InvalidInput(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) | AppError::Encryption(_) => StatusCode::BAD_REQUEST,
            AppError::ResultStore(ResultStoreError::SlotNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Queue(_) | AppError::ResultStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<JobError> for AppError {
    fn from(value: JobError) -> Self {
        Self::Job(value)
    }
}

impl From<EncryptionError> for AppError {
    fn from(value: EncryptionError) -> Self {
        Self::Encryption(value)
    }
}

impl From<QueueError> for AppError {
    fn from(value: QueueError) -> Self {
        Self::Queue(value)
    }
}

impl From<ResultStoreError> for AppError {
    fn from(value: ResultStoreError) -> Self {
        Self::ResultStore(value)
    }
}
