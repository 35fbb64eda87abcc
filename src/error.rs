//! Request-level error taxonomy
//!
//! Startup and artifact problems are `anyhow::Error`s and abort the process.
//! Everything that can go wrong while serving a single request is a
//! [`ServiceError`], which carries a stable kind string and an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single malformed field in a property request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProblem {
    pub field: String,
    pub reason: String,
}

/// Every problem found while validating one property request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationError {
    /// Required fields absent from the payload
    pub missing: Vec<String>,
    /// Fields present but unusable
    pub invalid: Vec<FieldProblem>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// Names of all offending fields, missing first
    pub fn fields(&self) -> Vec<String> {
        self.missing
            .iter()
            .cloned()
            .chain(self.invalid.iter().map(|p| p.field.clone()))
            .collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing required field(s): {}", self.missing.join(", ")));
        }
        for problem in &self.invalid {
            parts.push(format!("{}: {}", problem.field, problem.reason));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Failures of the model call itself. These indicate artifact or version skew,
/// never a bad request.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("feature vector has {actual} values, model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model {model} failed: {message}")]
    Model { model: String, message: String },

    #[error("model {model} returned no prediction")]
    EmptyOutput { model: String },

    #[error("model produced a non-finite prediction ({value})")]
    NonFiniteOutput { value: f64 },

    #[error("inference worker failed: {0}")]
    Worker(String),
}

/// Errors returned to HTTP callers
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("unsupported {feature} value {value:?}")]
    UnsupportedCategory { feature: String, value: String },

    #[error("request body could not be parsed: {0}")]
    MalformedBody(String),

    #[error("prediction failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("prediction did not complete within {0} ms")]
    Timeout(u64),
}

impl ServiceError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::UnsupportedCategory { .. } => "unsupported_category",
            ServiceError::MalformedBody(_) => "malformed_body",
            ServiceError::Inference(_) => "inference_error",
            ServiceError::Timeout(_) => "inference_timeout",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_)
            | ServiceError::UnsupportedCategory { .. }
            | ServiceError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ServiceError::Inference(_) | ServiceError::Timeout(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Fields implicated in the error, if any
    pub fn fields(&self) -> Vec<String> {
        match self {
            ServiceError::Validation(e) => e.fields(),
            // Encoder names lowercase to their request field names
            ServiceError::UnsupportedCategory { feature, .. } => vec![feature.to_lowercase()],
            _ => Vec::new(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Serializable body for the JSON endpoints
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                detail: self.to_string(),
                fields: self.fields(),
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}

/// JSON error envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_field() {
        let err = ValidationError {
            missing: vec!["area_sqft".to_string(), "bedrooms".to_string()],
            invalid: vec![FieldProblem {
                field: "age_years".to_string(),
                reason: "must not be negative".to_string(),
            }],
        };

        assert_eq!(
            err.to_string(),
            "missing required field(s): area_sqft, bedrooms; age_years: must not be negative"
        );
        assert_eq!(err.fields(), vec!["area_sqft", "bedrooms", "age_years"]);
    }

    #[test]
    fn test_kinds_and_statuses() {
        let validation = ServiceError::from(ValidationError {
            missing: vec!["city".to_string()],
            invalid: Vec::new(),
        });
        assert_eq!(validation.kind(), "validation_error");
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let inference = ServiceError::from(InferenceError::DimensionMismatch {
            expected: 43,
            actual: 42,
        });
        assert_eq!(inference.kind(), "inference_error");
        assert_eq!(inference.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!inference.is_client_error());
    }

    #[test]
    fn test_error_body_shape() {
        let err = ServiceError::UnsupportedCategory {
            feature: "City".to_string(),
            value: "Atlantis".to_string(),
        };
        let json = serde_json::to_value(err.to_body()).unwrap();

        assert_eq!(json["error"]["kind"], "unsupported_category");
        assert_eq!(json["error"]["fields"][0], "city");
        assert!(json["error"]["detail"].as_str().unwrap().contains("Atlantis"));
    }
}
