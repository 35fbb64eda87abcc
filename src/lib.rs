//! Property Price Service Library
//!
//! Serves price predictions for Indian residential property from a
//! pre-trained regression model and its label encoders.

pub mod app;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod handler;
pub mod metrics;
pub mod models;
pub mod service;
pub mod templates;
pub mod types;

pub use app::{create_router, AppState};
pub use config::AppConfig;
pub use error::ServiceError;
pub use feature_extractor::FeatureExtractor;
pub use models::inference::InferenceEngine;
pub use service::PredictionService;
pub use types::{prediction::PricePrediction, property::PropertyRequest};
