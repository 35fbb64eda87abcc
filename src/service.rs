//! Request pipeline: validate, encode, predict, format.

use crate::config::{AppConfig, InferenceStrategy, PredictionConfig};
use crate::error::{InferenceError, ServiceError};
use crate::feature_extractor::{FeatureExtractor, FEATURE_NAMES};
use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceEngine;
use crate::models::loader::ModelLoader;
use crate::types::prediction::{adjust_price, PredictionDetails, PricePrediction};
use crate::types::property::{PropertyFields, PropertyRequest};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Loaded artifacts plus the settings needed to serve predictions.
///
/// Everything here is read-only after [`PredictionService::load`], so one
/// instance is shared by every request.
pub struct PredictionService {
    extractor: Arc<FeatureExtractor>,
    engine: Arc<InferenceEngine>,
    config: PredictionConfig,
    metrics: Arc<ServiceMetrics>,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub model_loaded: bool,
    pub encoders_loaded: bool,
    pub expected_features: usize,
    pub model_version: String,
    pub strategy: InferenceStrategy,
    pub models: Vec<String>,
}

impl PredictionService {
    /// Load the encoder table and models named by `config`.
    ///
    /// Any missing, corrupt or mismatched artifact is an error.
    pub fn load(config: &AppConfig, metrics: Arc<ServiceMetrics>) -> Result<Self> {
        let encoders = Arc::new(
            ModelLoader::load_encoders(&config.encoders.path)
                .context("Failed to load encoder table")?,
        );

        let extractor = FeatureExtractor::new(encoders.clone(), &config.encoders.strict_features)
            .context("Encoder table does not cover the serving feature layout")?;

        let engine = InferenceEngine::load(&config.models, &encoders, &FEATURE_NAMES)
            .context("Failed to load models")?;

        info!(
            encoders = encoders.len(),
            models = ?engine.model_names(),
            model_version = %engine.model_version(),
            features = extractor.feature_count(),
            "Artifacts loaded"
        );

        Ok(Self::new(
            Arc::new(extractor),
            Arc::new(engine),
            config.prediction.clone(),
            metrics,
        ))
    }

    /// Assemble a service from already loaded parts
    pub fn new(
        extractor: Arc<FeatureExtractor>,
        engine: Arc<InferenceEngine>,
        config: PredictionConfig,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            extractor,
            engine,
            config,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    /// Values the encoder for `feature` was trained on
    pub fn known_values(&self, feature: &str) -> &[String] {
        self.extractor.known_values(feature)
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            model_loaded: self.engine.model_count() > 0,
            encoders_loaded: true,
            expected_features: self.engine.feature_count(),
            model_version: self.engine.model_version().to_string(),
            strategy: self.engine.strategy().clone(),
            models: self.engine.model_names(),
        }
    }

    /// Predict the price of one property.
    pub async fn predict(&self, fields: &PropertyFields) -> Result<PricePrediction, ServiceError> {
        self.metrics.record_request();
        let start = Instant::now();

        let result = self.run(fields, start).await;

        match &result {
            Ok(prediction) => {
                let fallbacks: Vec<&str> = prediction
                    .fallback_features
                    .iter()
                    .map(String::as_str)
                    .collect();
                self.metrics
                    .record_prediction(start.elapsed(), prediction.predicted_price, &fallbacks);
            }
            Err(e) => {
                self.metrics.record_failure(e.is_client_error());
                if e.is_client_error() {
                    debug!(kind = e.kind(), error = %e, "Request rejected");
                } else {
                    error!(kind = e.kind(), error = %e, "Prediction failed");
                }
            }
        }

        result
    }

    async fn run(&self, fields: &PropertyFields, start: Instant) -> Result<PricePrediction, ServiceError> {
        let request = PropertyRequest::parse(fields)?;
        let features = self.extractor.extract(&request)?;

        if !features.fallbacks.is_empty() {
            debug!(
                city = %request.city,
                features = ?features.fallbacks,
                "Fallback encodings applied"
            );
        }

        let engine = self.engine.clone();
        let values = features.values;
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let output = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || engine.predict(&values)),
        )
        .await
        .map_err(|_| ServiceError::Timeout(self.config.timeout_ms))?
        .map_err(|e| InferenceError::Worker(e.to_string()))??;

        let price = adjust_price(output.price_lakhs, &self.config)?;

        let prediction = PricePrediction::new(price, &self.config, self.engine.model_version())
            .with_fallbacks(&features.fallbacks)
            .with_model_prices(output.model_prices)
            .with_details(PredictionDetails {
                city: request.city.clone(),
                locality: request.locality.clone(),
                property_type: request.property_type.clone(),
                area_sqft: request.area_sqft,
                bedrooms: request.bedrooms,
                features_count: self.extractor.feature_count(),
            });

        info!(
            request_id = %prediction.request_id,
            city = %request.city,
            locality = %request.locality,
            raw_price = output.price_lakhs,
            price_lakhs = price,
            latency_us = start.elapsed().as_micros() as u64,
            "Prediction served"
        );

        Ok(prediction)
    }
}
