//! Price prediction response structures

use crate::config::PredictionConfig;
use crate::error::InferenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unit every model predicts in
pub const PRICE_UNIT: &str = "lakhs";

/// Turn a raw model output into a reportable price in lakhs.
///
/// Negative outputs are reported by magnitude and outputs above
/// `rescale_above_lakhs` are divided by `rescale_factor`, matching the
/// post-processing the deployed models were calibrated against.
pub fn adjust_price(raw_lakhs: f64, config: &PredictionConfig) -> Result<f64, InferenceError> {
    if !raw_lakhs.is_finite() {
        return Err(InferenceError::NonFiniteOutput { value: raw_lakhs });
    }

    let mut price = raw_lakhs.abs();
    if let Some(limit) = config.rescale_above_lakhs {
        if price > limit && config.rescale_factor > 0.0 {
            price /= config.rescale_factor;
        }
    }

    Ok(round_to_paise(price))
}

/// Round to two decimals
pub fn round_to_paise(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Display string, e.g. `₹ 45.23 Lakhs`
pub fn format_price(price_lakhs: f64, symbol: &str) -> String {
    format!("{symbol} {price_lakhs:.2} Lakhs")
}

/// Echo of the request fields that identify the property
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PredictionDetails {
    pub city: String,
    pub locality: String,
    pub property_type: String,
    pub area_sqft: f64,
    pub bedrooms: u32,
    pub features_count: usize,
}

/// Predicted price returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePrediction {
    /// Price in `unit`s of `currency`
    pub predicted_price: f64,

    /// ISO currency code
    pub currency: String,

    /// Unit of `predicted_price`
    pub unit: String,

    /// Formatted display price
    pub price: String,

    /// Same value as `predicted_price`, kept for existing front ends
    pub price_lakhs: f64,

    /// Unique prediction identifier
    pub request_id: String,

    /// Prediction timestamp
    pub predicted_at: DateTime<Utc>,

    /// Artifact version that produced the price
    pub model_version: String,

    /// Categorical features that used the fallback encoding
    pub fallback_features: Vec<String>,

    /// Individual model estimates, present for ensembles
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub model_prices: HashMap<String, f64>,

    pub details: PredictionDetails,
}

impl PricePrediction {
    /// Create a new prediction from an adjusted price in lakhs
    pub fn new(price_lakhs: f64, config: &PredictionConfig, model_version: &str) -> Self {
        Self {
            predicted_price: price_lakhs,
            currency: config.currency.clone(),
            unit: PRICE_UNIT.to_string(),
            price: format_price(price_lakhs, &config.currency_symbol),
            price_lakhs,
            request_id: uuid::Uuid::new_v4().to_string(),
            predicted_at: Utc::now(),
            model_version: model_version.to_string(),
            fallback_features: Vec::new(),
            model_prices: HashMap::new(),
            details: PredictionDetails::default(),
        }
    }

    /// Add request details to the prediction
    pub fn with_details(mut self, details: PredictionDetails) -> Self {
        self.details = details;
        self
    }

    /// Record which features fell back to the default encoding
    pub fn with_fallbacks(mut self, features: &[&str]) -> Self {
        self.fallback_features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Attach per-model estimates when more than one model contributed
    pub fn with_model_prices(mut self, prices: HashMap<String, f64>) -> Self {
        if prices.len() > 1 {
            self.model_prices = prices
                .into_iter()
                .map(|(name, price)| (name, round_to_paise(price)))
                .collect();
        }
        self
    }
}
