//! Multi-model inference engine for price prediction

use crate::config::{InferenceStrategy, ModelsConfig};
use crate::error::InferenceError;
use crate::models::aggregator::PriceAggregator;
use crate::models::encoders::EncoderTable;
use crate::models::loader::ModelLoader;
use anyhow::{bail, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// A loaded regressor. Implementations must be immutable after construction
/// so one instance can serve concurrent requests without locking.
pub trait PricePredictor: Send + Sync {
    /// Model name, as configured
    fn name(&self) -> &str;

    /// Artifact version, shared with the encoder table
    fn model_version(&self) -> &str;

    /// Feature order the model was trained on
    fn feature_names(&self) -> &[String];

    /// Predict a price in lakhs from one feature vector
    fn predict(&self, features: &[f64]) -> Result<f64, InferenceError>;
}

/// Result of model inference
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Raw price estimate in lakhs
    pub price_lakhs: f64,
    /// Individual model estimates
    pub model_prices: HashMap<String, f64>,
}

/// Inference engine over one or more regressors
pub struct InferenceEngine {
    models: Vec<Box<dyn PricePredictor>>,
    aggregator: PriceAggregator,
    strategy: InferenceStrategy,
    primary_model: String,
    model_version: String,
    feature_count: usize,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("models", &self.model_names())
            .field("strategy", &self.strategy)
            .field("primary_model", &self.primary_model)
            .field("model_version", &self.model_version)
            .field("feature_count", &self.feature_count)
            .finish()
    }
}

/// Model names the configured strategy needs, in a stable order
pub fn required_models(config: &ModelsConfig) -> Vec<String> {
    match config.strategy {
        InferenceStrategy::Primary => vec![config.primary_model.clone()],
        InferenceStrategy::Ensemble => {
            let mut names: Vec<String> = config
                .weights
                .iter()
                .filter(|(_, &w)| w > 0.0)
                .map(|(name, _)| name.clone())
                .collect();
            names.sort();
            names
        }
    }
}

impl InferenceEngine {
    /// Load the configured models from disk and check them against the
    /// encoder table and the serving feature layout.
    pub fn load(
        config: &ModelsConfig,
        encoders: &EncoderTable,
        feature_names: &[&str],
    ) -> Result<Self> {
        let loader = ModelLoader::new(&config.models_dir);
        let models = loader
            .load_models(&required_models(config))?
            .into_iter()
            .map(|m| Box::new(m) as Box<dyn PricePredictor>)
            .collect();

        Self::from_models(models, config, encoders.model_version(), feature_names)
    }

    /// Build an engine from already constructed models.
    ///
    /// Every model must share `model_version` and list exactly
    /// `feature_names`, in order.
    pub fn from_models(
        models: Vec<Box<dyn PricePredictor>>,
        config: &ModelsConfig,
        model_version: &str,
        feature_names: &[&str],
    ) -> Result<Self> {
        if models.is_empty() {
            bail!("No models loaded");
        }

        if let Some(expected) = &config.model_version {
            if expected != model_version {
                bail!("Encoder table version {model_version} does not match configured version {expected}");
            }
        }

        for model in &models {
            if model.model_version() != model_version {
                bail!(
                    "Model {} has version {}, encoders have {}",
                    model.name(),
                    model.model_version(),
                    model_version
                );
            }

            let names = model.feature_names();
            if names.len() != feature_names.len() {
                bail!(
                    "Model {} expects {} features, serving layout has {}",
                    model.name(),
                    names.len(),
                    feature_names.len()
                );
            }
            if let Some((i, (got, want))) = names
                .iter()
                .zip(feature_names)
                .enumerate()
                .find(|(_, (got, want))| got.as_str() != **want)
            {
                bail!(
                    "Model {} feature {} is {:?}, serving layout has {:?}",
                    model.name(),
                    i,
                    got,
                    want
                );
            }
        }

        if config.strategy == InferenceStrategy::Primary
            && !models.iter().any(|m| m.name() == config.primary_model)
        {
            bail!("Primary model {} is not loaded", config.primary_model);
        }

        let aggregator = PriceAggregator::new(config.weights.clone());

        info!(
            strategy = ?config.strategy,
            primary_model = %config.primary_model,
            model_version = %model_version,
            "Inference engine initialized"
        );

        Ok(Self {
            models,
            aggregator,
            strategy: config.strategy.clone(),
            primary_model: config.primary_model.clone(),
            model_version: model_version.to_string(),
            feature_count: feature_names.len(),
        })
    }

    /// Get the current inference strategy
    pub fn strategy(&self) -> &InferenceStrategy {
        &self.strategy
    }

    /// Version shared by every loaded artifact
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Length of the feature vector every model expects
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Get the number of loaded models
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Get loaded model names
    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name().to_string()).collect()
    }

    /// Run inference on a feature vector using the configured strategy
    pub fn predict(&self, features: &[f64]) -> Result<PredictionResult, InferenceError> {
        if features.len() != self.feature_count {
            return Err(InferenceError::DimensionMismatch {
                expected: self.feature_count,
                actual: features.len(),
            });
        }

        let result = match self.strategy {
            InferenceStrategy::Primary => self.predict_primary(features),
            InferenceStrategy::Ensemble => self.predict_ensemble(features),
        }?;

        if !result.price_lakhs.is_finite() {
            return Err(InferenceError::NonFiniteOutput {
                value: result.price_lakhs,
            });
        }

        Ok(result)
    }

    /// Run inference using only the primary model
    fn predict_primary(&self, features: &[f64]) -> Result<PredictionResult, InferenceError> {
        let model = self
            .models
            .iter()
            .find(|m| m.name() == self.primary_model)
            .ok_or_else(|| InferenceError::Worker(format!(
                "primary model {} is not loaded",
                self.primary_model
            )))?;

        let price = model.predict(features)?;

        debug!(
            strategy = "primary",
            model = %self.primary_model,
            price_lakhs = price,
            "Primary model inference complete"
        );

        let mut model_prices = HashMap::new();
        model_prices.insert(model.name().to_string(), price);

        Ok(PredictionResult {
            price_lakhs: price,
            model_prices,
        })
    }

    /// Run inference using every loaded model. One failing model fails the
    /// whole prediction; a partial ensemble would silently shift prices.
    fn predict_ensemble(&self, features: &[f64]) -> Result<PredictionResult, InferenceError> {
        let mut model_prices = HashMap::with_capacity(self.models.len());

        for model in &self.models {
            let price = model.predict(features)?;
            model_prices.insert(model.name().to_string(), price);
        }

        let price = self.aggregator.aggregate(&model_prices).ok_or_else(|| {
            InferenceError::Worker("no ensemble model carries a positive weight".to_string())
        })?;

        debug!(
            strategy = "ensemble",
            price_lakhs = price,
            spread = PriceAggregator::spread(&model_prices),
            model_prices = ?model_prices,
            "Ensemble inference complete"
        );

        Ok(PredictionResult {
            price_lakhs: price,
            model_prices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    struct FixedModel {
        name: String,
        version: String,
        features: Vec<String>,
        price: Result<f64, String>,
    }

    impl FixedModel {
        fn boxed(name: &str, price: Result<f64, String>) -> Box<dyn PricePredictor> {
            Box::new(Self {
                name: name.to_string(),
                version: "v1".to_string(),
                features: vec!["a".to_string(), "b".to_string()],
                price,
            })
        }
    }

    impl PricePredictor for FixedModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn model_version(&self) -> &str {
            &self.version
        }

        fn feature_names(&self) -> &[String] {
            &self.features
        }

        fn predict(&self, _features: &[f64]) -> Result<f64, InferenceError> {
            self.price.clone().map_err(|message| InferenceError::Model {
                model: self.name.clone(),
                message,
            })
        }
    }

    fn models_config(strategy: InferenceStrategy) -> ModelsConfig {
        let mut config = AppConfig::default().models;
        config.strategy = strategy;
        config.weights.clear();
        config.weights.insert("linear_regression".to_string(), 1.0);
        config.weights.insert("random_forest".to_string(), 3.0);
        config
    }

    #[test]
    fn test_primary_strategy() {
        let engine = InferenceEngine::from_models(
            vec![FixedModel::boxed("random_forest", Ok(42.0))],
            &models_config(InferenceStrategy::Primary),
            "v1",
            &["a", "b"],
        )
        .unwrap();

        let result = engine.predict(&[1.0, 2.0]).unwrap();
        assert_eq!(result.price_lakhs, 42.0);
        assert_eq!(result.model_prices.len(), 1);
    }

    #[test]
    fn test_ensemble_strategy() {
        let engine = InferenceEngine::from_models(
            vec![
                FixedModel::boxed("linear_regression", Ok(20.0)),
                FixedModel::boxed("random_forest", Ok(40.0)),
            ],
            &models_config(InferenceStrategy::Ensemble),
            "v1",
            &["a", "b"],
        )
        .unwrap();

        let result = engine.predict(&[1.0, 2.0]).unwrap();
        assert!((result.price_lakhs - 35.0).abs() < 1e-9);
        assert_eq!(result.model_prices.len(), 2);
    }

    #[test]
    fn test_model_failure_is_an_inference_error() {
        let engine = InferenceEngine::from_models(
            vec![FixedModel::boxed("random_forest", Err("boom".to_string()))],
            &models_config(InferenceStrategy::Primary),
            "v1",
            &["a", "b"],
        )
        .unwrap();

        let err = engine.predict(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, InferenceError::Model { .. }));
    }

    #[test]
    fn test_non_finite_output_is_rejected() {
        let engine = InferenceEngine::from_models(
            vec![FixedModel::boxed("random_forest", Ok(f64::NAN))],
            &models_config(InferenceStrategy::Primary),
            "v1",
            &["a", "b"],
        )
        .unwrap();

        assert!(matches!(
            engine.predict(&[1.0, 2.0]),
            Err(InferenceError::NonFiniteOutput { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let engine = InferenceEngine::from_models(
            vec![FixedModel::boxed("random_forest", Ok(1.0))],
            &models_config(InferenceStrategy::Primary),
            "v1",
            &["a", "b"],
        )
        .unwrap();

        assert!(matches!(
            engine.predict(&[1.0]),
            Err(InferenceError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_schema_and_version_checks() {
        let config = models_config(InferenceStrategy::Primary);

        let wrong_order = InferenceEngine::from_models(
            vec![FixedModel::boxed("random_forest", Ok(1.0))],
            &config,
            "v1",
            &["b", "a"],
        );
        assert!(wrong_order.is_err());

        let wrong_len = InferenceEngine::from_models(
            vec![FixedModel::boxed("random_forest", Ok(1.0))],
            &config,
            "v1",
            &["a", "b", "c"],
        );
        assert!(wrong_len.is_err());

        let skewed = InferenceEngine::from_models(
            vec![FixedModel::boxed("random_forest", Ok(1.0))],
            &config,
            "v2",
            &["a", "b"],
        );
        assert!(skewed.is_err());

        let no_primary = InferenceEngine::from_models(
            vec![FixedModel::boxed("linear_regression", Ok(1.0))],
            &config,
            "v1",
            &["a", "b"],
        );
        assert!(no_primary.is_err());
    }

    #[test]
    fn test_required_models() {
        assert_eq!(
            required_models(&models_config(InferenceStrategy::Primary)),
            vec!["random_forest"]
        );
        assert_eq!(
            required_models(&models_config(InferenceStrategy::Ensemble)),
            vec!["linear_regression", "random_forest"]
        );
    }
}
