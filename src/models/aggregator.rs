//! Price aggregation for multi-model ensembles

use std::collections::HashMap;

/// Aggregates price estimates from multiple models into a single estimate.
#[derive(Debug, Clone)]
pub struct PriceAggregator {
    /// Model weights for weighted average; unlisted models weigh 0
    weights: HashMap<String, f64>,
}

impl PriceAggregator {
    /// Create a new aggregator with model weights.
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self { weights }
    }

    /// Weight applied to a model's estimate
    pub fn weight(&self, model_name: &str) -> f64 {
        self.weights
            .get(model_name)
            .copied()
            .unwrap_or(0.0)
            .max(0.0)
    }

    /// Aggregate model estimates into a single price.
    ///
    /// Uses a weighted average where weights are normalized to sum to 1.
    /// Models are summed in name order, so the result does not depend on map
    /// iteration order. Returns `None` when no model carries positive weight.
    pub fn aggregate(&self, model_prices: &HashMap<String, f64>) -> Option<f64> {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        let mut names: Vec<&String> = model_prices.keys().collect();
        names.sort_unstable();

        for model_name in names {
            let price = model_prices[model_name];
            let weight = self.weight(model_name);
            weighted_sum += price * weight;
            total_weight += weight;
        }

        (total_weight > 0.0).then(|| weighted_sum / total_weight)
    }

    /// Spread between the highest and lowest estimate
    pub fn spread(model_prices: &HashMap<String, f64>) -> f64 {
        let max = model_prices.values().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = model_prices.values().copied().fold(f64::INFINITY, f64::min);
        if model_prices.is_empty() {
            0.0
        } else {
            max - min
        }
    }
}
