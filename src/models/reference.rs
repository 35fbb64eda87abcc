//! Deterministic reference artifacts
//!
//! A fixed synthetic dataset, a linear model and a random forest fitted on it,
//! and a matching encoder table. Used to smoke-test a deployment and as the
//! fixture for integration tests. Prices follow a known formula, so outputs
//! are plausible but carry no market information.

use crate::feature_extractor::{CATEGORICAL_FEATURES, FEATURE_COUNT, FEATURE_NAMES};
use crate::models::encoders::{EncoderSpec, EncoderTableFile};
use crate::models::loader::{ModelArtifact, ModelLoader, Regressor};
use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REFERENCE_MODEL_VERSION: &str = "reference-1";
pub const ENCODERS_FILE: &str = "label_encoders.json";

const SEED: u64 = 20_240_601;
const SAMPLES: usize = 400;

/// The supported cities
pub const CITIES: [&str; 16] = [
    "Ahmedabad",
    "Bengaluru",
    "Bhopal",
    "Chandigarh",
    "Chennai",
    "Coimbatore",
    "Delhi",
    "Gurgaon",
    "Hyderabad",
    "Indore",
    "Jaipur",
    "Kochi",
    "Kolkata",
    "Lucknow",
    "Mumbai",
    "Pune",
];

const LOCALITIES: [&str; 16] = [
    "Andheri",
    "Bandra",
    "Baner",
    "Banjara Hills",
    "Dwarka",
    "Gachibowli",
    "Hinjewadi",
    "Koramangala",
    "Powai",
    "Salt Lake",
    "Satellite",
    "Sector 62",
    "T Nagar",
    "Velachery",
    "Whitefield",
    "Vaishali Nagar",
];

/// Home city of each reference locality
const LOCALITY_CITIES: [(&str, &str); 16] = [
    ("Andheri", "Mumbai"),
    ("Bandra", "Mumbai"),
    ("Baner", "Pune"),
    ("Banjara Hills", "Hyderabad"),
    ("Dwarka", "Delhi"),
    ("Gachibowli", "Hyderabad"),
    ("Hinjewadi", "Pune"),
    ("Koramangala", "Bengaluru"),
    ("Powai", "Mumbai"),
    ("Salt Lake", "Kolkata"),
    ("Satellite", "Ahmedabad"),
    ("Sector 62", "Delhi"),
    ("T Nagar", "Chennai"),
    ("Velachery", "Chennai"),
    ("Whitefield", "Bengaluru"),
    ("Vaishali Nagar", "Jaipur"),
];

fn classes_for(feature: &str) -> &'static [&'static str] {
    match feature {
        "City" => &CITIES,
        "Locality" => &LOCALITIES,
        "Property_Type" => &["Apartment", "Independent House", "Villa"],
        "Furnishing" => &["Furnished", "Semi-Furnished", "Unfurnished"],
        "Parking" => &["No", "Yes"],
        "Facing" => &["East", "North", "North-East", "South", "West"],
        "Water_Supply" => &["24x7", "Borewell", "Limited"],
        _ => &[],
    }
}

fn index(feature: &str) -> usize {
    FEATURE_NAMES
        .iter()
        .position(|name| *name == feature)
        .unwrap_or(FEATURE_COUNT)
}

/// Price in lakhs for one synthetic row
fn reference_price(row: &[f64]) -> f64 {
    5.0 + 0.045 * row[index("Carpet_Area_sqft")]
        + 4.0 * row[index("BHK")]
        + 2.0 * row[index("Bathrooms")]
        - 0.25 * row[index("Age_of_Property_years")]
        + 1.5 * row[index("City")]
        + 0.3 * row[index("Floor")]
        + 3.0 * row[index("Gym")]
        + 5.0 * row[index("Swimming_Pool")]
}

/// Encoder table and fitted models, not yet written to disk
pub struct ReferenceArtifacts {
    pub encoders: EncoderTableFile,
    pub models: Vec<ModelArtifact>,
}

impl ReferenceArtifacts {
    /// Fit the reference models. Deterministic for a given crate version.
    pub fn build() -> Result<Self> {
        let encoders = Self::encoder_table();
        let class_counts: BTreeMap<&str, usize> = encoders
            .encoders
            .iter()
            .map(|(name, spec)| (name.as_str(), spec.classes.len()))
            .collect();

        let mut rng = StdRng::seed_from_u64(SEED);
        let mut x = Vec::with_capacity(SAMPLES);
        let mut y = Vec::with_capacity(SAMPLES);

        for _ in 0..SAMPLES {
            let mut row = Vec::with_capacity(FEATURE_COUNT);
            for feature in FEATURE_NAMES {
                let value = match class_counts.get(feature) {
                    Some(&n) => rng.gen_range(0..n) as f64,
                    None => Self::sample_numeric(feature, &mut rng),
                };
                row.push(value);
            }
            y.push(reference_price(&row));
            x.push(row);
        }

        let matrix = DenseMatrix::from_2d_vec(&x).map_err(|e| anyhow!("Matrix error: {e}"))?;

        let linear = LinearRegression::fit(&matrix, &y, LinearRegressionParameters::default())
            .map_err(|e| anyhow!("Linear regression training failed: {e}"))?;

        let params = RandomForestRegressorParameters::default()
            .with_n_trees(20)
            .with_max_depth(8)
            .with_min_samples_split(4);
        let forest = RandomForestRegressor::fit(&matrix, &y, params)
            .map_err(|e| anyhow!("Random forest training failed: {e}"))?;

        let feature_names: Vec<String> = FEATURE_NAMES.iter().map(|f| f.to_string()).collect();
        let models = vec![
            ModelArtifact {
                name: "linear_regression".to_string(),
                model_version: REFERENCE_MODEL_VERSION.to_string(),
                feature_names: feature_names.clone(),
                regressor: Regressor::LinearRegression(linear),
            },
            ModelArtifact {
                name: "random_forest".to_string(),
                model_version: REFERENCE_MODEL_VERSION.to_string(),
                feature_names,
                regressor: Regressor::RandomForest(forest),
            },
        ];

        info!(samples = SAMPLES, models = models.len(), "Reference models fitted");

        Ok(Self { encoders, models })
    }

    /// Encoder table matching the reference models
    pub fn encoder_table() -> EncoderTableFile {
        let encoders = CATEGORICAL_FEATURES
            .iter()
            .map(|feature| {
                let mut classes: Vec<String> =
                    classes_for(feature).iter().map(|c| c.to_string()).collect();
                classes.sort();
                (feature.to_string(), EncoderSpec { classes, fallback: None })
            })
            .collect();

        let mut localities_by_city: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (locality, city) in LOCALITY_CITIES {
            localities_by_city
                .entry(city.to_string())
                .or_default()
                .push(locality.to_string());
        }

        EncoderTableFile {
            model_version: REFERENCE_MODEL_VERSION.to_string(),
            encoders,
            localities_by_city,
        }
    }

    fn sample_numeric(feature: &str, rng: &mut StdRng) -> f64 {
        match feature {
            "BHK" => rng.gen_range(1..=5) as f64,
            "Bathrooms" => rng.gen_range(1..=4) as f64,
            "Balconies" => rng.gen_range(0..=3) as f64,
            "Floor" => rng.gen_range(0..=20) as f64,
            "Total_Floors" => rng.gen_range(1..=40) as f64,
            "Age_of_Property_years" => rng.gen_range(0.0..30.0),
            "Near_School_km" | "Near_Hospital_km" | "Near_Metro_km" | "Near_Market_km" => {
                rng.gen_range(0.2..10.0)
            }
            "Monthly_Maintenance" => rng.gen_range(750.0..10_000.0),
            "EMI_Per_Lakh" => rng.gen_range(1000.0..1200.0),
            "Interest_Rate" => rng.gen_range(7.0..10.0),
            "Property_Tax_Annual" => rng.gen_range(3_600.0..48_000.0),
            "Pollution_Index" => rng.gen_range(40.0..95.0),
            "Noise_Index" => rng.gen_range(30.0..80.0),
            "Crime_Rate" => rng.gen_range(5.0..30.0),
            "Internet_Availability" | "Public_Transport_Score" | "Civic_Amenities_Rating"
            | "Market_Demand_Rating" => rng.gen_range(1.0..10.0),
            "Rental_Yield_Percent" => rng.gen_range(1.5..6.0),
            "Carpet_Area_sqft" => rng.gen_range(300.0..4_000.0),
            // Remaining numeric features are yes/no flags
            _ => f64::from(u8::from(rng.gen_bool(0.5))),
        }
    }

    /// Write every artifact into `dir`, returning the written paths
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let loader = ModelLoader::new(dir);

        let mut paths = Vec::with_capacity(self.models.len() + 1);
        for model in &self.models {
            paths.push(
                loader
                    .save_model(model)
                    .with_context(|| format!("Failed to save model {}", model.name))?,
            );
        }

        let encoders_path = dir.join(ENCODERS_FILE);
        ModelLoader::save_encoders(&encoders_path, &self.encoders)?;
        paths.push(encoders_path);

        Ok(paths)
    }
}
