//! Feature extraction for property price model inference.
//!
//! This module turns a validated property request into the fixed-order
//! feature vector the regression models were trained on.

use crate::error::{FieldProblem, ServiceError, ValidationError};
use crate::models::encoders::EncoderTable;
use crate::types::property::PropertyRequest;
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Number of features produced
pub const FEATURE_COUNT: usize = 43;

/// Feature names in model order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "City",
    "Locality",
    "Property_Type",
    "RERA_Approved",
    "BHK",
    "Bathrooms",
    "Balconies",
    "Floor",
    "Age_of_Property_years",
    "Ready_to_Move",
    "Furnishing",
    "Parking",
    "Facing",
    "Gated_Community",
    "Lift_Available",
    "Water_Supply",
    "Security_Guard",
    "Gym",
    "Swimming_Pool",
    "Power_Backup",
    "Clubhouse",
    "Play_Area",
    "Near_School_km",
    "Near_Hospital_km",
    "Near_Metro_km",
    "Near_Market_km",
    "Monthly_Maintenance",
    "EMI_Per_Lakh",
    "Interest_Rate",
    "Resale",
    "Property_Tax_Annual",
    "Pollution_Index",
    "Noise_Index",
    "Crime_Rate",
    "Internet_Availability",
    "Public_Transport_Score",
    "Flood_Zone",
    "Earthquake_Zone",
    "Civic_Amenities_Rating",
    "Market_Demand_Rating",
    "Rental_Yield_Percent",
    "Carpet_Area_sqft",
    "Total_Floors",
];

/// Features that go through a label encoder
pub const CATEGORICAL_FEATURES: [&str; 7] = [
    "City",
    "Locality",
    "Property_Type",
    "Furnishing",
    "Parking",
    "Facing",
    "Water_Supply",
];

/// Neighbourhood statistics the request does not carry. The model saw these
/// per-listing during training; serving uses the same constants for everyone.
#[derive(Debug, Clone)]
pub struct NeighbourhoodDefaults {
    pub near_school_km: f64,
    pub near_hospital_km: f64,
    pub near_metro_km: f64,
    pub near_market_km: f64,
    pub maintenance_per_sqft: f64,
    pub emi_per_lakh: f64,
    pub interest_rate: f64,
    pub property_tax_per_sqft: f64,
    pub pollution_by_city: Vec<(&'static str, f64)>,
    pub default_pollution: f64,
    pub noise_index: f64,
    pub crime_rate: f64,
    pub internet_availability: f64,
    pub public_transport_score: f64,
    pub civic_amenities_rating: f64,
    pub market_demand_rating: f64,
    pub rental_yield_percent: f64,
}

impl NeighbourhoodDefaults {
    pub fn pollution_index(&self, city: &str) -> f64 {
        self.pollution_by_city
            .iter()
            .find(|(name, _)| *name == city)
            .map(|(_, index)| *index)
            .unwrap_or(self.default_pollution)
    }
}

impl Default for NeighbourhoodDefaults {
    fn default() -> Self {
        Self {
            near_school_km: 2.5,
            near_hospital_km: 4.0,
            near_metro_km: 3.0,
            near_market_km: 1.5,
            maintenance_per_sqft: 2.5,
            emi_per_lakh: 1100.0,
            interest_rate: 8.5,
            property_tax_per_sqft: 12.0,
            pollution_by_city: vec![
                ("Mumbai", 80.0),
                ("Delhi", 90.0),
                ("Bengaluru", 60.0),
                ("Chennai", 70.0),
                ("Hyderabad", 65.0),
                ("Kolkata", 75.0),
                ("Pune", 55.0),
                ("Ahmedabad", 85.0),
            ],
            default_pollution: 65.0,
            noise_index: 50.0,
            crime_rate: 15.0,
            internet_availability: 8.0,
            public_transport_score: 7.5,
            civic_amenities_rating: 7.0,
            market_demand_rating: 6.5,
            rental_yield_percent: 3.5,
        }
    }
}

/// Encoded feature vector plus the categorical features that fell back
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f64>,
    pub fallbacks: Vec<&'static str>,
}

/// Feature extractor that transforms property requests into model input features.
///
/// Features are produced in the exact order listed in [`FEATURE_NAMES`].
pub struct FeatureExtractor {
    encoders: Arc<EncoderTable>,
    strict_features: HashSet<String>,
    defaults: NeighbourhoodDefaults,
}

impl FeatureExtractor {
    /// Create a feature extractor over a loaded encoder table.
    ///
    /// Fails if any categorical feature lacks an encoder, or a strict feature
    /// names something that is not categorical.
    pub fn new(encoders: Arc<EncoderTable>, strict_features: &[String]) -> Result<Self> {
        let missing: Vec<&str> = CATEGORICAL_FEATURES
            .iter()
            .copied()
            .filter(|f| !encoders.contains(f))
            .collect();
        if !missing.is_empty() {
            bail!("Encoder table has no encoder for {}", missing.join(", "));
        }

        for feature in strict_features {
            if !CATEGORICAL_FEATURES.contains(&feature.as_str()) {
                bail!("Strict feature {feature} is not a categorical feature");
            }
        }

        Ok(Self {
            encoders,
            strict_features: strict_features.iter().cloned().collect(),
            defaults: NeighbourhoodDefaults::default(),
        })
    }

    /// Extract features from a property request.
    ///
    /// Unseen values of strict features are rejected; other unseen values use
    /// the encoder's fallback code and are listed in the result.
    pub fn extract(&self, request: &PropertyRequest) -> Result<FeatureVector, ServiceError> {
        let mut fallbacks = Vec::new();

        let city = self.encode("City", Some(&request.city), &mut fallbacks)?;
        let mut locality = self.encode("Locality", Some(&request.locality), &mut fallbacks)?;
        if !fallbacks.contains(&"Locality")
            && !self.encoders.locality_in_city(&request.city, &request.locality)
        {
            locality = self.mismatched_locality(request, &mut fallbacks)?;
        }
        let property_type =
            self.encode("Property_Type", Some(&request.property_type), &mut fallbacks)?;
        let furnishing = self.encode("Furnishing", Some(&request.furnishing), &mut fallbacks)?;
        let parking = self.encode("Parking", Some(&request.parking), &mut fallbacks)?;
        let facing = self.encode("Facing", Some(&request.facing), &mut fallbacks)?;
        let water_supply =
            self.encode("Water_Supply", request.water_supply.as_deref(), &mut fallbacks)?;

        let d = &self.defaults;
        let a = &request.amenities;
        let area = request.area_sqft;
        let flag = |b: bool| if b { 1.0 } else { 0.0 };

        let values = vec![
            city,
            locality,
            property_type,
            flag(a.rera_approved),
            f64::from(request.bedrooms),
            f64::from(request.bathrooms),
            f64::from(request.balcony_count()),
            f64::from(request.floor),
            request.age_years,
            flag(a.ready_to_move),
            furnishing,
            parking,
            facing,
            flag(a.gated_community),
            flag(request.has_lift()),
            water_supply,
            flag(a.security_guard),
            flag(a.gym),
            flag(a.swimming_pool),
            flag(a.power_backup),
            flag(a.clubhouse),
            flag(a.play_area),
            d.near_school_km,
            d.near_hospital_km,
            d.near_metro_km,
            d.near_market_km,
            area * d.maintenance_per_sqft,
            d.emi_per_lakh,
            d.interest_rate,
            flag(a.resale),
            area * d.property_tax_per_sqft,
            d.pollution_index(&request.city),
            d.noise_index,
            d.crime_rate,
            d.internet_availability,
            d.public_transport_score,
            flag(a.flood_zone),
            flag(a.earthquake_zone),
            d.civic_amenities_rating,
            d.market_demand_rating,
            d.rental_yield_percent,
            area,
            f64::from(request.total_floors),
        ];
        debug_assert_eq!(values.len(), FEATURE_COUNT);

        if let Some(position) = values.iter().position(|v| !v.is_finite()) {
            return Err(ServiceError::Validation(ValidationError {
                missing: Vec::new(),
                invalid: vec![FieldProblem {
                    field: source_field(FEATURE_NAMES[position]).to_string(),
                    reason: "produces a non-finite model input".to_string(),
                }],
            }));
        }

        Ok(FeatureVector { values, fallbacks })
    }

    /// A known locality outside the request's city is treated as unseen
    fn mismatched_locality(
        &self,
        request: &PropertyRequest,
        fallbacks: &mut Vec<&'static str>,
    ) -> Result<f64, ServiceError> {
        if self.strict_features.contains("Locality") {
            return Err(ServiceError::UnsupportedCategory {
                feature: "Locality".to_string(),
                value: request.locality.clone(),
            });
        }
        let code = self
            .encoders
            .get("Locality")
            .map_or(0, |encoder| encoder.fallback_code());
        warn!(city = %request.city, locality = %request.locality, code, "Locality not in city, using fallback");
        fallbacks.push("Locality");
        Ok(code as f64)
    }

    fn encode(
        &self,
        feature: &'static str,
        value: Option<&str>,
        fallbacks: &mut Vec<&'static str>,
    ) -> Result<f64, ServiceError> {
        // Presence is checked in new()
        let Some(encoder) = self.encoders.get(feature) else {
            return Err(ServiceError::UnsupportedCategory {
                feature: feature.to_string(),
                value: value.unwrap_or_default().to_string(),
            });
        };

        let Some(value) = value else {
            fallbacks.push(feature);
            return Ok(encoder.fallback_code() as f64);
        };

        let encoded = encoder.encode(value);
        if encoded.is_fallback() {
            if self.strict_features.contains(feature) {
                return Err(ServiceError::UnsupportedCategory {
                    feature: feature.to_string(),
                    value: value.to_string(),
                });
            }
            warn!(feature = %feature, value = %value, code = encoded.code(), "Unknown category, using fallback");
            fallbacks.push(feature);
        }

        Ok(encoded.code() as f64)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names (matching model order).
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    /// Known classes of a categorical feature, e.g. the supported cities
    pub fn known_values(&self, feature: &str) -> &[String] {
        self.encoders
            .get(feature)
            .map(|e| e.classes())
            .unwrap_or_default()
    }
}

/// Request field a numeric feature is computed from
fn source_field(feature: &str) -> &str {
    match feature {
        "Carpet_Area_sqft" | "Monthly_Maintenance" | "Property_Tax_Annual" => "area_sqft",
        "Age_of_Property_years" => "age_years",
        "BHK" => "bedrooms",
        "Bathrooms" => "bathrooms",
        "Balconies" => "balconies",
        "Floor" => "floor",
        "Total_Floors" => "total_floors",
        other => other,
    }
}
