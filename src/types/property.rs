//! Property request parsing and validation
//!
//! Payloads arrive as JSON objects, form bodies or query strings. All three are
//! normalised into [`PropertyFields`] and validated in one pass, so a single
//! error names every missing and malformed field.

use crate::error::{FieldProblem, ValidationError};
use serde_json::Value;
use std::collections::HashMap;

/// One raw field value, independent of the transport it came from
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
    /// Arrays and objects; never valid for a property field
    Unsupported,
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Text(s),
            Value::Number(n) => n.as_f64().map_or(FieldValue::Unsupported, FieldValue::Number),
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Null => FieldValue::Null,
            Value::Array(_) | Value::Object(_) => FieldValue::Unsupported,
        }
    }
}

/// Raw named fields of one request
#[derive(Debug, Clone, Default)]
pub struct PropertyFields {
    values: HashMap<String, FieldValue>,
}

impl PropertyFields {
    pub fn from_json(map: serde_json::Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect(),
        }
    }

    /// Form bodies and query strings carry only text
    pub fn from_strings(map: HashMap<String, String>) -> Self {
        Self {
            values: map
                .into_iter()
                .map(|(k, v)| (k, FieldValue::Text(v)))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
    }

    /// First present value among `names`. Nulls and blank strings count as absent.
    fn find(&self, names: &[&str]) -> Option<&FieldValue> {
        names.iter().find_map(|name| match self.values.get(*name) {
            None | Some(FieldValue::Null) => None,
            Some(FieldValue::Text(s)) if s.trim().is_empty() => None,
            Some(value) => Some(value),
        })
    }
}

/// Amenity flags. Defaults follow the assumptions the model was trained with.
#[derive(Debug, Clone, PartialEq)]
pub struct Amenities {
    pub rera_approved: bool,
    pub ready_to_move: bool,
    pub gated_community: bool,
    /// Derived from `total_floors` when not supplied
    pub lift_available: Option<bool>,
    pub security_guard: bool,
    pub gym: bool,
    pub swimming_pool: bool,
    pub power_backup: bool,
    pub clubhouse: bool,
    pub play_area: bool,
    pub resale: bool,
    pub flood_zone: bool,
    pub earthquake_zone: bool,
}

impl Default for Amenities {
    fn default() -> Self {
        Self {
            rera_approved: false,
            ready_to_move: false,
            gated_community: true,
            lift_available: None,
            security_guard: true,
            gym: false,
            swimming_pool: false,
            power_backup: true,
            clubhouse: false,
            play_area: true,
            resale: true,
            flood_zone: false,
            earthquake_zone: false,
        }
    }
}

/// A validated property description. Constructed per request, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRequest {
    pub city: String,
    pub locality: String,
    pub property_type: String,
    pub area_sqft: f64,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub age_years: f64,
    pub floor: u32,
    pub total_floors: u32,
    /// Derived from `bedrooms` when not supplied
    pub balconies: Option<u32>,
    pub furnishing: String,
    pub parking: String,
    pub facing: String,
    /// Absent means "use the encoder's fallback"
    pub water_supply: Option<String>,
    pub amenities: Amenities,
}

pub const DEFAULT_PROPERTY_TYPE: &str = "Apartment";
pub const DEFAULT_FURNISHING: &str = "Unfurnished";
pub const DEFAULT_PARKING: &str = "No";
pub const DEFAULT_FACING: &str = "North";
pub const DEFAULT_FLOOR: u32 = 1;
pub const DEFAULT_TOTAL_FLOORS: u32 = 10;

/// Upper bounds on numeric inputs; derived features stay finite below these
pub const MAX_AREA_SQFT: f64 = 1_000_000.0;
pub const MAX_AGE_YEARS: f64 = 500.0;
pub const MAX_ROOMS: u32 = 100;
pub const MAX_FLOORS: u32 = 500;

impl PropertyRequest {
    /// Request with the required fields set and every optional field defaulted
    pub fn new(
        city: &str,
        locality: &str,
        area_sqft: f64,
        bedrooms: u32,
        bathrooms: u32,
        age_years: f64,
    ) -> Self {
        Self {
            city: city.to_string(),
            locality: locality.to_string(),
            property_type: DEFAULT_PROPERTY_TYPE.to_string(),
            area_sqft,
            bedrooms,
            bathrooms,
            age_years,
            floor: DEFAULT_FLOOR,
            total_floors: DEFAULT_TOTAL_FLOORS,
            balconies: None,
            furnishing: DEFAULT_FURNISHING.to_string(),
            parking: DEFAULT_PARKING.to_string(),
            facing: DEFAULT_FACING.to_string(),
            water_supply: None,
            amenities: Amenities::default(),
        }
    }

    /// Validate raw fields into a request
    pub fn parse(fields: &PropertyFields) -> Result<Self, ValidationError> {
        let mut r = FieldReader::new(fields);

        let city = r.required_text(&["city"]);
        let locality = r.required_text(&["locality"]);
        let area_sqft = r.required_number(&["area_sqft"]);
        let bedrooms = r.required_count(&["bedrooms", "bhk"]);
        let bathrooms = r.required_count(&["bathrooms"]);
        let age_years = r.required_number(&["age_years", "age"]);

        let property_type = r.optional_text(&["property_type"], DEFAULT_PROPERTY_TYPE);
        let furnishing = r.optional_text(&["furnishing"], DEFAULT_FURNISHING);
        let parking = r.optional_text(&["parking"], DEFAULT_PARKING);
        let facing = r.optional_text(&["facing"], DEFAULT_FACING);
        let water_supply = r.maybe_text(&["water_supply"]);

        let floor = r.optional_count(&["floor"]).unwrap_or(DEFAULT_FLOOR);
        let total_floors = r.optional_count(&["total_floors"]).unwrap_or(DEFAULT_TOTAL_FLOORS);
        let balconies = r.optional_count(&["balconies"]);

        let defaults = Amenities::default();
        let amenities = Amenities {
            rera_approved: r.flag(&["rera_approved"], defaults.rera_approved),
            ready_to_move: r.flag(&["ready_to_move"], defaults.ready_to_move),
            gated_community: r.flag(&["gated_community"], defaults.gated_community),
            lift_available: r.optional_flag(&["lift_available", "lift"]),
            security_guard: r.flag(&["security_guard"], defaults.security_guard),
            gym: r.flag(&["gym"], defaults.gym),
            swimming_pool: r.flag(&["swimming_pool"], defaults.swimming_pool),
            power_backup: r.flag(&["power_backup"], defaults.power_backup),
            clubhouse: r.flag(&["clubhouse"], defaults.clubhouse),
            play_area: r.flag(&["play_area"], defaults.play_area),
            resale: r.flag(&["resale"], defaults.resale),
            flood_zone: r.flag(&["flood_zone"], defaults.flood_zone),
            earthquake_zone: r.flag(&["earthquake_zone"], defaults.earthquake_zone),
        };

        if let Some(area) = area_sqft {
            if area <= 0.0 {
                r.invalid("area_sqft", "must be greater than 0");
            } else if area > MAX_AREA_SQFT {
                r.invalid("area_sqft", "must not exceed 1000000");
            }
        }
        if let Some(age) = age_years {
            if age < 0.0 {
                r.invalid("age_years", "must not be negative");
            } else if age > MAX_AGE_YEARS {
                r.invalid("age_years", "must not exceed 500");
            }
        }
        for (field, count) in [("bedrooms", bedrooms), ("bathrooms", bathrooms), ("balconies", balconies)] {
            if count.is_some_and(|n| n > MAX_ROOMS) {
                r.invalid(field, "must not exceed 100");
            }
        }
        if total_floors > MAX_FLOORS {
            r.invalid("total_floors", "must not exceed 500");
        } else if total_floors == 0 {
            r.invalid("total_floors", "must be at least 1");
        } else if floor > total_floors {
            r.invalid("floor", "must not exceed total_floors");
        }

        let mut errors = r.finish();
        match (city, locality, area_sqft, bedrooms, bathrooms, age_years) {
            (
                Some(city),
                Some(locality),
                Some(area_sqft),
                Some(bedrooms),
                Some(bathrooms),
                Some(age_years),
            ) if errors.is_empty() => Ok(Self {
                city,
                locality,
                property_type,
                area_sqft,
                bedrooms,
                bathrooms,
                age_years,
                floor,
                total_floors,
                balconies,
                furnishing,
                parking,
                facing,
                water_supply,
                amenities,
            }),
            _ => {
                errors.missing.dedup();
                Err(errors)
            }
        }
    }

    /// Balcony count, estimated from bedrooms when absent
    pub fn balcony_count(&self) -> u32 {
        self.balconies
            .unwrap_or_else(|| self.bedrooms.saturating_sub(1).max(1))
    }

    /// Lift availability, assumed for buildings taller than three floors
    pub fn has_lift(&self) -> bool {
        self.amenities
            .lift_available
            .unwrap_or(self.total_floors > 3)
    }
}

/// Collects every field problem instead of stopping at the first
struct FieldReader<'a> {
    fields: &'a PropertyFields,
    errors: ValidationError,
}

impl<'a> FieldReader<'a> {
    fn new(fields: &'a PropertyFields) -> Self {
        Self {
            fields,
            errors: ValidationError::default(),
        }
    }

    fn missing(&mut self, field: &str) {
        self.errors.missing.push(field.to_string());
    }

    fn invalid(&mut self, field: &str, reason: &str) {
        self.errors.invalid.push(FieldProblem {
            field: field.to_string(),
            reason: reason.to_string(),
        });
    }

    fn finish(self) -> ValidationError {
        self.errors
    }

    fn maybe_text(&mut self, names: &[&str]) -> Option<String> {
        match self.fields.find(names)? {
            FieldValue::Text(s) => Some(s.trim().to_string()),
            _ => {
                self.invalid(names[0], "expected text");
                None
            }
        }
    }

    fn required_text(&mut self, names: &[&str]) -> Option<String> {
        if self.fields.find(names).is_none() {
            self.missing(names[0]);
            return None;
        }
        self.maybe_text(names)
    }

    fn optional_text(&mut self, names: &[&str], default: &str) -> String {
        self.maybe_text(names)
            .unwrap_or_else(|| default.to_string())
    }

    fn maybe_number(&mut self, names: &[&str]) -> Option<f64> {
        let parsed = match self.fields.find(names)? {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                self.invalid(names[0], "expected a number");
                None
            }
        }
    }

    fn required_number(&mut self, names: &[&str]) -> Option<f64> {
        if self.fields.find(names).is_none() {
            self.missing(names[0]);
            return None;
        }
        self.maybe_number(names)
    }

    fn maybe_count(&mut self, names: &[&str]) -> Option<u32> {
        let n = self.maybe_number(names)?;
        if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
            self.invalid(names[0], "expected a non-negative whole number");
            return None;
        }
        Some(n as u32)
    }

    fn required_count(&mut self, names: &[&str]) -> Option<u32> {
        if self.fields.find(names).is_none() {
            self.missing(names[0]);
            return None;
        }
        self.maybe_count(names)
    }

    fn optional_count(&mut self, names: &[&str]) -> Option<u32> {
        self.maybe_count(names)
    }

    fn optional_flag(&mut self, names: &[&str]) -> Option<bool> {
        let parsed = match self.fields.find(names)? {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Number(n) if *n == 1.0 => Some(true),
            FieldValue::Number(n) if *n == 0.0 => Some(false),
            FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "on" | "1" => Some(true),
                "false" | "no" | "n" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if parsed.is_none() {
            self.invalid(names[0], "expected yes/no");
        }
        parsed
    }

    fn flag(&mut self, names: &[&str], default: bool) -> bool {
        self.optional_flag(names).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_fields(value: Value) -> PropertyFields {
        match value {
            Value::Object(map) => PropertyFields::from_json(map),
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_parse_minimal_json() {
        let fields = json_fields(json!({
            "city": "Mumbai",
            "locality": "Andheri",
            "area_sqft": 1000,
            "bedrooms": 2,
            "bathrooms": 2,
            "age_years": 5
        }));

        let request = PropertyRequest::parse(&fields).unwrap();
        assert_eq!(request, PropertyRequest::new("Mumbai", "Andheri", 1000.0, 2, 2, 5.0));
        assert_eq!(request.balcony_count(), 1);
        assert!(request.has_lift());
    }

    #[test]
    fn test_parse_form_strings_and_aliases() {
        let mut map = HashMap::new();
        map.insert("city".to_string(), " Pune ".to_string());
        map.insert("locality".to_string(), "Baner".to_string());
        map.insert("area_sqft".to_string(), "850.5".to_string());
        map.insert("bhk".to_string(), "3".to_string());
        map.insert("bathrooms".to_string(), "2".to_string());
        map.insert("age".to_string(), "12".to_string());
        map.insert("gym".to_string(), "on".to_string());
        map.insert("total_floors".to_string(), "3".to_string());
        map.insert("furnishing".to_string(), "Semi-Furnished".to_string());

        let request = PropertyRequest::parse(&PropertyFields::from_strings(map)).unwrap();
        assert_eq!(request.city, "Pune");
        assert_eq!(request.area_sqft, 850.5);
        assert_eq!(request.bedrooms, 3);
        assert_eq!(request.age_years, 12.0);
        assert!(request.amenities.gym);
        assert!(!request.has_lift());
        assert_eq!(request.balcony_count(), 2);
        assert_eq!(request.furnishing, "Semi-Furnished");
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let fields = json_fields(json!({
            "city": "Mumbai",
            "locality": "",
            "bedrooms": 2,
            "bathrooms": null
        }));

        let err = PropertyRequest::parse(&fields).unwrap_err();
        assert_eq!(err.missing, vec!["locality", "area_sqft", "bathrooms", "age_years"]);
        assert!(err.invalid.is_empty());
    }

    #[test]
    fn test_numeric_fields_are_never_defaulted() {
        let fields = json_fields(json!({
            "city": "Delhi",
            "locality": "Dwarka",
            "bedrooms": 2,
            "bathrooms": 1,
            "age_years": 3
        }));

        let err = PropertyRequest::parse(&fields).unwrap_err();
        assert_eq!(err.missing, vec!["area_sqft"]);
    }

    #[test]
    fn test_malformed_values() {
        let fields = json_fields(json!({
            "city": "Delhi",
            "locality": ["Dwarka"],
            "area_sqft": -10,
            "bedrooms": 2.5,
            "bathrooms": "two",
            "age_years": -1,
            "floor": 12,
            "total_floors": 4,
            "gym": "maybe"
        }));

        let err = PropertyRequest::parse(&fields).unwrap_err();
        let fields: Vec<&str> = err.invalid.iter().map(|p| p.field.as_str()).collect();
        assert!(err.missing.is_empty());
        for expected in ["locality", "area_sqft", "bedrooms", "bathrooms", "age_years", "floor", "gym"] {
            assert!(fields.contains(&expected), "{expected} not reported in {fields:?}");
        }
    }

    #[test]
    fn test_values_beyond_bounds_are_rejected() {
        let fields = json_fields(json!({
            "city": "Mumbai",
            "locality": "Andheri",
            "area_sqft": 1e300,
            "bedrooms": 4_000_000_000u64,
            "bathrooms": 101,
            "age_years": 1e9,
            "balconies": 250,
            "total_floors": 10_000
        }));

        let err = PropertyRequest::parse(&fields).unwrap_err();
        let fields: Vec<&str> = err.invalid.iter().map(|p| p.field.as_str()).collect();
        assert!(err.missing.is_empty());
        for expected in ["area_sqft", "bedrooms", "bathrooms", "age_years", "balconies", "total_floors"] {
            assert!(fields.contains(&expected), "{expected} not reported in {fields:?}");
        }
    }

    #[test]
    fn test_values_at_bounds_are_accepted() {
        let fields = json_fields(json!({
            "city": "Mumbai",
            "locality": "Andheri",
            "area_sqft": MAX_AREA_SQFT,
            "bedrooms": MAX_ROOMS,
            "bathrooms": 1,
            "age_years": MAX_AGE_YEARS,
            "floor": MAX_FLOORS,
            "total_floors": MAX_FLOORS
        }));

        let request = PropertyRequest::parse(&fields).unwrap();
        assert_eq!(request.area_sqft, MAX_AREA_SQFT);
        assert_eq!(request.total_floors, MAX_FLOORS);
    }
}
