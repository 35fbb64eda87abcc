//! Type definitions for the property price service

pub mod prediction;
pub mod property;

pub use prediction::PricePrediction;
pub use property::{PropertyFields, PropertyRequest};
