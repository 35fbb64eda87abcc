//! HTML rendering for the input form

use crate::error::ServiceError;
use crate::service::PredictionService;
use crate::types::prediction::PricePrediction;
use crate::types::property::{
    DEFAULT_FACING, DEFAULT_FURNISHING, DEFAULT_PARKING, DEFAULT_PROPERTY_TYPE,
};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

/// What to show below the form
pub enum Outcome<'a> {
    Empty,
    Price(&'a PricePrediction),
    Error(&'a ServiceError),
}

/// Escape text for use in element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn options(values: &[String], selected: Option<&str>) -> String {
    values
        .iter()
        .map(|value| {
            let value = escape_html(value);
            let marker = if selected == Some(value.as_str()) { " selected" } else { "" };
            format!("        <option value=\"{value}\"{marker}>{value}</option>")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn outcome_block(outcome: &Outcome<'_>) -> String {
    match outcome {
        Outcome::Empty => String::new(),
        Outcome::Price(prediction) => {
            let mut block = format!(
                "  <div class=\"result\">\n    <h2>Estimated price: {}</h2>\n    <p>{} in {}, {} sq ft</p>\n",
                escape_html(&prediction.price),
                escape_html(&prediction.details.property_type),
                escape_html(&prediction.details.locality),
                prediction.details.area_sqft
            );
            if !prediction.fallback_features.is_empty() {
                block.push_str(&format!(
                    "    <p>Not in the training data, estimated with defaults: {}</p>\n",
                    escape_html(&prediction.fallback_features.join(", "))
                ));
            }
            block.push_str("  </div>");
            block
        }
        Outcome::Error(e) => format!(
            "  <div class=\"error\">\n    <h2>Could not estimate a price</h2>\n    <p>{}</p>\n  </div>",
            escape_html(&e.to_string())
        ),
    }
}

/// Render the form page, populating dropdowns from the loaded encoders
pub fn render_index(service: &PredictionService, outcome: Outcome<'_>) -> String {
    INDEX_TEMPLATE
        .replace("{{city_options}}", &options(service.known_values("City"), None))
        .replace(
            "{{property_type_options}}",
            &options(service.known_values("Property_Type"), Some(DEFAULT_PROPERTY_TYPE)),
        )
        .replace(
            "{{furnishing_options}}",
            &options(service.known_values("Furnishing"), Some(DEFAULT_FURNISHING)),
        )
        .replace(
            "{{parking_options}}",
            &options(service.known_values("Parking"), Some(DEFAULT_PARKING)),
        )
        .replace(
            "{{facing_options}}",
            &options(service.known_values("Facing"), Some(DEFAULT_FACING)),
        )
        .replace("{{outcome}}", &outcome_block(&outcome))
}
