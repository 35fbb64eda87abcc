use axum::body::Bytes;
use axum::extract::{Form, FromRequest, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

use crate::app::AppState;
use crate::error::ServiceError;
use crate::templates::{render_index, Outcome};
use crate::types::property::PropertyFields;

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Parse a JSON object body into property fields
fn json_fields(body: &[u8]) -> Result<PropertyFields, ServiceError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(PropertyFields::from_json(map)),
        Ok(_) => Err(ServiceError::MalformedBody(
            "expected a JSON object of property fields".to_string(),
        )),
        Err(e) => Err(ServiceError::MalformedBody(e.to_string())),
    }
}

async fn json_prediction(state: &AppState, fields: Result<PropertyFields, ServiceError>) -> Response {
    let fields = match fields {
        Ok(fields) => fields,
        Err(e) => {
            state.service.metrics().record_request();
            state.service.metrics().record_failure(true);
            return e.into_response();
        }
    };

    match state.service.predict(&fields).await {
        Ok(prediction) => (StatusCode::OK, Json(prediction)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.service, Outcome::Empty))
}

/// `POST /predict`: an HTML form post renders the page, any other body is
/// read as JSON and answered with JSON.
pub async fn predict(State(state): State<AppState>, request: Request) -> Response {
    if is_form(&request) {
        let fields = match Form::<HashMap<String, String>>::from_request(request, &()).await {
            Ok(Form(map)) => PropertyFields::from_strings(map),
            Err(rejection) => {
                state.service.metrics().record_request();
                state.service.metrics().record_failure(true);
                let e = ServiceError::MalformedBody(rejection.body_text());
                let page = render_index(&state.service, Outcome::Error(&e));
                return (e.status(), Html(page)).into_response();
            }
        };

        return match state.service.predict(&fields).await {
            Ok(prediction) => {
                Html(render_index(&state.service, Outcome::Price(&prediction))).into_response()
            }
            Err(e) => {
                let page = render_index(&state.service, Outcome::Error(&e));
                (e.status(), Html(page)).into_response()
            }
        };
    }

    let fields = match Bytes::from_request(request, &()).await {
        Ok(body) => json_fields(&body),
        Err(rejection) => Err(ServiceError::MalformedBody(rejection.body_text())),
    };
    json_prediction(&state, fields).await
}

/// `GET /api/predict?city=…&locality=…`
pub async fn api_predict_get(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    json_prediction(&state, Ok(PropertyFields::from_strings(params))).await
}

/// `POST /api/predict` with a JSON body
pub async fn api_predict_post(State(state): State<AppState>, body: Bytes) -> Response {
    json_prediction(&state, json_fields(&body)).await
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.service.health()))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.service.metrics().snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::InferenceError;
    use crate::feature_extractor::{FeatureExtractor, FEATURE_NAMES};
    use crate::metrics::ServiceMetrics;
    use crate::models::inference::{InferenceEngine, PricePredictor};
    use crate::models::reference::ReferenceArtifacts;
    use crate::models::EncoderTable;
    use crate::service::PredictionService;
    use std::sync::Arc;

    struct FixedModel {
        features: Vec<String>,
    }

    impl PricePredictor for FixedModel {
        fn name(&self) -> &str {
            "random_forest"
        }

        fn model_version(&self) -> &str {
            "reference-1"
        }

        fn feature_names(&self) -> &[String] {
            &self.features
        }

        fn predict(&self, _features: &[f64]) -> Result<f64, InferenceError> {
            Ok(42.0)
        }
    }

    fn state() -> AppState {
        let config = AppConfig::default();
        let encoders = Arc::new(EncoderTable::from_file(ReferenceArtifacts::encoder_table()).unwrap());
        let extractor = FeatureExtractor::new(encoders.clone(), &config.encoders.strict_features).unwrap();
        let model = FixedModel {
            features: FEATURE_NAMES.iter().map(|f| f.to_string()).collect(),
        };
        let engine = InferenceEngine::from_models(
            vec![Box::new(model)],
            &config.models,
            encoders.model_version(),
            &FEATURE_NAMES,
        )
        .unwrap();

        AppState::new(PredictionService::new(
            Arc::new(extractor),
            Arc::new(engine),
            config.prediction,
            Arc::new(ServiceMetrics::new()),
        ))
    }

    #[tokio::test]
    async fn test_rejected_form_is_counted() {
        let state = state();
        // Larger than the default body limit
        let request = axum::http::Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(vec![b'a'; 3 * 1024 * 1024]))
            .unwrap();

        let response = predict(State(state.clone()), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let snapshot = state.service.metrics().snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.client_errors, 1);
        assert_eq!(snapshot.predictions, 0);
    }

    #[test]
    fn test_json_fields() {
        assert!(json_fields(br#"{"city": "Mumbai"}"#).is_ok());

        let err = json_fields(b"[1, 2]").unwrap_err();
        assert_eq!(err.kind(), "malformed_body");

        let err = json_fields(b"city=Mumbai").unwrap_err();
        assert_eq!(err.kind(), "malformed_body");

        let err = json_fields(b"").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_is_form() {
        let form = axum::http::Request::builder()
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(is_form(&form));

        let json = axum::http::Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(!is_form(&json));

        let bare = axum::http::Request::builder().body(axum::body::Body::empty()).unwrap();
        assert!(!is_form(&bare));
    }
}
