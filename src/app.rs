use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handler::{api_predict_get, api_predict_post, health, index, metrics, predict};
use crate::service::PredictionService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

pub fn create_router(app_state: AppState) -> Router {
    let api_routes = Router::new().route("/predict", get(api_predict_get).post(api_predict_post));

    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes)
        .with_state(app_state)
}
