use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::artifacts::ArtifactStatus;
use crate::handler::{health, index, predict_json, schema, submit_prediction};

#[derive(Clone)]
pub struct AppState {
    pub artifacts: ArtifactStatus,
}

pub fn create_router(app_state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/predict", post(predict_json))
        .route("/schema", get(schema));

    return Router::new()
        .route("/", get(index))
        .route("/predict", post(submit_prediction))
        .route("/health", get(health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);
}
