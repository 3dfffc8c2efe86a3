use axum::http::StatusCode;
use axum::{
    extract::{Form, Json, State},
    response::{Html, IntoResponse},
};
use serde_json::json;

use crate::app::AppState;
use crate::error::AppError;
use crate::features::FEATURES;
use crate::presenter::{render_page, Outcome, PageView};
use crate::schema::{FormValues, PredictionRequest, NUMERIC_FIELDS};

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let values = FormValues::default();
    Html(render_page(&PageView {
        values: &values,
        load_error: state.artifacts.load_error(),
        outcome: Outcome::Idle,
    }))
}

pub async fn submit_prediction(
    State(state): State<AppState>,
    Form(request): Form<PredictionRequest>,
) -> impl IntoResponse {
    let values = FormValues::from_request(&request);

    let (status, outcome) = match state.artifacts.predictor() {
        Err(e) => (
            e.status_code(),
            Outcome::Error {
                message: "La predicción está deshabilitada.".to_string(),
                detail: e.to_string(),
            },
        ),
        // blank barrio blocks the predict action, nothing reaches the model
        Ok(_) if values.barrio_is_blank() => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Outcome::Warning("Ingresá un barrio para obtener la predicción.".to_string()),
        ),
        Ok(predictor) => match predictor.predict(&values) {
            Ok(prediction) => (StatusCode::OK, Outcome::Success(prediction)),
            Err(e) => (
                e.status_code(),
                Outcome::Error {
                    message: "Ocurrió un error al predecir el precio.".to_string(),
                    detail: e.to_string(),
                },
            ),
        },
    };

    let page = render_page(&PageView {
        values: &values,
        load_error: state.artifacts.load_error(),
        outcome,
    });
    (status, Html(page))
}

pub async fn predict_json(
    State(state): State<AppState>,
    Json(payload): Json<PredictionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let values = FormValues::from_request(&payload);
    let prediction = state.artifacts.predictor()?.predict(&values)?;

    Ok((
        StatusCode::OK,
        Json(json!({"data": prediction, "success": true})),
    ))
}

pub async fn schema() -> impl IntoResponse {
    Json(json!({
        "fields": NUMERIC_FIELDS,
        "text_fields": ["barrio"],
        "features": FEATURES,
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = state.artifacts.is_loaded();
    let status = if loaded { "ok" } else { "degraded" };
    Json(json!({"status": status, "artifacts_loaded": loaded}))
}
