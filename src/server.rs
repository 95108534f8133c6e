//! HTTP boundary: JSON in, prediction envelope out.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::features::InputRecord;
use crate::pipeline::Predictor;
use crate::types::PredictionResult;

pub const SERVICE_BANNER: &str = "Backend API for Storm Trajectory Prediction";

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({ "message": SERVICE_BANNER }))
}

/// Every error envelope, including an unreadable body, is a 500.
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<PredictionResult>) {
    let record = match payload {
        Ok(Json(Value::Object(map))) => InputRecord::from(map),
        Ok(Json(other)) => {
            let msg = format!("expected a JSON object of features, got {}", json_kind(&other));
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(PredictionResult::error(msg)));
        }
        Err(rejection) => {
            tracing::warn!("rejected request body: {rejection}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PredictionResult::error(rejection.body_text())),
            );
        }
    };

    let result = state.predictor.predict(&record);
    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
