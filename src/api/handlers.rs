//! Request handlers

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::metrics::MetricsSnapshot;
use crate::types::{OrderRecord, PredictionResult};
use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    policy: &'static str,
    model: String,
    features: usize,
    threshold: f64,
    timestamp: i64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let scorer = &state.scorer;
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        policy: scorer.policy().as_str(),
        model: scorer.model_name().to_string(),
        features: scorer.schema().len(),
        threshold: scorer.threshold().value(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

#[derive(Serialize)]
pub struct SchemaResponse {
    policy: &'static str,
    features: Vec<String>,
}

/// Feature columns the loaded classifier expects, in order
pub async fn schema(State(state): State<AppState>) -> Json<SchemaResponse> {
    Json(SchemaResponse {
        policy: state.scorer.policy().as_str(),
        features: state.scorer.schema().columns().to_vec(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.scorer.metrics().snapshot())
}

/// Score one order.
///
/// The body is decoded here rather than by the `Json` extractor so that
/// type and presence errors come back as a 400 naming the field.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<PredictionResult>> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("predict", %request_id);
    let _guard = span.enter();

    let order = OrderRecord::from_json_slice(&body).map_err(|e| {
        state.scorer.metrics().record_error(&e);
        tracing::warn!(error = %e, "Rejected order");
        e
    })?;

    let result = state.scorer.score(&order)?;
    tracing::info!(
        user_id = order.user_id,
        nm_id = order.nm_id,
        confidence = result.confidence,
        is_fraud = result.is_fraud,
        "Order scored"
    );

    Ok(Json(result))
}

/// Score a list of orders; results keep the input order.
pub async fn predict_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Vec<PredictionResult>>> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("predict_batch", %request_id);
    let _guard = span.enter();

    let orders = OrderRecord::batch_from_json_slice(&body).map_err(|e| {
        state.scorer.metrics().record_error(&e);
        tracing::warn!(error = %e, "Rejected batch");
        e
    })?;

    let results = state.scorer.score_batch(&orders)?;
    tracing::info!(
        orders = results.len(),
        flagged = results.iter().filter(|r| r.is_fraud).count(),
        "Batch scored"
    );

    Ok(Json(results))
}
