//! HTTP surface of the scoring service

pub mod error;
pub mod handlers;

use crate::models::Scorer;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{ApiError, ApiResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<Scorer>,
}

/// Create the router with all routes
pub fn router(scorer: Arc<Scorer>) -> Router {
    let state = AppState { scorer };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/schema", get(handlers::schema))
        .route("/metrics", get(handlers::metrics))
        .route("/predict", post(handlers::predict))
        .route("/predict_batch", post(handlers::predict_batch))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scaled_scorer, SAMPLE_ORDER_JSON};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(app: Router, method: &str, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn app() -> Router {
        router(Arc::new(scaled_scorer()))
    }

    #[tokio::test]
    async fn test_predict_single() {
        let (status, body) = send(app(), "POST", "/predict", SAMPLE_ORDER_JSON.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        let confidence = body["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        assert_eq!(body["is_fraud"].as_bool().unwrap(), confidence > 0.5);
        assert_eq!(body["prediction"].as_u64().unwrap(), u64::from(confidence > 0.5));
    }

    #[tokio::test]
    async fn test_predict_missing_field_is_400() {
        let mut order: Value = serde_json::from_str(SAMPLE_ORDER_JSON).unwrap();
        order.as_object_mut().unwrap().remove("CreatedDate");

        let (status, body) = send(app(), "POST", "/predict", order.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "CreatedDate");
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn test_predict_bad_timestamp_is_400() {
        let mut order: Value = serde_json::from_str(SAMPLE_ORDER_JSON).unwrap();
        order["CreatedDate"] = Value::from("not a date");

        let (status, body) = send(app(), "POST", "/predict", order.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "CreatedDate");
    }

    #[tokio::test]
    async fn test_predict_batch_preserves_order() {
        let scorer = Arc::new(scaled_scorer());
        let base: Value = serde_json::from_str(SAMPLE_ORDER_JSON).unwrap();
        let orders: Vec<Value> = [0, 500, 5000]
            .iter()
            .map(|distance| {
                let mut order = base.clone();
                order["Distance"] = Value::from(*distance);
                order
            })
            .collect();

        let (status, body) = send(
            router(scorer.clone()),
            "POST",
            "/predict_batch",
            Value::from(orders.clone()).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let results = body.as_array().unwrap();
        assert_eq!(results.len(), 3);

        for (order, result) in orders.iter().zip(results) {
            let (_, single) = send(router(scorer.clone()), "POST", "/predict", order.to_string()).await;
            assert_eq!(single["confidence"], result["confidence"]);
        }
    }

    #[tokio::test]
    async fn test_predict_batch_rejects_whole_batch() {
        let good: Value = serde_json::from_str(SAMPLE_ORDER_JSON).unwrap();
        let mut bad = good.clone();
        bad["IsPaid"] = Value::from("maybe");

        let (status, body) = send(
            app(),
            "POST",
            "/predict_batch",
            Value::from(vec![good, bad]).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "orders[1].IsPaid");
    }

    #[tokio::test]
    async fn test_predict_batch_empty_is_400() {
        let (status, _) = send(app(), "POST", "/predict_batch", "[]".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_schema_and_health() {
        let (status, body) = send(app(), "GET", "/schema", String::new()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["policy"], "scaled");
        assert_eq!(body["features"][2], "weekday");
        assert_eq!(body["features"].as_array().unwrap().len(), 26);

        let (status, body) = send(app(), "GET", "/health", String::new()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["threshold"], 0.5);
    }

    #[tokio::test]
    async fn test_metrics_reflect_traffic() {
        let scorer = Arc::new(scaled_scorer());
        send(router(scorer.clone()), "POST", "/predict", SAMPLE_ORDER_JSON.to_string()).await;
        send(router(scorer.clone()), "POST", "/predict", "{}".to_string()).await;

        let (status, body) = send(router(scorer), "GET", "/metrics", String::new()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["orders_scored"], 1);
        assert_eq!(body["rejected"], 1);
    }
}
