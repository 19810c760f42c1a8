//! Request handlers for the API endpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use super::AppState;
use super::types::{ApiError, WindowBody};
use crate::engine::clock::Interval;
use crate::engine::types::{ClearskyRequest, ResponseEnvelope};

/// Runs a clear-sky forecast for one plant or for `all`.
///
/// `POST /clearsky/{plant_name}/{interval}` → 200 + `ResponseEnvelope` JSON
/// with optional body `{"start": ..., "end": ...}`
///
/// * bad interval, window or body → 400
/// * unknown plant → 404
/// * incomplete result → 500 with `columns` and `table`
/// * interval coarser than `1H` → 400
/// * deadline exceeded → 504
///
/// On a deadline the pipeline is told to cancel; plants not yet started
/// are skipped.
pub async fn post_clearsky(
    State(state): State<Arc<AppState>>,
    Path((plant_name, interval)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<ResponseEnvelope>, ApiError> {
    let interval: Interval = interval.parse()?;
    let window: WindowBody = if body.iter().all(u8::is_ascii_whitespace) {
        WindowBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::new(StatusCode::BAD_REQUEST, format!("invalid request body: {e}"))
        })?
    };

    let request = ClearskyRequest {
        plant_name,
        interval,
        start: window.start,
        end: window.end,
    };

    let pipeline = Arc::clone(&state.pipeline);
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let task = tokio::task::spawn_blocking(move || {
        pipeline
            .run_cancellable(&request, &flag)
            .map(|outcome| outcome.envelope)
    });

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => Ok(Json(result?)),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "forecast task failed");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("forecast task failed: {e}"),
            ))
        }
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            tracing::warn!(timeout = ?state.request_timeout, "forecast deadline exceeded");
            Err(ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                format!(
                    "forecast did not finish within {} s",
                    state.request_timeout.as_secs_f64()
                ),
            ))
        }
    }
}

/// Returns the configured plant names in order.
///
/// `GET /plants` → 200 + `Vec<String>` JSON
pub async fn get_plants(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.pipeline.registry().plant_names())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeDelta, TimeZone, Utc};
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::config::PvcastConfig;
    use crate::engine::clock::SystemDateSource;
    use crate::engine::pipeline::ForecastPipeline;
    use crate::plant::ConfiguredRegistry;

    fn make_test_state() -> Arc<AppState> {
        let registry = ConfiguredRegistry::from_config(&PvcastConfig::demo()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 10, 0, 0).unwrap();
        let pipeline = ForecastPipeline::new(
            Arc::new(registry),
            Arc::new(SystemDateSource::pinned(now)),
            2,
            TimeDelta::days(7),
        )
        .unwrap();
        Arc::new(AppState {
            pipeline: Arc::new(pipeline),
            request_timeout: Duration::from_secs(10),
        })
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn clearsky_default_window_returns_200() {
        let app = router(make_test_state());
        let resp = app.oneshot(post("/clearsky/South/1H", "")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["interval"], "1H");
        assert_eq!(json["start"], "2024-06-21T12:00:00+0200");
        assert_eq!(json["end"], "2024-06-21T13:00:00+0200");
        assert_eq!(json["timezone"], "Europe/Amsterdam");
        assert!(json["result"]["watt"]["South"].is_object());
    }

    #[tokio::test]
    async fn clearsky_explicit_window() {
        let app = router(make_test_state());
        let body = r#"{"start":"2024-06-21T10:00:00Z","end":"2024-06-21T12:00:00Z"}"#;
        let resp = app.oneshot(post("/clearsky/all/30Min", body)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        let watt = json["result"]["watt"]["Total"].as_object().unwrap();
        assert_eq!(watt.len(), 5);
        assert_eq!(json["end"], "2024-06-21T14:00:00+0200");
    }

    #[tokio::test]
    async fn unsupported_interval_returns_400() {
        let app = router(make_test_state());
        let resp = app.oneshot(post("/clearsky/South/1M", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = json_body(resp).await;
        assert!(json["error"].as_str().unwrap().contains("1M"));
    }

    #[tokio::test]
    async fn daily_interval_returns_400() {
        let app = router(make_test_state());
        let resp = app.oneshot(post("/clearsky/South/1D", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = json_body(resp).await;
        assert!(json["error"].as_str().unwrap().contains("<= 1H"));
    }

    #[tokio::test]
    async fn reversed_window_returns_400() {
        let app = router(make_test_state());
        let body = r#"{"start":"2024-06-21T12:00:00Z","end":"2024-06-21T10:00:00Z"}"#;
        let resp = app.oneshot(post("/clearsky/South/1H", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_returns_400() {
        let app = router(make_test_state());
        let resp = app
            .oneshot(post("/clearsky/South/1H", "{\"start\": 12"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_plant_returns_404() {
        let app = router(make_test_state());
        let resp = app.oneshot(post("/clearsky/Carport/1H", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = json_body(resp).await;
        assert!(json.get("columns").is_none());
    }

    #[tokio::test]
    async fn plants_lists_config_order() {
        let app = router(make_test_state());
        let req = Request::builder()
            .uri("/plants")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json, serde_json::json!(["EastWest", "South"]));
    }
}
