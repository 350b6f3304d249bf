use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use idv_proofing::router::{proofing_router, ProofingApi};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_proofing_routes(api: Arc<ProofingApi>) -> axum::Router {
    proofing_router(api)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Infrastructure;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use idv_proofing::config::ProofingConfig;
    use idv_proofing::jobs::TracingTelemetry;
    use idv_proofing::proofing::mock::MockVendorConfig;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let (infra, _receiver) = Infrastructure::in_memory(
            &ProofingConfig::default(),
            MockVendorConfig::default(),
            Arc::new(TracingTelemetry),
        );
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_proofing_routes(infra.proofing_api()).layer(Extension(state))
    }

    async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app(false).oneshot(get("/health")).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_tracks_flag() {
        let initializing = app(false).oneshot(get("/ready")).await.expect("response");
        assert_eq!(initializing.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(read_json_body(initializing).await["status"], "initializing");

        let ready = app(true).oneshot(get("/ready")).await.expect("response");
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_flag_flips_at_runtime() {
        let flag = Arc::new(AtomicBool::new(false));
        let state = AppState {
            readiness: flag.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        flag.store(true, Ordering::Release);

        let response = readiness_endpoint(Extension(state)).await.into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_served_as_prometheus_text() {
        let response = app(true).oneshot(get("/metrics")).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn proofing_routes_are_mounted() {
        let response = app(true)
            .oneshot(get("/api/v1/proofing/results/unknown"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
