use crate::cli::ServeArgs;
use crate::infra::{AppState, Infrastructure};
use crate::routes::with_proofing_routes;
use crate::worker::run_worker;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use idv_proofing::config::AppConfig;
use idv_proofing::error::AppError;
use idv_proofing::jobs::TracingTelemetry;
use idv_proofing::proofing::mock::MockVendorConfig;
use idv_proofing::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let mock = MockVendorConfig::with_fixture(args.mock_fixture.unwrap_or_default());
    let (infra, receiver) =
        Infrastructure::in_memory(&config.proofing, mock, Arc::new(TracingTelemetry));
    infra.seed_development_accounts();
    warn!(fixture = ?mock.fixture, "proofing against mock vendors with in-memory storage");

    let worker = tokio::spawn(run_worker(
        infra.runner.clone(),
        infra.queue.clone(),
        receiver,
    ));

    let app = with_proofing_routes(infra.proofing_api())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        resolution_vendor = ?config.proofing.resolution_vendor,
        "identity proofing worker ready"
    );

    axum::serve(listener, app).await?;
    worker.abort();
    Ok(())
}
