use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryQualityRepository};
use crate::routes::with_quality_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use call_qc::config::AppConfig;
use call_qc::error::AppError;
use call_qc::telemetry;
use call_qc::workflows::quality::{
    DisabledScriptModel, HttpScriptModel, QualityService, ScriptEvaluator, ScriptModel,
};
use tracing::info;

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

    // Without an API key every script evaluation degrades to the all-null
    // verdict; deterministic scoring still runs.
    let model: Box<dyn ScriptModel> = match config.model.api_key.as_deref() {
        Some(key) => Box::new(HttpScriptModel::new(
            config.model.base_url.clone(),
            config.model.model.clone(),
            key,
        )),
        None => Box::new(DisabledScriptModel),
    };

    let repository = Arc::new(InMemoryQualityRepository::seeded());
    let service = Arc::new(QualityService::new(repository, ScriptEvaluator::new(model)));

    let app = with_quality_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "call quality control service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
