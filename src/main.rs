//! Main entry point for the pool balancer

use api_pool_balancer::{
    api,
    audit::{AuditLog, AuditSink, JsonFileAuditSink, TracingAuditSink},
    backend::registry::BackendRegistry,
    config::Settings,
    dispatch::Admission,
    gateway::{health::LivenessSet, HealthMonitor, ServerSelector},
    proxy::Forwarder,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));

    if settings.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    info!("Starting pool balancer");

    let settings = Arc::new(settings);

    // Backend registry: immutable for the process lifetime
    let registry = Arc::new(BackendRegistry::from_settings(&settings.pools)?);
    info!(
        pools = settings.pools.len(),
        backends = registry.backend_count(),
        "Loaded backend topology"
    );

    // Liveness set, seeded with every configured address
    let liveness = Arc::new(LivenessSet::seeded(&registry.all_addresses()));

    // Health monitor background task
    let health_monitor = Arc::new(HealthMonitor::new(
        registry.all_addresses(),
        liveness.clone(),
        &settings.health_check,
    )?);
    health_monitor.start().await;

    // Selector over the registry and liveness set
    let selector = Arc::new(ServerSelector::new(
        registry.clone(),
        liveness.clone(),
        settings.routing.algorithm,
    ));

    // Forwarder and admission discipline
    let forwarder = Arc::new(Forwarder::new(&settings.forward)?);
    let admission = Admission::from_settings(&settings, forwarder);

    // Audit emission
    let sink: Arc<dyn AuditSink> = match &settings.audit.path {
        Some(path) => Arc::new(JsonFileAuditSink::create(path.clone()).await?),
        None => Arc::new(TracingAuditSink),
    };
    let audit = AuditLog::new(sink);

    // Create application state
    let app_state = Arc::new(AppState {
        settings: settings.clone(),
        registry,
        liveness,
        selector,
        health_monitor,
        admission,
        audit,
    });

    // Build the router
    let app = api::create_router(app_state).await;

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!(
        algorithm = ?settings.routing.algorithm,
        "Load balancer listening on {}",
        addr
    );

    // Start the server; ConnectInfo feeds the audit client address
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
