// Sightline gateway server
// Decision: One HttpWorkflowService is built at start-up and shared by every request
// Decision: CORS is only enabled when CORS_ALLOWED_ORIGINS is set (UI served from another origin)

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use sightline_core::WorkflowService;
use sightline_gateway::{app, GatewayConfig, GatewaySettings, HttpWorkflowService};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::from_env();

    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sightline_gateway=debug,sightline_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sightline-gateway starting...");

    let service: Arc<dyn WorkflowService> = Arc::new(
        HttpWorkflowService::new(&config.temporal_http_address(), config.identity())
            .context("Failed to create Temporal HTTP client")?,
    );

    let settings = GatewaySettings::from(&config);
    tracing::info!(
        temporal = %config.temporal_http_address(),
        identity = %config.identity(),
        permit_write_api = settings.permit_write_api,
        auth_enabled = settings.auth_enabled,
        namespace_page_size = settings.namespace_page_size,
        "Using Temporal HTTP API"
    );

    let cors_origins: Vec<HeaderValue> = config
        .cors_allowed_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    let app = app(service, &settings);

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::ORIGIN,
                    header::CACHE_CONTROL,
                ])
                .allow_credentials(true),
        )
    } else {
        app
    };

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
