// Sightline Gateway Library
// Decision: Shared library for binaries (gateway server, export-openapi) and router tests

// API routes and types
pub mod api;

// Access context extraction
pub mod auth;

// Temporal HTTP API client
pub mod client;

// Environment configuration
pub mod config;

// OpenAPI spec generation
pub mod openapi;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use sightline_core::WorkflowService;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use client::HttpWorkflowService;
pub use config::GatewayConfig;

/// Per-process settings the routes need
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub permit_write_api: bool,
    pub auth_enabled: bool,
    pub namespace_page_size: u32,
}

impl From<&GatewayConfig> for GatewaySettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            permit_write_api: config.permit_write_api(),
            auth_enabled: config.auth_enabled(),
            namespace_page_size: config.namespace_page_size(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// API routes only, without health or Swagger UI
pub fn api_routes(service: Arc<dyn WorkflowService>, settings: &GatewaySettings) -> Router {
    let namespaces_state =
        api::namespaces::AppState::new(service.clone(), settings.namespace_page_size);
    let workflows_state = api::workflows::AppState::new(service.clone(), settings.permit_write_api);
    let export_state = api::export::AppState::new(service.clone());
    let task_queues_state = api::task_queues::AppState::new(service.clone());
    let settings_state =
        api::settings::AppState::new(service, settings.permit_write_api, settings.auth_enabled);

    Router::new()
        .merge(api::namespaces::routes(namespaces_state))
        .merge(api::workflows::routes(workflows_state))
        .merge(api::export::routes(export_state))
        .merge(api::task_queues::routes(task_queues_state))
        .merge(api::settings::routes(settings_state))
}

/// Full application router: health, API routes and Swagger UI
pub fn app(service: Arc<dyn WorkflowService>, settings: &GatewaySettings) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes(service, settings))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", openapi::ApiDoc::openapi()))
}
