// Dashboard settings and cluster info routes
// Decision: The identity provider is external; /api/me only reports whether auth is on

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::Value;
use sightline_core::WorkflowService;
use std::sync::Arc;
use utoipa::ToSchema;

use super::common::ApiError;
use crate::auth::RequestAccess;

/// App state for settings routes
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn WorkflowService>,
    pub permit_write_api: bool,
    pub auth_enabled: bool,
}

impl AppState {
    pub fn new(service: Arc<dyn WorkflowService>, permit_write_api: bool, auth_enabled: bool) -> Self {
        Self {
            service,
            permit_write_api,
            auth_enabled,
        }
    }
}

/// Settings the dashboard reads on load
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebSettings {
    #[schema(example = "OK")]
    pub health: &'static str,
    /// Whether terminate and signal are available
    pub permit_write_api: bool,
}

/// The current user, as far as the gateway knows
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub is_auth_enabled: bool,
    /// Always null; user details come from the identity provider
    #[schema(value_type = Option<Object>)]
    pub user: Option<Value>,
}

/// Create settings routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/web-settings", get(web_settings))
        .route("/api/me", get(current_user))
        .route("/api/cluster/version-info", get(version_info))
        .with_state(state)
}

/// GET /api/web-settings - Dashboard settings
#[utoipa::path(
    get,
    path = "/api/web-settings",
    responses((status = 200, description = "Dashboard settings", body = WebSettings)),
    tag = "settings"
)]
pub async fn web_settings(State(state): State<AppState>) -> Json<WebSettings> {
    Json(WebSettings {
        health: "OK",
        permit_write_api: state.permit_write_api,
    })
}

/// GET /api/me - Authentication status
#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Authentication status", body = CurrentUser)),
    tag = "settings"
)]
pub async fn current_user(State(state): State<AppState>) -> Json<CurrentUser> {
    Json(CurrentUser {
        is_auth_enabled: state.auth_enabled,
        user: None,
    })
}

/// GET /api/cluster/version-info - Cluster version information
#[utoipa::path(
    get,
    path = "/api/cluster/version-info",
    responses(
        (status = 200, description = "Cluster information from the backend", content_type = "application/json"),
        (status = 503, description = "Backend unavailable", body = super::ErrorResponse)
    ),
    tag = "settings"
)]
pub async fn version_info(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
) -> Result<Json<Value>, ApiError> {
    let info = state.service.get_cluster_info(&ctx).await?;
    Ok(Json(info))
}
