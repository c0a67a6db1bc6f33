// Namespace HTTP routes

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use sightline_core::execution::ListNamespacesRequest;
use sightline_core::{pagination, NamespacePage, WorkflowService};
use std::sync::Arc;
use utoipa::IntoParams;

use super::common::ApiError;
use crate::auth::RequestAccess;

/// App state for namespace routes
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn WorkflowService>,
    pub page_size: u32,
}

impl AppState {
    pub fn new(service: Arc<dyn WorkflowService>, page_size: u32) -> Self {
        Self { service, page_size }
    }
}

/// Query parameters for paged lists
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Continuation token from the previous page (base64)
    pub next_page_token: Option<String>,
}

/// Create namespace routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/namespaces", get(list_namespaces))
        .route("/api/namespaces/:namespace", get(describe_namespace))
        .with_state(state)
}

/// GET /api/namespaces - One page of namespaces
#[utoipa::path(
    get,
    path = "/api/namespaces",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of namespaces", body = NamespacePage),
        (status = 503, description = "Backend unavailable", body = super::ErrorResponse)
    ),
    tag = "namespaces"
)]
pub async fn list_namespaces(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Query(query): Query<PageQuery>,
) -> Result<Json<NamespacePage>, ApiError> {
    let request = ListNamespacesRequest {
        page_size: state.page_size,
        next_page_token: pagination::decode(query.next_page_token.as_deref()),
    };
    let page = state.service.list_namespaces(&ctx, request).await?;
    Ok(Json(page))
}

/// GET /api/namespaces/:namespace - Namespace descriptor
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}",
    params(("namespace" = String, Path, description = "Namespace name")),
    responses(
        (status = 200, description = "Namespace descriptor", content_type = "application/json"),
        (status = 404, description = "Namespace not found", body = super::ErrorResponse)
    ),
    tag = "namespaces"
)]
pub async fn describe_namespace(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path(namespace): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let descriptor = state.service.describe_namespace(&ctx, &namespace).await?;
    Ok(Json(descriptor))
}
