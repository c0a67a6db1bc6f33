// Task queue HTTP routes

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use sightline_core::{MergedPollers, PollerService, TaskQueueDescription, WorkflowService};
use std::sync::Arc;

use super::common::ApiError;
use crate::auth::RequestAccess;

/// App state for task queue routes
#[derive(Clone)]
pub struct AppState {
    pub pollers: Arc<PollerService>,
}

impl AppState {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self {
            pollers: Arc::new(PollerService::new(service)),
        }
    }
}

/// Create task queue routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/namespaces/:namespace/task-queues/:task_queue/pollers",
            get(list_pollers),
        )
        .route(
            "/api/namespaces/:namespace/task-queues/:task_queue/",
            get(describe_task_queue),
        )
        .route(
            "/api/namespaces/:namespace/task-queues/:task_queue",
            get(describe_task_queue),
        )
        .with_state(state)
}

/// GET /api/namespaces/:namespace/task-queues/:task_queue/pollers - Pollers merged by identity
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/task-queues/{task_queue}/pollers",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("task_queue" = String, Path, description = "Task queue name")
    ),
    responses(
        (status = 200, description = "Pollers keyed by identity", body = std::collections::BTreeMap<String, sightline_core::MergedPoller>),
        (status = 503, description = "Backend unavailable", body = super::ErrorResponse)
    ),
    tag = "task-queues"
)]
pub async fn list_pollers(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path((namespace, task_queue)): Path<(String, String)>,
) -> Result<Json<MergedPollers>, ApiError> {
    let merged = state.pollers.merged(&ctx, &namespace, &task_queue).await?;
    Ok(Json(merged))
}

/// GET /api/namespaces/:namespace/task-queues/:task_queue/ - Activity then workflow pollers, unmerged
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/task-queues/{task_queue}/",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("task_queue" = String, Path, description = "Task queue name")
    ),
    responses(
        (status = 200, description = "Combined poller list", body = TaskQueueDescription),
        (status = 503, description = "Backend unavailable", body = super::ErrorResponse)
    ),
    tag = "task-queues"
)]
pub async fn describe_task_queue(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path((namespace, task_queue)): Path<(String, String)>,
) -> Result<Json<TaskQueueDescription>, ApiError> {
    let combined = state.pollers.combined(&ctx, &namespace, &task_queue).await?;
    Ok(Json(combined))
}
