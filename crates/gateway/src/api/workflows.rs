// Workflow HTTP routes
//
// Listing, history paging, queries, write operations and the detail view.
// The streamed export lives in `export`.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use sightline_core::{
    pagination, ExecutionState, HistoryPage, HistoryRequest, ListParams, ListService,
    QueryService, WorkflowDescription, WorkflowExecution, WorkflowPage, WorkflowResolver,
    WorkflowService,
};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use super::common::ApiError;
use crate::auth::RequestAccess;

/// App state for workflow routes
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn WorkflowService>,
    pub lists: Arc<ListService>,
    pub queries: Arc<QueryService>,
    pub resolver: Arc<WorkflowResolver>,
    /// Terminate and signal are refused when false
    pub permit_write_api: bool,
}

impl AppState {
    pub fn new(service: Arc<dyn WorkflowService>, permit_write_api: bool) -> Self {
        Self {
            lists: Arc::new(ListService::new(service.clone())),
            queries: Arc::new(QueryService::new(service.clone())),
            resolver: Arc::new(WorkflowResolver::new(service.clone())),
            service,
            permit_write_api,
        }
    }

    fn require_write_api(&self) -> Result<(), ApiError> {
        if self.permit_write_api {
            Ok(())
        } else {
            Err(ApiError::forbidden("Write API is disabled"))
        }
    }
}

/// Query parameters for history paging
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Continuation token from the previous page (base64)
    pub next_page_token: Option<String>,
    /// Present (any value) to long-poll for the next event
    pub wait_for_new_event: Option<String>,
}

/// Request body for terminating a workflow
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TerminateRequest {
    /// Recorded in the execution's history
    #[schema(example = "Stuck on a bad deploy")]
    pub reason: Option<String>,
}

/// Path of one execution
type ExecutionPath = Path<(String, String, String)>;

fn execution(Path((namespace, workflow_id, run_id)): ExecutionPath) -> WorkflowExecution {
    WorkflowExecution::new(namespace, workflow_id, run_id)
}

/// Create workflow routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/namespaces/:namespace/workflows/open", get(list_open))
        .route("/api/namespaces/:namespace/workflows/closed", get(list_closed))
        .route("/api/namespaces/:namespace/workflows/list", get(list_by_query))
        .route("/api/namespaces/:namespace/workflows/archived", get(list_archived))
        .route(
            "/api/namespaces/:namespace/workflows/:workflow_id/:run_id",
            get(describe_workflow),
        )
        .route(
            "/api/namespaces/:namespace/workflows/:workflow_id/:run_id/history",
            get(get_history),
        )
        .route(
            "/api/namespaces/:namespace/workflows/:workflow_id/:run_id/query",
            get(list_query_types),
        )
        .route(
            "/api/namespaces/:namespace/workflows/:workflow_id/:run_id/query/:query_type",
            post(run_query),
        )
        .route(
            "/api/namespaces/:namespace/workflows/:workflow_id/:run_id/terminate",
            post(terminate_workflow),
        )
        .route(
            "/api/namespaces/:namespace/workflows/:workflow_id/:run_id/signal/:signal",
            post(signal_workflow),
        )
        .with_state(state)
}

// ============================================================================
// Listing
// ============================================================================

/// GET /api/namespaces/:namespace/workflows/open - Running executions started in a time range
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/workflows/open",
    params(("namespace" = String, Path, description = "Namespace name"), ListParams),
    responses(
        (status = 200, description = "Page of executions", body = WorkflowPage),
        (status = 400, description = "Missing or invalid time range", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn list_open(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path(namespace): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<WorkflowPage>, ApiError> {
    let page = state
        .lists
        .list_by_time_range(&ctx, ExecutionState::Open, &namespace, &params)
        .await?;
    Ok(Json(page))
}

/// GET /api/namespaces/:namespace/workflows/closed - Executions closed in a time range
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/workflows/closed",
    params(("namespace" = String, Path, description = "Namespace name"), ListParams),
    responses(
        (status = 200, description = "Page of executions", body = WorkflowPage),
        (status = 400, description = "Missing or invalid time range", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn list_closed(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path(namespace): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<WorkflowPage>, ApiError> {
    let page = state
        .lists
        .list_by_time_range(&ctx, ExecutionState::Closed, &namespace, &params)
        .await?;
    Ok(Json(page))
}

/// GET /api/namespaces/:namespace/workflows/list - Executions matching a visibility query
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/workflows/list",
    params(("namespace" = String, Path, description = "Namespace name"), ListParams),
    responses(
        (status = 200, description = "Page of executions", body = WorkflowPage),
        (status = 400, description = "Invalid query", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn list_by_query(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path(namespace): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<WorkflowPage>, ApiError> {
    let page = state.lists.list_by_query(&ctx, &namespace, &params).await?;
    Ok(Json(page))
}

/// GET /api/namespaces/:namespace/workflows/archived - Archived executions
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/workflows/archived",
    params(("namespace" = String, Path, description = "Namespace name"), ListParams),
    responses(
        (status = 200, description = "Page of archived executions", body = WorkflowPage),
        (status = 400, description = "No query and no valid time range", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn list_archived(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path(namespace): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<WorkflowPage>, ApiError> {
    let page = state.lists.list_archived(&ctx, &namespace, &params).await?;
    Ok(Json(page))
}

// ============================================================================
// Single execution
// ============================================================================

/// GET /api/namespaces/:namespace/workflows/:workflow_id/:run_id - Execution details
///
/// Falls back to a summary rebuilt from history when the execution is archived.
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/workflows/{workflow_id}/{run_id}",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("workflow_id" = String, Path, description = "Workflow ID"),
        ("run_id" = String, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Live descriptor or archived summary", content_type = "application/json"),
        (status = 404, description = "Execution not found", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn describe_workflow(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    path: ExecutionPath,
) -> Result<Json<WorkflowDescription>, ApiError> {
    let execution = execution(path);
    let description = state.resolver.describe(&ctx, &execution).await?;
    Ok(Json(description))
}

/// GET /api/namespaces/:namespace/workflows/:workflow_id/:run_id/history - One page of history
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/workflows/{workflow_id}/{run_id}/history",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("workflow_id" = String, Path, description = "Workflow ID"),
        ("run_id" = String, Path, description = "Run ID"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Page of history events", body = HistoryPage),
        (status = 404, description = "Execution not found", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn get_history(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    path: ExecutionPath,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let request = HistoryRequest {
        execution: execution(path),
        next_page_token: pagination::decode(query.next_page_token.as_deref()),
        wait_for_new_event: query.wait_for_new_event.is_some(),
    };
    let page = state.service.get_history(&ctx, request).await?;
    Ok(Json(page))
}

/// GET /api/namespaces/:namespace/workflows/:workflow_id/:run_id/query - Supported query types
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/workflows/{workflow_id}/{run_id}/query",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("workflow_id" = String, Path, description = "Workflow ID"),
        ("run_id" = String, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Query type names", body = Vec<String>),
        (status = 500, description = "Query types could not be listed", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn list_query_types(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    path: ExecutionPath,
) -> Result<Json<Vec<String>>, ApiError> {
    let execution = execution(path);
    let types = state.queries.discover_query_types(&ctx, &execution).await?;
    Ok(Json(types))
}

/// POST /api/namespaces/:namespace/workflows/:workflow_id/:run_id/query/:query_type - Run a query
#[utoipa::path(
    post,
    path = "/api/namespaces/{namespace}/workflows/{workflow_id}/{run_id}/query/{query_type}",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("workflow_id" = String, Path, description = "Workflow ID"),
        ("run_id" = String, Path, description = "Run ID"),
        ("query_type" = String, Path, description = "Registered query handler name")
    ),
    responses(
        (status = 200, description = "Query result", content_type = "application/json"),
        (status = 400, description = "Unknown query type", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn run_query(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path((namespace, workflow_id, run_id, query_type)): Path<(String, String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let execution = WorkflowExecution::new(namespace, workflow_id, run_id);
    let result = state.queries.query(&ctx, &execution, &query_type).await?;
    Ok(Json(result))
}

/// POST /api/namespaces/:namespace/workflows/:workflow_id/:run_id/terminate - Terminate an execution
#[utoipa::path(
    post,
    path = "/api/namespaces/{namespace}/workflows/{workflow_id}/{run_id}/terminate",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("workflow_id" = String, Path, description = "Workflow ID"),
        ("run_id" = String, Path, description = "Run ID")
    ),
    request_body = TerminateRequest,
    responses(
        (status = 200, description = "Execution terminated", content_type = "application/json"),
        (status = 403, description = "Write API disabled", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn terminate_workflow(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    path: ExecutionPath,
    body: Option<Json<TerminateRequest>>,
) -> Result<Json<Value>, ApiError> {
    state.require_write_api()?;

    let execution = execution(path);
    let reason = body.and_then(|Json(req)| req.reason);
    tracing::info!(execution = %execution, reason = ?reason, "Terminating workflow");

    let result = state
        .service
        .terminate_workflow(&ctx, &execution, reason)
        .await?;
    Ok(Json(result))
}

/// POST /api/namespaces/:namespace/workflows/:workflow_id/:run_id/signal/:signal - Signal an execution
#[utoipa::path(
    post,
    path = "/api/namespaces/{namespace}/workflows/{workflow_id}/{run_id}/signal/{signal}",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("workflow_id" = String, Path, description = "Workflow ID"),
        ("run_id" = String, Path, description = "Run ID"),
        ("signal" = String, Path, description = "Signal name")
    ),
    responses(
        (status = 200, description = "Signal delivered", content_type = "application/json"),
        (status = 403, description = "Write API disabled", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn signal_workflow(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path((namespace, workflow_id, run_id, signal)): Path<(String, String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    state.require_write_api()?;

    let execution = WorkflowExecution::new(namespace, workflow_id, run_id);
    tracing::info!(execution = %execution, signal = %signal, "Signalling workflow");

    let result = state
        .service
        .signal_workflow(&ctx, &execution, &signal)
        .await?;
    Ok(Json(result))
}
