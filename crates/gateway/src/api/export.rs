// Streamed history export route
// Decision: The exporter runs in its own task and writes into a bounded channel that backs the body
// Decision: The status line is only committed once the first page was fetched
// Decision: A failure after output began ends the body with an error, so the connection is aborted
//
// The channel is the backpressure point: when the client reads slowly the
// channel fills, the sink's write waits, and the next page is not fetched.
// A client disconnect drops the receiver; the export task notices through
// Sender::closed() and drops the in-flight backend call.

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use sightline_core::{
    AccessContext, ExportError, ExportSink, HistoryExporter, RpcError, SinkClosed,
    WorkflowExecution, WorkflowService,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use super::common::ApiError;
use crate::auth::RequestAccess;

/// Chunks buffered between the exporter and the response body
const EXPORT_CHANNEL_CAPACITY: usize = 4;

/// How long an abort waits for room in a full channel
const ABORT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

type Chunk = Result<Bytes, io::Error>;

/// App state for export routes
#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<HistoryExporter>,
}

impl AppState {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self {
            exporter: Arc::new(HistoryExporter::new(service)),
        }
    }
}

/// Create export routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/namespaces/:namespace/workflows/:workflow_id/:run_id/export",
            get(export_history),
        )
        .with_state(state)
}

// ============================================================================
// ChannelSink - ExportSink over the response body channel
// ============================================================================

/// Sink that feeds the response body.
///
/// The first write also reports success through `started`, which is what lets
/// the handler commit the 200 status.
struct ChannelSink {
    tx: mpsc::Sender<Chunk>,
    started: Option<oneshot::Sender<Result<(), RpcError>>>,
}

impl ChannelSink {
    fn new(tx: mpsc::Sender<Chunk>, started: oneshot::Sender<Result<(), RpcError>>) -> Self {
        Self {
            tx,
            started: Some(started),
        }
    }

    /// Report a failure that happened before any output
    fn fail_before_output(&mut self, error: RpcError) {
        if let Some(started) = self.started.take() {
            let _ = started.send(Err(error));
        }
    }
}

#[async_trait]
impl ExportSink for ChannelSink {
    async fn write(&mut self, chunk: String) -> Result<(), SinkClosed> {
        if let Some(started) = self.started.take() {
            started.send(Ok(())).map_err(|_| SinkClosed)?;
        }
        self.tx
            .send(Ok(Bytes::from(chunk)))
            .await
            .map_err(|_| SinkClosed)
    }

    async fn finalize(&mut self) -> Result<(), SinkClosed> {
        // The body ends when the last sender is dropped
        Ok(())
    }

    async fn abort(&mut self, reason: &ExportError) {
        let error = io::Error::other(reason.to_string());
        match tokio::time::timeout(ABORT_SEND_TIMEOUT, self.tx.send(Err(error))).await {
            Ok(_) => {}
            Err(_) => tracing::warn!(
                timeout_secs = ABORT_SEND_TIMEOUT.as_secs(),
                "Export body channel stayed full, closing without the error frame"
            ),
        }
    }
}

// ============================================================================
// Handler
// ============================================================================

/// GET /api/namespaces/:namespace/workflows/:workflow_id/:run_id/export - Full history as one JSON array
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/workflows/{workflow_id}/{run_id}/export",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("workflow_id" = String, Path, description = "Workflow ID"),
        ("run_id" = String, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "JSON array of all history events, streamed", content_type = "application/json"),
        (status = 404, description = "Execution not found", body = super::ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn export_history(
    State(state): State<AppState>,
    RequestAccess(ctx): RequestAccess,
    Path((namespace, workflow_id, run_id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let execution = WorkflowExecution::new(namespace, workflow_id, run_id);
    let (tx, rx) = mpsc::channel::<Chunk>(EXPORT_CHANNEL_CAPACITY);
    let (started_tx, started_rx) = oneshot::channel();

    tokio::spawn(run_export(
        state.exporter.clone(),
        ctx,
        execution.clone(),
        tx,
        started_tx,
    ));

    match started_rx.await {
        Ok(Ok(())) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(ReceiverStream::new(rx)))
            .map_err(|e| ApiError::internal(format!("Failed to build export response: {}", e))),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ApiError::internal(format!(
            "History export for {} ended before producing output",
            execution
        ))),
    }
}

/// Drive one export until it completes or the client goes away
async fn run_export(
    exporter: Arc<HistoryExporter>,
    ctx: AccessContext,
    execution: WorkflowExecution,
    tx: mpsc::Sender<Chunk>,
    started: oneshot::Sender<Result<(), RpcError>>,
) {
    let watcher = tx.clone();
    let export = async {
        let mut sink = ChannelSink::new(tx, started);
        match exporter.export(&ctx, &execution, &mut sink).await {
            Err(ExportError::Rpc(e)) => {
                sink.fail_before_output(e);
                None
            }
            other => Some(other),
        }
    };

    tokio::select! {
        outcome = export => match outcome {
            Some(Ok(summary)) => tracing::debug!(
                execution = %execution,
                pages = summary.pages,
                events = summary.events,
                "History export completed"
            ),
            Some(Err(ExportError::SinkClosed(_))) => tracing::info!(
                execution = %execution,
                "History export cancelled: client disconnected"
            ),
            // Truncation is logged by the exporter; failures before output became the error response
            Some(Err(_)) | None => {}
        },
        _ = watcher.closed() => tracing::info!(
            execution = %execution,
            "History export cancelled: client disconnected"
        ),
    }
}
