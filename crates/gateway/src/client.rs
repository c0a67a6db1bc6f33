// HTTP client for the Temporal frontend's HTTP/JSON API
// Decision: One reqwest::Client per process (connection pool shared by all requests)
// Decision: Backend failures become RpcError with the gRPC code the frontend reports
// Decision: No overall request timeout - history long-polls are open-ended; only connect is bounded
//
// Open/closed listing is expressed as visibility queries because the HTTP API
// only exposes query listing:
// - open:   ExecutionStatus = "Running" and StartTime in range
// - closed: CloseTime in range, plus the requested status or != "Running"

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use sightline_core::execution::{
    ListNamespacesRequest, QueryListRequest, QueryRequest, TaskQueueDescriptor,
    TimeRangeListRequest,
};
use sightline_core::listing::{TimeRange, VisibilityQuery};
use sightline_core::{
    AccessContext, ExecutionState, HistoryPage, HistoryRequest, NamespacePage, PageToken,
    RpcError, RpcErrorKind, RpcResult, TaskQueueDescription, WorkflowExecution, WorkflowPage,
    WorkflowService,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WorkflowService backed by the Temporal HTTP API
pub struct HttpWorkflowService {
    base_url: Url,
    identity: String,
    http: reqwest::Client,
}

impl HttpWorkflowService {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: &str, identity: impl Into<String>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid Temporal HTTP address: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Temporal HTTP address cannot be a base URL: {}", base_url);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            identity: identity.into(),
            http,
        })
    }

    /// `<base>/api/v1/<segments...>`, each segment percent-encoded
    fn url(&self, segments: &[&str]) -> RpcResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RpcError::new(RpcErrorKind::Internal, "backend address cannot be a base URL"))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn workflow_url(&self, execution: &WorkflowExecution, tail: &[&str]) -> RpcResult<Url> {
        let mut segments = vec![
            "namespaces",
            execution.namespace.as_str(),
            "workflows",
            execution.workflow_id.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    fn authorize(builder: RequestBuilder, ctx: &AccessContext) -> RequestBuilder {
        match &ctx.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        ctx: &AccessContext,
        url: Url,
        query: &[(&str, String)],
    ) -> RpcResult<T> {
        tracing::debug!(method = "GET", path = %url.path(), "Calling backend");
        let request = Self::authorize(self.http.get(url).query(query), ctx);
        read_response(request.send().await.map_err(transport_error)?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        ctx: &AccessContext,
        url: Url,
        body: &B,
    ) -> RpcResult<T> {
        tracing::debug!(method = "POST", path = %url.path(), "Calling backend");
        let request = Self::authorize(self.http.post(url).json(body), ctx);
        read_response(request.send().await.map_err(transport_error)?).await
    }

    async fn list_by_query(
        &self,
        ctx: &AccessContext,
        resource: &str,
        namespace: &str,
        query: Option<String>,
        next_page_token: Option<PageToken>,
    ) -> RpcResult<WorkflowPage> {
        let url = self.url(&["namespaces", namespace, resource])?;
        let mut params = Vec::new();
        if let Some(query) = query {
            params.push(("query", query));
        }
        push_token(&mut params, next_page_token.as_ref());
        self.get(ctx, url, &params).await
    }
}

fn push_token(params: &mut Vec<(&str, String)>, token: Option<&PageToken>) {
    if let Some(token) = token {
        params.push(("nextPageToken", token.encode()));
    }
}

/// Visibility query equivalent of an open or closed time-range listing
pub fn time_range_query(state: ExecutionState, request: &TimeRangeListRequest) -> String {
    let range = TimeRange {
        start: request.start_time,
        end: request.end_time,
    };
    let query = match state {
        ExecutionState::Open => {
            // Open executions are Running by definition
            if let Some(status) = request.status.as_deref() {
                tracing::debug!(
                    namespace = %request.namespace,
                    status = %status,
                    "Ignoring status filter on open workflow listing"
                );
            }
            VisibilityQuery::new()
                .eq("ExecutionStatus", Some("Running"))
                .time_range("StartTime", &range)
        }
        ExecutionState::Closed => {
            let query = VisibilityQuery::new().time_range("CloseTime", &range);
            match request.status.as_deref() {
                Some(status) => query.eq("ExecutionStatus", Some(status)),
                None => query.not_eq("ExecutionStatus", "Running"),
            }
        }
    };
    query
        .eq("WorkflowID", request.execution_filter.as_deref())
        .eq("WorkflowType", request.type_filter.as_deref())
        .build()
}

// ============================================================================
// Response and error mapping
// ============================================================================

/// Error body of the Temporal HTTP API (a google.rpc.Status)
#[derive(Debug, Deserialize)]
struct StatusBody {
    code: Option<i64>,
    message: Option<String>,
}

async fn read_response<T: DeserializeOwned>(response: Response) -> RpcResult<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(backend_error(status.as_u16(), &body));
    }

    serde_json::from_slice(&body).map_err(|e| {
        RpcError::new(
            RpcErrorKind::Internal,
            format!("Invalid response from backend: {}", e),
        )
    })
}

/// Map a non-2xx response to an RpcError
pub fn backend_error(status: u16, body: &[u8]) -> RpcError {
    match serde_json::from_slice::<StatusBody>(body) {
        Ok(StatusBody {
            code: Some(code),
            message,
        }) if code != 0 => RpcError::new(
            RpcErrorKind::from_grpc_code(code),
            message.unwrap_or_default(),
        ),
        Ok(StatusBody {
            message: Some(message),
            ..
        }) => RpcError::new(RpcErrorKind::from_http_status(status), message),
        _ => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            let message = if text.is_empty() {
                format!("Backend returned HTTP {}", status)
            } else {
                text
            };
            RpcError::new(RpcErrorKind::from_http_status(status), message)
        }
    }
}

fn transport_error(e: reqwest::Error) -> RpcError {
    let kind = if e.is_timeout() {
        RpcErrorKind::DeadlineExceeded
    } else if e.is_connect() || e.is_request() {
        RpcErrorKind::Unavailable
    } else {
        RpcErrorKind::Internal
    };
    tracing::warn!(error = %e, kind = %kind, "Backend transport failure");
    RpcError::new(kind, e.to_string())
}

// ============================================================================
// WorkflowService implementation
// ============================================================================

#[async_trait]
impl WorkflowService for HttpWorkflowService {
    async fn list_namespaces(
        &self,
        ctx: &AccessContext,
        request: ListNamespacesRequest,
    ) -> RpcResult<NamespacePage> {
        let url = self.url(&["namespaces"])?;
        let mut params = vec![("pageSize", request.page_size.to_string())];
        push_token(&mut params, request.next_page_token.as_ref());
        self.get(ctx, url, &params).await
    }

    async fn describe_namespace(&self, ctx: &AccessContext, namespace: &str) -> RpcResult<Value> {
        let url = self.url(&["namespaces", namespace])?;
        self.get(ctx, url, &[]).await
    }

    async fn list_open_workflows(
        &self,
        ctx: &AccessContext,
        request: TimeRangeListRequest,
    ) -> RpcResult<WorkflowPage> {
        let query = time_range_query(ExecutionState::Open, &request);
        self.list_by_query(ctx, "workflows", &request.namespace, Some(query), request.next_page_token)
            .await
    }

    async fn list_closed_workflows(
        &self,
        ctx: &AccessContext,
        request: TimeRangeListRequest,
    ) -> RpcResult<WorkflowPage> {
        let query = time_range_query(ExecutionState::Closed, &request);
        self.list_by_query(ctx, "workflows", &request.namespace, Some(query), request.next_page_token)
            .await
    }

    async fn list_workflows(
        &self,
        ctx: &AccessContext,
        request: QueryListRequest,
    ) -> RpcResult<WorkflowPage> {
        self.list_by_query(ctx, "workflows", &request.namespace, request.query, request.next_page_token)
            .await
    }

    async fn list_archived_workflows(
        &self,
        ctx: &AccessContext,
        request: QueryListRequest,
    ) -> RpcResult<WorkflowPage> {
        self.list_by_query(
            ctx,
            "archived-workflows",
            &request.namespace,
            request.query,
            request.next_page_token,
        )
        .await
    }

    async fn get_history(
        &self,
        ctx: &AccessContext,
        request: HistoryRequest,
    ) -> RpcResult<HistoryPage> {
        let url = self.workflow_url(&request.execution, &["history"])?;
        let mut params = vec![("execution.runId", request.execution.run_id.clone())];
        push_token(&mut params, request.next_page_token.as_ref());
        if request.wait_for_new_event {
            params.push(("waitNewEvent", "true".to_string()));
        }
        self.get(ctx, url, &params).await
    }

    async fn query_workflow(
        &self,
        ctx: &AccessContext,
        request: QueryRequest,
    ) -> RpcResult<Value> {
        let url = self.workflow_url(&request.execution, &["query", request.query_type.as_str()])?;
        let body = json!({
            "execution": { "runId": request.execution.run_id },
            "query": { "queryType": request.query_type },
        });
        self.post(ctx, url, &body).await
    }

    async fn terminate_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        reason: Option<String>,
    ) -> RpcResult<Value> {
        let url = self.workflow_url(execution, &["terminate"])?;
        let body = json!({
            "workflowExecution": { "runId": execution.run_id },
            "reason": reason.unwrap_or_default(),
            "identity": self.identity,
        });
        self.post(ctx, url, &body).await
    }

    async fn signal_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        signal_name: &str,
    ) -> RpcResult<Value> {
        let url = self.workflow_url(execution, &["signal", signal_name])?;
        let body = json!({
            "workflowExecution": { "runId": execution.run_id },
            "identity": self.identity,
            "requestId": uuid::Uuid::now_v7().to_string(),
        });
        self.post(ctx, url, &body).await
    }

    async fn describe_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
    ) -> RpcResult<Value> {
        let url = self.workflow_url(execution, &[])?;
        self.get(ctx, url, &[("execution.runId", execution.run_id.clone())])
            .await
    }

    async fn describe_task_queue(
        &self,
        ctx: &AccessContext,
        queue: &TaskQueueDescriptor,
    ) -> RpcResult<TaskQueueDescription> {
        let url = self.url(&[
            "namespaces",
            queue.namespace.as_str(),
            "task-queues",
            queue.name.as_str(),
        ])?;
        let params = [("taskQueueType", queue.queue_type.as_proto_str().to_string())];
        self.get(ctx, url, &params).await
    }

    async fn get_cluster_info(&self, ctx: &AccessContext) -> RpcResult<Value> {
        let url = self.url(&["cluster-info"])?;
        self.get(ctx, url, &[]).await
    }
}
