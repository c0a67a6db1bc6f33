// In-memory WorkflowService for examples and testing
//
// Responses are scripted up front with the `with_*` builders; every call is
// recorded so tests can assert exactly what was forwarded to the backend.
// History pages are addressed by index: the continuation token for page N is
// the bytes `page-N`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::error::{RpcError, RpcErrorKind};
use crate::execution::{
    HistoryEvent, HistoryPage, HistoryRequest, ListNamespacesRequest, NamespacePage,
    PollerInfo, QueryListRequest, QueryRequest, TaskQueueDescription, TaskQueueDescriptor,
    TaskQueueType, TimeRangeListRequest, WorkflowExecution, WorkflowPage,
};
use crate::pagination::PageToken;
use crate::traits::{AccessContext, RpcResult, WorkflowService};

/// A call received by the in-memory service
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    ListNamespaces {
        page_size: u32,
        next_page_token: Option<PageToken>,
    },
    DescribeNamespace(String),
    ListOpen(TimeRangeListRequest),
    ListClosed(TimeRangeListRequest),
    ListByQuery(QueryListRequest),
    ListArchived(QueryListRequest),
    GetHistory {
        execution: WorkflowExecution,
        next_page_token: Option<PageToken>,
        wait_for_new_event: bool,
    },
    Query {
        execution: WorkflowExecution,
        query_type: String,
    },
    Terminate {
        execution: WorkflowExecution,
        reason: Option<String>,
    },
    Signal {
        execution: WorkflowExecution,
        signal_name: String,
    },
    DescribeWorkflow(WorkflowExecution),
    DescribeTaskQueue(TaskQueueDescriptor),
    ClusterInfo,
}

#[derive(Default)]
struct State {
    calls: Vec<RecordedCall>,
    access_tokens: Vec<Option<String>>,
    namespaces: Vec<Value>,
    workflow_page: WorkflowPage,
    histories: HashMap<String, Vec<RpcResult<Vec<HistoryEvent>>>>,
    stalled_pages: HashSet<(String, usize)>,
    describes: HashMap<String, RpcResult<Value>>,
    queries: HashMap<String, RpcResult<Value>>,
    pollers: HashMap<(String, TaskQueueType), RpcResult<Vec<Value>>>,
    cluster_info: Value,
}

/// Scriptable in-memory backend
#[derive(Default)]
pub struct InMemoryWorkflowService {
    state: Mutex<State>,
}

impl InMemoryWorkflowService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespaces returned (as one page) by `list_namespaces`
    pub fn with_namespaces(mut self, namespaces: Vec<Value>) -> Self {
        self.state.get_mut().namespaces = namespaces;
        self
    }

    /// Page returned by every workflow listing call
    pub fn with_workflow_page(mut self, page: WorkflowPage) -> Self {
        self.state.get_mut().workflow_page = page;
        self
    }

    /// History for a workflow id, one entry per backend page
    pub fn with_history(self, workflow_id: &str, pages: Vec<Vec<HistoryEvent>>) -> Self {
        self.with_history_pages(workflow_id, pages.into_iter().map(Ok).collect())
    }

    /// History pages where any page may fail
    pub fn with_history_pages(
        mut self,
        workflow_id: &str,
        pages: Vec<RpcResult<Vec<HistoryEvent>>>,
    ) -> Self {
        self.state
            .get_mut()
            .histories
            .insert(workflow_id.to_string(), pages);
        self
    }

    /// Make the fetch of one history page never complete
    pub fn with_stalled_history_page(mut self, workflow_id: &str, page: usize) -> Self {
        self.state
            .get_mut()
            .stalled_pages
            .insert((workflow_id.to_string(), page));
        self
    }

    /// Outcome of `describe_workflow` for a workflow id (default: NotFound)
    pub fn with_describe(mut self, workflow_id: &str, outcome: RpcResult<Value>) -> Self {
        self.state
            .get_mut()
            .describes
            .insert(workflow_id.to_string(), outcome);
        self
    }

    /// Outcome of `query_workflow` for a workflow id (default: NotFound)
    pub fn with_query(mut self, workflow_id: &str, outcome: RpcResult<Value>) -> Self {
        self.state
            .get_mut()
            .queries
            .insert(workflow_id.to_string(), outcome);
        self
    }

    /// Pollers reported for one half of a task queue (default: none)
    pub fn with_pollers(
        self,
        queue: &str,
        queue_type: TaskQueueType,
        pollers: RpcResult<Vec<PollerInfo>>,
    ) -> Self {
        let raw = pollers.map(|pollers| {
            pollers
                .iter()
                .filter_map(|poller| serde_json::to_value(poller).ok())
                .collect()
        });
        self.with_raw_pollers(queue, queue_type, raw)
    }

    /// Poller entries exactly as the backend would send them
    pub fn with_raw_pollers(
        mut self,
        queue: &str,
        queue_type: TaskQueueType,
        pollers: RpcResult<Vec<Value>>,
    ) -> Self {
        self.state
            .get_mut()
            .pollers
            .insert((queue.to_string(), queue_type), pollers);
        self
    }

    pub fn with_cluster_info(mut self, info: Value) -> Self {
        self.state.get_mut().cluster_info = info;
        self
    }

    /// All calls received so far, in order
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().await.calls.clone()
    }

    /// Access tokens seen so far, one per call
    pub async fn access_tokens(&self) -> Vec<Option<String>> {
        self.state.lock().await.access_tokens.clone()
    }

    async fn record(&self, ctx: &AccessContext, call: RecordedCall) {
        let mut state = self.state.lock().await;
        state.calls.push(call);
        state.access_tokens.push(ctx.access_token.clone());
    }

    fn page_token(index: usize) -> PageToken {
        PageToken::new(format!("page-{}", index).into_bytes())
    }

    fn page_index(token: Option<&PageToken>) -> RpcResult<usize> {
        let Some(token) = token else {
            return Ok(0);
        };
        std::str::from_utf8(token.as_bytes())
            .ok()
            .and_then(|s| s.strip_prefix("page-"))
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| RpcError::invalid_argument("invalid next page token"))
    }
}

#[async_trait]
impl WorkflowService for InMemoryWorkflowService {
    async fn list_namespaces(
        &self,
        ctx: &AccessContext,
        request: ListNamespacesRequest,
    ) -> RpcResult<NamespacePage> {
        self.record(
            ctx,
            RecordedCall::ListNamespaces {
                page_size: request.page_size,
                next_page_token: request.next_page_token,
            },
        )
        .await;
        Ok(NamespacePage {
            namespaces: self.state.lock().await.namespaces.clone(),
            next_page_token: None,
        })
    }

    async fn describe_namespace(&self, ctx: &AccessContext, namespace: &str) -> RpcResult<Value> {
        self.record(ctx, RecordedCall::DescribeNamespace(namespace.to_string()))
            .await;
        let state = self.state.lock().await;
        state
            .namespaces
            .iter()
            .find(|ns| ns["namespaceInfo"]["name"] == namespace)
            .cloned()
            .ok_or_else(|| RpcError::not_found(format!("Namespace {} is not found.", namespace)))
    }

    async fn list_open_workflows(
        &self,
        ctx: &AccessContext,
        request: TimeRangeListRequest,
    ) -> RpcResult<WorkflowPage> {
        self.record(ctx, RecordedCall::ListOpen(request)).await;
        Ok(self.state.lock().await.workflow_page.clone())
    }

    async fn list_closed_workflows(
        &self,
        ctx: &AccessContext,
        request: TimeRangeListRequest,
    ) -> RpcResult<WorkflowPage> {
        self.record(ctx, RecordedCall::ListClosed(request)).await;
        Ok(self.state.lock().await.workflow_page.clone())
    }

    async fn list_workflows(
        &self,
        ctx: &AccessContext,
        request: QueryListRequest,
    ) -> RpcResult<WorkflowPage> {
        self.record(ctx, RecordedCall::ListByQuery(request)).await;
        Ok(self.state.lock().await.workflow_page.clone())
    }

    async fn list_archived_workflows(
        &self,
        ctx: &AccessContext,
        request: QueryListRequest,
    ) -> RpcResult<WorkflowPage> {
        self.record(ctx, RecordedCall::ListArchived(request)).await;
        Ok(self.state.lock().await.workflow_page.clone())
    }

    async fn get_history(
        &self,
        ctx: &AccessContext,
        request: HistoryRequest,
    ) -> RpcResult<HistoryPage> {
        let index = Self::page_index(request.next_page_token.as_ref());
        let workflow_id = request.execution.workflow_id.clone();
        self.record(
            ctx,
            RecordedCall::GetHistory {
                execution: request.execution,
                next_page_token: request.next_page_token,
                wait_for_new_event: request.wait_for_new_event,
            },
        )
        .await;
        let index = index?;

        let stalled = self
            .state
            .lock()
            .await
            .stalled_pages
            .contains(&(workflow_id.clone(), index));
        if stalled {
            futures::future::pending::<()>().await;
        }

        let state = self.state.lock().await;
        let Some(pages) = state.histories.get(&workflow_id) else {
            return Ok(HistoryPage::default());
        };
        let page = pages
            .get(index)
            .ok_or_else(|| RpcError::invalid_argument("invalid next page token"))?
            .clone()?;
        let next = (index + 1 < pages.len()).then(|| Self::page_token(index + 1));
        Ok(HistoryPage::new(page, next))
    }

    async fn query_workflow(
        &self,
        ctx: &AccessContext,
        request: QueryRequest,
    ) -> RpcResult<Value> {
        let workflow_id = request.execution.workflow_id.clone();
        self.record(
            ctx,
            RecordedCall::Query {
                execution: request.execution,
                query_type: request.query_type,
            },
        )
        .await;
        self.state
            .lock()
            .await
            .queries
            .get(&workflow_id)
            .cloned()
            .unwrap_or_else(|| Err(RpcError::not_found("workflow execution not found")))
    }

    async fn terminate_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        reason: Option<String>,
    ) -> RpcResult<Value> {
        self.record(
            ctx,
            RecordedCall::Terminate {
                execution: execution.clone(),
                reason,
            },
        )
        .await;
        Ok(json!({}))
    }

    async fn signal_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        signal_name: &str,
    ) -> RpcResult<Value> {
        self.record(
            ctx,
            RecordedCall::Signal {
                execution: execution.clone(),
                signal_name: signal_name.to_string(),
            },
        )
        .await;
        Ok(json!({}))
    }

    async fn describe_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
    ) -> RpcResult<Value> {
        self.record(ctx, RecordedCall::DescribeWorkflow(execution.clone()))
            .await;
        self.state
            .lock()
            .await
            .describes
            .get(&execution.workflow_id)
            .cloned()
            .unwrap_or_else(|| {
                Err(RpcError::new(
                    RpcErrorKind::NotFound,
                    format!("workflow execution not found: {}", execution.workflow_id),
                ))
            })
    }

    async fn describe_task_queue(
        &self,
        ctx: &AccessContext,
        queue: &TaskQueueDescriptor,
    ) -> RpcResult<TaskQueueDescription> {
        self.record(ctx, RecordedCall::DescribeTaskQueue(queue.clone()))
            .await;
        let pollers = self
            .state
            .lock()
            .await
            .pollers
            .get(&(queue.name.clone(), queue.queue_type))
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(TaskQueueDescription { pollers })
    }

    async fn get_cluster_info(&self, ctx: &AccessContext) -> RpcResult<Value> {
        self.record(ctx, RecordedCall::ClusterInfo).await;
        Ok(self.state.lock().await.cluster_info.clone())
    }
}
