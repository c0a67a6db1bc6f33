// Backend collaborator trait
//
// The orchestration cluster is reached through WorkflowService. The gateway
// constructs exactly one implementation at start-up and shares it read-only
// (Arc<dyn WorkflowService>) across all concurrent requests:
// - HttpWorkflowService in the gateway crate talks to the real backend
// - InMemoryWorkflowService in `memory` scripts responses for tests

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::error::RpcError;
use crate::execution::{
    HistoryPage, HistoryRequest, ListNamespacesRequest, NamespacePage, QueryListRequest,
    QueryRequest, TaskQueueDescription, TaskQueueDescriptor, TimeRangeListRequest,
    WorkflowExecution, WorkflowPage,
};

/// Result type for backend calls
pub type RpcResult<T> = std::result::Result<T, RpcError>;

/// Per-request credential forwarded to the backend.
///
/// Authentication itself is external; an absent token means the request is
/// forwarded anonymously.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AccessContext {
    pub access_token: Option<String>,
}

impl AccessContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
        }
    }
}

// Never print the credential
impl fmt::Debug for AccessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessContext")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Operations the gateway needs from the orchestration backend
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn list_namespaces(
        &self,
        ctx: &AccessContext,
        request: ListNamespacesRequest,
    ) -> RpcResult<NamespacePage>;

    async fn describe_namespace(&self, ctx: &AccessContext, namespace: &str) -> RpcResult<Value>;

    async fn list_open_workflows(
        &self,
        ctx: &AccessContext,
        request: TimeRangeListRequest,
    ) -> RpcResult<WorkflowPage>;

    async fn list_closed_workflows(
        &self,
        ctx: &AccessContext,
        request: TimeRangeListRequest,
    ) -> RpcResult<WorkflowPage>;

    /// List executions matching a free-form visibility query
    async fn list_workflows(
        &self,
        ctx: &AccessContext,
        request: QueryListRequest,
    ) -> RpcResult<WorkflowPage>;

    async fn list_archived_workflows(
        &self,
        ctx: &AccessContext,
        request: QueryListRequest,
    ) -> RpcResult<WorkflowPage>;

    async fn get_history(
        &self,
        ctx: &AccessContext,
        request: HistoryRequest,
    ) -> RpcResult<HistoryPage>;

    /// Page through history for a full export
    async fn export_history(
        &self,
        ctx: &AccessContext,
        request: HistoryRequest,
    ) -> RpcResult<HistoryPage> {
        self.get_history(ctx, request).await
    }

    async fn query_workflow(&self, ctx: &AccessContext, request: QueryRequest)
        -> RpcResult<Value>;

    async fn terminate_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        reason: Option<String>,
    ) -> RpcResult<Value>;

    async fn signal_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        signal_name: &str,
    ) -> RpcResult<Value>;

    async fn describe_workflow(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
    ) -> RpcResult<Value>;

    async fn describe_task_queue(
        &self,
        ctx: &AccessContext,
        queue: &TaskQueueDescriptor,
    ) -> RpcResult<TaskQueueDescription>;

    async fn get_cluster_info(&self, ctx: &AccessContext) -> RpcResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_context_debug_hides_token() {
        let ctx = AccessContext::with_token("secret-token");
        let printed = format!("{:?}", ctx);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("***"));
    }
}
