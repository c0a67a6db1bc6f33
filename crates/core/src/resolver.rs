// Workflow detail resolution
//
// Primary path: describe the execution and return the backend's descriptor
// unchanged. When the backend reports NotFound the execution may still be
// archived: its history is fetched (first page only) and a summary is
// rebuilt from the first event. Pending activities and children cannot be
// recovered from history and are reported as null.
//
// Any other describe error propagates unchanged. If the fallback cannot
// produce a summary, the describe NotFound is returned.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{Result, RpcError};
use crate::execution::{HistoryRequest, WorkflowExecution};
use crate::traits::{AccessContext, WorkflowService};

const EXECUTION_TIMEOUT_KEYS: &[&str] = &[
    "executionStartToCloseTimeoutSeconds",
    "workflowExecutionTimeoutSeconds",
    "workflowExecutionTimeout",
];

const TASK_TIMEOUT_KEYS: &[&str] = &[
    "taskStartToCloseTimeoutSeconds",
    "workflowTaskTimeoutSeconds",
    "workflowTaskTimeout",
];

/// Workflow details, live or rebuilt from archived history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkflowDescription {
    /// Backend descriptor, unchanged
    Live(Value),
    Archived(ArchivedWorkflowDescription),
}

impl WorkflowDescription {
    pub fn is_archived(&self) -> bool {
        matches!(self, WorkflowDescription::Archived(_))
    }
}

/// Summary rebuilt from an archived execution's first history event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ArchivedWorkflowDescription {
    pub execution_config: ArchivedExecutionConfig,
    pub workflow_execution_info: ArchivedExecutionInfo,
    /// Always null: not recoverable from history
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Vec<Object>>))]
    pub pending_activities: Option<Vec<Value>>,
    /// Always null: not recoverable from history
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Vec<Object>>))]
    pub pending_children: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ArchivedExecutionConfig {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub task_queue: Option<Value>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub execution_start_to_close_timeout_seconds: Option<Value>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub task_start_to_close_timeout_seconds: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ArchivedExecutionInfo {
    pub execution: ExecutionRef,
    pub is_archived: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub start_time: Option<Value>,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub workflow_type: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ExecutionRef {
    pub run_id: String,
    pub workflow_id: String,
}

impl ArchivedWorkflowDescription {
    /// Build the summary from the first event of the execution's history.
    ///
    /// Returns `None` when the event has no attribute block to read from.
    pub fn from_first_event(execution: &WorkflowExecution, event: &Map<String, Value>) -> Option<Self> {
        let attributes = event_attributes(event)?;

        Some(Self {
            execution_config: ArchivedExecutionConfig {
                task_queue: attributes.get("taskQueue").cloned(),
                execution_start_to_close_timeout_seconds: first_of(attributes, EXECUTION_TIMEOUT_KEYS),
                task_start_to_close_timeout_seconds: first_of(attributes, TASK_TIMEOUT_KEYS),
            },
            workflow_execution_info: ArchivedExecutionInfo {
                execution: ExecutionRef {
                    run_id: execution.run_id.clone(),
                    workflow_id: execution.workflow_id.clone(),
                },
                is_archived: true,
                start_time: event.get("eventTime").cloned(),
                workflow_type: attributes.get("workflowType").cloned(),
            },
            pending_activities: None,
            pending_children: None,
        })
    }
}

/// The event's type-specific attribute block.
///
/// Accepts an already-mapped `details` object or the backend's
/// `<eventType>EventAttributes` field.
fn event_attributes(event: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if let Some(Value::Object(details)) = event.get("details") {
        return Some(details);
    }
    event
        .iter()
        .find(|(key, value)| key.ends_with("EventAttributes") && value.is_object())
        .and_then(|(_, value)| value.as_object())
}

fn first_of(attributes: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter().find_map(|key| attributes.get(*key).cloned())
}

/// Resolves workflow details with the archived-history fallback
pub struct WorkflowResolver {
    service: Arc<dyn WorkflowService>,
}

impl WorkflowResolver {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self { service }
    }

    pub async fn describe(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
    ) -> Result<WorkflowDescription> {
        match self.service.describe_workflow(ctx, execution).await {
            Ok(descriptor) => Ok(WorkflowDescription::Live(descriptor)),
            Err(error) if !error.is_not_found() => Err(error.into()),
            Err(not_found) => self.from_archived_history(ctx, execution, not_found).await,
        }
    }

    async fn from_archived_history(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        not_found: RpcError,
    ) -> Result<WorkflowDescription> {
        tracing::debug!(execution = %execution, "Describe returned NotFound, trying archived history");

        let page = match self
            .service
            .get_history(ctx, HistoryRequest::first_page(execution.clone()))
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(execution = %execution, error = %e, "Archived history unavailable");
                return Err(not_found.into());
            }
        };

        let Some(first) = page.events().first() else {
            return Err(not_found.into());
        };

        let event: Map<String, Value> = match first.parse() {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(execution = %execution, error = %e, "First history event is not a JSON object");
                return Err(not_found.into());
            }
        };

        match ArchivedWorkflowDescription::from_first_event(execution, &event) {
            Some(description) => {
                tracing::info!(execution = %execution, "Resolved workflow from archived history");
                Ok(WorkflowDescription::Archived(description))
            }
            None => {
                tracing::warn!(execution = %execution, "First history event has no attributes");
                Err(not_found.into())
            }
        }
    }
}
