// Domain types exchanged with the orchestration backend
//
// Most backend payloads are forwarded as opaque JSON. Only the parts the
// gateway actually inspects (continuation tokens, history events, pollers)
// are typed.

use crate::pagination::{self, PageToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::fmt;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// (namespace, workflowId, runId) identifying one execution instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowExecution {
    pub namespace: String,
    pub workflow_id: String,
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(
        namespace: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl fmt::Display for WorkflowExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.workflow_id, self.run_id)
    }
}

// ============================================================================
// History
// ============================================================================

/// One history event, kept as the exact JSON text the backend sent.
///
/// Event identifiers and versions are arbitrary-precision integers; keeping
/// the raw text means they are written back with the same digits instead of
/// passing through a floating-point representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryEvent(Box<RawValue>);

impl HistoryEvent {
    /// Wrap a JSON object given as text.
    pub fn from_json(json: impl Into<String>) -> serde_json::Result<Self> {
        RawValue::from_string(json.into()).map(Self)
    }

    /// The event as received, byte for byte
    pub fn as_json(&self) -> &str {
        self.0.get()
    }

    /// Parse the event for inspection.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.0.get())
    }
}

/// A list of history events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct History {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub events: Vec<HistoryEvent>,
}

/// One page of an execution's history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HistoryPage {
    #[serde(default)]
    pub history: History,
    #[serde(
        default,
        deserialize_with = "pagination::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub next_page_token: Option<PageToken>,
    #[serde(default)]
    pub archived: bool,
}

impl HistoryPage {
    pub fn new(events: Vec<HistoryEvent>, next_page_token: Option<PageToken>) -> Self {
        Self {
            history: History { events },
            next_page_token,
            archived: false,
        }
    }

    pub fn events(&self) -> &[HistoryEvent] {
        &self.history.events
    }
}

/// Request for one page of history
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub execution: WorkflowExecution,
    pub next_page_token: Option<PageToken>,
    /// Long-poll until a new event is available
    pub wait_for_new_event: bool,
}

impl HistoryRequest {
    /// First page, no long-poll
    pub fn first_page(execution: WorkflowExecution) -> Self {
        Self {
            execution,
            next_page_token: None,
            wait_for_new_event: false,
        }
    }
}

// ============================================================================
// Listing
// ============================================================================

/// One page of namespaces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct NamespacePage {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub namespaces: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "pagination::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub next_page_token: Option<PageToken>,
}

/// One page of workflow executions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowPage {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub executions: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "pagination::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub next_page_token: Option<PageToken>,
}

/// Request for a page of namespaces
#[derive(Debug, Clone)]
pub struct ListNamespacesRequest {
    pub page_size: u32,
    pub next_page_token: Option<PageToken>,
}

/// Listing of open or closed executions inside a time range
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRangeListRequest {
    pub namespace: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Workflow type name filter
    pub type_filter: Option<String>,
    /// Workflow id filter
    pub execution_filter: Option<String>,
    pub status: Option<String>,
    pub next_page_token: Option<PageToken>,
}

/// Listing driven by a visibility query expression
#[derive(Debug, Clone, PartialEq)]
pub struct QueryListRequest {
    pub namespace: String,
    pub query: Option<String>,
    pub next_page_token: Option<PageToken>,
}

// ============================================================================
// Task queues
// ============================================================================

/// The two independent halves of a task queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskQueueType {
    Workflow,
    Activity,
}

impl TaskQueueType {
    /// Wire name used by the backend
    pub fn as_proto_str(&self) -> &'static str {
        match self {
            TaskQueueType::Workflow => "TASK_QUEUE_TYPE_WORKFLOW",
            TaskQueueType::Activity => "TASK_QUEUE_TYPE_ACTIVITY",
        }
    }

    /// Short name shown to dashboard users
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskQueueType::Workflow => "workflow",
            TaskQueueType::Activity => "activity",
        }
    }
}

impl Serialize for TaskQueueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for TaskQueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (namespace, queue name, queue type) lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskQueueDescriptor {
    pub namespace: String,
    pub name: String,
    pub queue_type: TaskQueueType,
}

/// Typed view of one poller entry: only the fields the merge reads.
///
/// Unknown fields are ignored here; the raw entry is kept in
/// [`TaskQueueDescription`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PollerInfo {
    #[serde(default)]
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access_time: Option<DateTime<Utc>>,
}

impl PollerInfo {
    pub fn new(identity: impl Into<String>, last_access_time: DateTime<Utc>) -> Self {
        Self {
            identity: identity.into(),
            last_access_time: Some(last_access_time),
        }
    }
}

/// Result of describing one task queue type.
///
/// Poller entries are kept exactly as the backend sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TaskQueueDescription {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub pollers: Vec<Value>,
}

impl TaskQueueDescription {
    /// Typed view of every poller entry; entries that do not parse are skipped.
    pub fn poller_infos(&self) -> Vec<PollerInfo> {
        self.pollers
            .iter()
            .filter_map(|raw| match PollerInfo::deserialize(raw) {
                Ok(info) => Some(info),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable poller entry");
                    None
                }
            })
            .collect()
    }
}

// ============================================================================
// Workflow operations
// ============================================================================

/// Named query sent to a running execution
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub execution: WorkflowExecution,
    pub query_type: String,
}
