// OpenAPI specification generation
//
// Used by the server (for Swagger UI) and by the export-openapi binary.

use crate::api;
use sightline_core::execution::{History, PollerInfo};
use sightline_core::resolver::{
    ArchivedExecutionConfig, ArchivedExecutionInfo, ArchivedWorkflowDescription, ExecutionRef,
};
use sightline_core::{HistoryPage, MergedPoller, NamespacePage, TaskQueueDescription, WorkflowPage};
use utoipa::OpenApi;

/// OpenAPI documentation for the Sightline gateway
#[derive(OpenApi)]
#[openapi(
    paths(
        api::namespaces::list_namespaces,
        api::namespaces::describe_namespace,
        api::workflows::list_open,
        api::workflows::list_closed,
        api::workflows::list_by_query,
        api::workflows::list_archived,
        api::workflows::describe_workflow,
        api::workflows::get_history,
        api::workflows::list_query_types,
        api::workflows::run_query,
        api::workflows::terminate_workflow,
        api::workflows::signal_workflow,
        api::export::export_history,
        api::task_queues::list_pollers,
        api::task_queues::describe_task_queue,
        api::settings::web_settings,
        api::settings::current_user,
        api::settings::version_info,
    ),
    components(
        schemas(
            api::ErrorResponse,
            NamespacePage,
            WorkflowPage,
            History,
            HistoryPage,
            PollerInfo,
            TaskQueueDescription,
            MergedPoller,
            ArchivedWorkflowDescription,
            ArchivedExecutionConfig,
            ArchivedExecutionInfo,
            ExecutionRef,
            api::workflows::TerminateRequest,
            api::settings::WebSettings,
            api::settings::CurrentUser,
        )
    ),
    tags(
        (name = "namespaces", description = "Namespace endpoints"),
        (name = "workflows", description = "Workflow listing, history, queries and write operations"),
        (name = "task-queues", description = "Task queue poller endpoints"),
        (name = "settings", description = "Dashboard settings and cluster information")
    ),
    info(
        title = "Sightline Gateway API",
        version = "0.3.0",
        description = "HTTP/JSON gateway in front of a Temporal cluster",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI spec as a pretty-printed JSON string
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}
