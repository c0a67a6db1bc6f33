// Sightline Gateway Core
//
// Transport-agnostic request handling for a workflow visibility gateway that
// sits between a dashboard and an orchestration cluster.
//
// Key design decisions:
// - The cluster is reached through the WorkflowService trait; one instance is
//   built at start-up and shared read-only across requests
// - Each component (listing, export, pollers, resolver, query discovery) is a
//   small service struct holding an Arc<dyn WorkflowService>
// - Continuation tokens are opaque bytes, base64 on the wire
// - History events stay raw JSON end to end so integer digits are preserved
// - The exporter writes through the ExportSink trait and knows nothing about
//   HTTP
// - Backend error kinds pass through unchanged; the HTTP layer maps them

pub mod error;
pub mod execution;
pub mod pagination;
pub mod traits;

pub mod export;
pub mod listing;
pub mod pollers;
pub mod query;
pub mod resolver;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use error::{GatewayError, Result, RpcError, RpcErrorKind};
pub use execution::{
    HistoryEvent, HistoryPage, HistoryRequest, NamespacePage, PollerInfo, TaskQueueDescription,
    TaskQueueType, WorkflowExecution, WorkflowPage,
};
pub use export::{ExportError, ExportSink, ExportSummary, HistoryExporter, SinkClosed};
pub use listing::{ExecutionState, ListParams, ListService};
pub use pagination::PageToken;
pub use pollers::{MergedPoller, MergedPollers, PollerService};
pub use query::{QueryService, QUERY_PROBE_TYPE};
pub use resolver::{WorkflowDescription, WorkflowResolver};
pub use traits::{AccessContext, RpcResult, WorkflowService};
