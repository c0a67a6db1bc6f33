// HTTP API routes
//
// Each submodule handles one resource type with its own AppState.

pub mod common;
pub mod export;
pub mod namespaces;
pub mod settings;
pub mod task_queues;
pub mod workflows;

// Re-export common types
pub use common::{ApiError, ErrorResponse};
