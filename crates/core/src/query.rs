// Query-type discovery
//
// The backend has no call that lists an execution's query handlers. Instead a
// query with a reserved, unregistered type name is sent; the backend rejects it
// and its error message enumerates the registered names. The message format
// differs between backend versions:
//   "... KnownQueryTypes=[foo bar]"
//   "... knownTypes=[foo, bar]"
//
// Decision: the reserved probe name is removed from the parsed list. Some
// backends echo the requested name among the known types; it is never a
// handler the workflow registered.
//
// Parsing sits behind QueryTypeParser so a new message format only needs a new
// parser, not changes to callers.

use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::error::{GatewayError, Result};
use crate::execution::{QueryRequest, WorkflowExecution};
use crate::traits::{AccessContext, WorkflowService};

/// Query type sent to provoke the known-types error
pub const QUERY_PROBE_TYPE: &str = "__cadence_web_list";

/// Extracts query-type names from a rejected probe's error message
pub trait QueryTypeParser: Send + Sync {
    /// `None` when the message has no recognizable list.
    fn parse(&self, message: &str) -> Option<Vec<String>>;
}

/// Parser for the `KnownQueryTypes=[...]` and `knownTypes=[...]` formats
#[derive(Debug, Default, Clone, Copy)]
pub struct KnownTypesParser;

fn known_types_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:KnownQueryTypes|knownTypes)=\[(.*?)\]").unwrap_or_else(|e| {
            unreachable!("known types pattern is a valid regex: {}", e)
        })
    })
}

impl QueryTypeParser for KnownTypesParser {
    fn parse(&self, message: &str) -> Option<Vec<String>> {
        let captures = known_types_pattern().captures(message)?;
        let list = captures.get(1)?.as_str().replace(',', " ");

        Some(
            list.split_whitespace()
                .filter(|name| *name != QUERY_PROBE_TYPE)
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Runs queries against executions, including query-type discovery
pub struct QueryService {
    service: Arc<dyn WorkflowService>,
    parser: Box<dyn QueryTypeParser>,
}

impl QueryService {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self::with_parser(service, Box::new(KnownTypesParser))
    }

    pub fn with_parser(service: Arc<dyn WorkflowService>, parser: Box<dyn QueryTypeParser>) -> Self {
        Self { service, parser }
    }

    /// Names of the query handlers the execution supports.
    ///
    /// An unrecognized rejection message yields an empty list and a warning.
    pub async fn discover_query_types(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
    ) -> Result<Vec<String>> {
        let request = QueryRequest {
            execution: execution.clone(),
            query_type: QUERY_PROBE_TYPE.to_string(),
        };

        let error = match self.service.query_workflow(ctx, request).await {
            Err(error) => error,
            Ok(_) => {
                tracing::error!(
                    execution = %execution,
                    query_type = QUERY_PROBE_TYPE,
                    "Query probe was answered instead of rejected"
                );
                return Err(GatewayError::QueryProbeAccepted {
                    query_type: QUERY_PROBE_TYPE.to_string(),
                });
            }
        };

        match self.parser.parse(&error.message) {
            Some(types) => {
                tracing::debug!(execution = %execution, count = types.len(), "Discovered query types");
                Ok(types)
            }
            None => {
                tracing::warn!(
                    execution = %execution,
                    kind = %error.kind,
                    message = %error.message,
                    "Query probe error did not list known query types"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Run a named query and return the backend's answer unchanged.
    pub async fn query(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        query_type: &str,
    ) -> Result<Value> {
        let request = QueryRequest {
            execution: execution.clone(),
            query_type: query_type.to_string(),
        };
        Ok(self.service.query_workflow(ctx, request).await?)
    }
}
