// Workflow listing
//
// Three listing modes share one time-range/filter model:
// 1. open/closed executions inside a validated time range
// 2. free-form visibility query, forwarded verbatim
// 3. archived executions, by caller query or by a query synthesized from the
//    time range and filters
//
// Decision: synthesized query values are interpolated without escaping, the
// same grammar the dashboard has always produced. A value containing `"` can
// change the meaning of the query; callers must not be trusted to avoid it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::execution::{QueryListRequest, TimeRangeListRequest, WorkflowPage};
use crate::pagination;
use crate::traits::{AccessContext, WorkflowService};

#[cfg(feature = "openapi")]
use utoipa::IntoParams;

/// Which executions a time-range listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Open,
    Closed,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Open => "open",
            ExecutionState::Closed => "closed",
        }
    }
}

/// Caller-supplied listing parameters, as they arrive on the query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ListParams {
    /// Start of the time range (ISO-8601)
    pub start_time: Option<String>,
    /// End of the time range (ISO-8601)
    pub end_time: Option<String>,
    pub workflow_id: Option<String>,
    /// Workflow type name
    pub workflow_name: Option<String>,
    pub status: Option<String>,
    /// Visibility query, used verbatim
    pub query_string: Option<String>,
    /// Continuation token from the previous page (base64)
    pub next_page_token: Option<String>,
}

impl ListParams {
    fn workflow_id(&self) -> Option<String> {
        non_empty(&self.workflow_id)
    }

    fn workflow_name(&self) -> Option<String> {
        non_empty(&self.workflow_name)
    }

    fn status(&self) -> Option<String> {
        non_empty(&self.status)
    }

    fn query_string(&self) -> Option<String> {
        non_empty(&self.query_string)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}

// ============================================================================
// Time range
// ============================================================================

/// Validated [start, end] pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Both bounds are required and must parse as timestamps.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .and_then(parse_timestamp)
            .ok_or_else(|| GatewayError::validation("startTime must be a valid timestamp"))?;
        let end = end
            .and_then(parse_timestamp)
            .ok_or_else(|| GatewayError::validation("endTime must be a valid timestamp"))?;
        Ok(Self { start, end })
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with any offset, a naive date-time (read as UTC, `T` or
/// space separated, optional fraction) and a bare date (UTC midnight).
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Millisecond-precision UTC form, e.g. `2024-01-01T00:00:00.000Z`
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Visibility query grammar
// ============================================================================

/// Builder for `" and "`-joined visibility query clauses
#[derive(Debug, Clone, Default)]
pub struct VisibilityQuery {
    clauses: Vec<String>,
}

impl VisibilityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<field> >= "<start>" and <field> <= "<end>"`
    pub fn time_range(mut self, field: &str, range: &TimeRange) -> Self {
        self.clauses
            .push(format!("{} >= \"{}\"", field, format_timestamp(&range.start)));
        self.clauses
            .push(format!("{} <= \"{}\"", field, format_timestamp(&range.end)));
        self
    }

    /// `<field> = "<value>"`, omitted when the value is absent
    pub fn eq(mut self, field: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.clauses.push(format!("{} = \"{}\"", field, value));
        }
        self
    }

    /// `<field> != "<value>"`
    pub fn not_eq(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{} != \"{}\"", field, value));
        self
    }

    pub fn build(self) -> String {
        self.clauses.join(" and ")
    }
}

/// Query used for archived listing when the caller gave none
pub fn archived_query(
    range: &TimeRange,
    status: Option<&str>,
    workflow_id: Option<&str>,
    workflow_name: Option<&str>,
) -> String {
    VisibilityQuery::new()
        .time_range("CloseTime", range)
        .eq("ExecutionStatus", status)
        .eq("WorkflowID", workflow_id)
        .eq("WorkflowType", workflow_name)
        .build()
}

// ============================================================================
// ListService
// ============================================================================

/// Validates listing input and forwards it to the backend
pub struct ListService {
    service: Arc<dyn WorkflowService>,
}

impl ListService {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self { service }
    }

    /// Open or closed executions inside `[startTime, endTime]`
    pub async fn list_by_time_range(
        &self,
        ctx: &AccessContext,
        state: ExecutionState,
        namespace: &str,
        params: &ListParams,
    ) -> Result<WorkflowPage> {
        let range = TimeRange::parse(params.start_time.as_deref(), params.end_time.as_deref())?;

        let request = TimeRangeListRequest {
            namespace: namespace.to_string(),
            start_time: range.start,
            end_time: range.end,
            type_filter: params.workflow_name(),
            execution_filter: params.workflow_id(),
            status: params.status(),
            next_page_token: pagination::decode(params.next_page_token.as_deref()),
        };

        tracing::debug!(
            namespace = %namespace,
            state = state.as_str(),
            start = %request.start_time,
            end = %request.end_time,
            "Listing workflows by time range"
        );

        let page = match state {
            ExecutionState::Open => self.service.list_open_workflows(ctx, request).await?,
            ExecutionState::Closed => self.service.list_closed_workflows(ctx, request).await?,
        };
        Ok(page)
    }

    /// Executions matching the caller's query, forwarded verbatim
    pub async fn list_by_query(
        &self,
        ctx: &AccessContext,
        namespace: &str,
        params: &ListParams,
    ) -> Result<WorkflowPage> {
        let request = QueryListRequest {
            namespace: namespace.to_string(),
            query: params.query_string(),
            next_page_token: pagination::decode(params.next_page_token.as_deref()),
        };
        Ok(self.service.list_workflows(ctx, request).await?)
    }

    /// Archived executions, by caller query or synthesized from the time range
    pub async fn list_archived(
        &self,
        ctx: &AccessContext,
        namespace: &str,
        params: &ListParams,
    ) -> Result<WorkflowPage> {
        let query = match params.query_string() {
            Some(query) => query,
            None => {
                let range =
                    TimeRange::parse(params.start_time.as_deref(), params.end_time.as_deref())?;
                archived_query(
                    &range,
                    params.status().as_deref(),
                    params.workflow_id().as_deref(),
                    params.workflow_name().as_deref(),
                )
            }
        };

        let request = QueryListRequest {
            namespace: namespace.to_string(),
            query: Some(query),
            next_page_token: pagination::decode(params.next_page_token.as_deref()),
        };
        Ok(self.service.list_archived_workflows(ctx, request).await?)
    }
}
