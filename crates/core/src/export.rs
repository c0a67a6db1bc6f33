// Streaming history export
//
// Pages through an execution's full history and writes it to a sink as one
// flat JSON array. Pages are fetched strictly in sequence: page N+1 is only
// requested after page N has been handed to the sink, so the sink's write
// rate gates the fetch rate and at most one page is held in memory.
//
// Events are written as the raw JSON text the backend produced, so integer
// identifiers keep their exact digits.
//
// Decision: the opening `[` is written together with the first page, after
// that page was fetched successfully. A failure on the first fetch therefore
// leaves the sink untouched and can still become an ordinary error response.
// A failure after output began cannot be retracted; the sink is aborted so the
// consumer sees a truncated stream instead of a body that looks complete.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::error::RpcError;
use crate::execution::{HistoryRequest, WorkflowExecution};
use crate::traits::{AccessContext, WorkflowService};

/// Destination of an export
#[async_trait]
pub trait ExportSink: Send {
    /// Append a chunk; fails once the consumer is gone.
    async fn write(&mut self, chunk: String) -> Result<(), SinkClosed>;

    /// Output is complete.
    async fn finalize(&mut self) -> Result<(), SinkClosed>;

    /// Output is incomplete and must not look complete.
    async fn abort(&mut self, reason: &ExportError);
}

/// The consumer of the sink went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("export consumer disconnected")]
pub struct SinkClosed;

/// Export failures
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed before anything was written
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Failed after output began; the written output is incomplete
    #[error("history export truncated after {events_written} events: {source}")]
    Truncated {
        events_written: usize,
        #[source]
        source: RpcError,
    },

    /// The consumer stopped reading
    #[error(transparent)]
    SinkClosed(#[from] SinkClosed),
}

/// What a finished export wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    pub pages: usize,
    pub events: usize,
}

/// Writes an execution's complete history as a JSON array
pub struct HistoryExporter {
    service: Arc<dyn WorkflowService>,
}

impl HistoryExporter {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self { service }
    }

    pub async fn export<S: ExportSink + ?Sized>(
        &self,
        ctx: &AccessContext,
        execution: &WorkflowExecution,
        sink: &mut S,
    ) -> Result<ExportSummary, ExportError> {
        let mut summary = ExportSummary::default();
        let mut next_page_token = None;

        loop {
            let request = HistoryRequest {
                execution: execution.clone(),
                next_page_token: next_page_token.take(),
                wait_for_new_event: false,
            };

            let page = match self.service.export_history(ctx, request).await {
                Ok(page) => page,
                Err(source) if summary.pages == 0 => return Err(ExportError::Rpc(source)),
                Err(source) => {
                    let error = ExportError::Truncated {
                        events_written: summary.events,
                        source,
                    };
                    tracing::error!(
                        execution = %execution,
                        pages = summary.pages,
                        events = summary.events,
                        error = %error,
                        "History export failed after output began"
                    );
                    sink.abort(&error).await;
                    return Err(error);
                }
            };

            let mut chunk = String::new();
            if summary.pages == 0 {
                chunk.push('[');
            }
            for event in page.events() {
                if summary.events > 0 {
                    chunk.push(',');
                }
                chunk.push_str(event.as_json());
                summary.events += 1;
            }
            summary.pages += 1;

            tracing::debug!(
                execution = %execution,
                page = summary.pages,
                page_events = page.events().len(),
                "Exporting history page"
            );

            // An empty middle page writes nothing
            if !chunk.is_empty() {
                sink.write(chunk).await?;
            }

            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        sink.write("]".to_string()).await?;
        sink.finalize().await?;
        Ok(summary)
    }
}

// ============================================================================
// BufferSink - collects output in memory
// ============================================================================

/// Sink that keeps everything in a string
#[derive(Debug, Default)]
pub struct BufferSink {
    pub output: String,
    pub writes: usize,
    pub finalized: bool,
    pub aborted: bool,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExportSink for BufferSink {
    async fn write(&mut self, chunk: String) -> Result<(), SinkClosed> {
        self.output.push_str(&chunk);
        self.writes += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), SinkClosed> {
        self.finalized = true;
        Ok(())
    }

    async fn abort(&mut self, _reason: &ExportError) {
        self.aborted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcErrorKind;
    use crate::execution::HistoryEvent;
    use crate::memory::{InMemoryWorkflowService, RecordedCall};
    use serde_json::Value;

    fn event(id: &str, event_type: &str) -> HistoryEvent {
        HistoryEvent::from_json(format!(
            r#"{{"eventId":{},"eventType":"{}","version":0}}"#,
            id, event_type
        ))
        .unwrap()
    }

    fn execution() -> WorkflowExecution {
        WorkflowExecution::new("default", "wf-1", "run-1")
    }

    async fn export(service: InMemoryWorkflowService) -> (Result<ExportSummary, ExportError>, BufferSink) {
        let exporter = HistoryExporter::new(Arc::new(service));
        let mut sink = BufferSink::new();
        let result = exporter
            .export(&AccessContext::anonymous(), &execution(), &mut sink)
            .await;
        (result, sink)
    }

    #[tokio::test]
    async fn test_zero_events_single_page() {
        let service = InMemoryWorkflowService::new().with_history("wf-1", vec![vec![]]);
        let (result, sink) = export(service).await;

        assert_eq!(result.unwrap(), ExportSummary { pages: 1, events: 0 });
        assert_eq!(sink.output, "[]");
        assert!(sink.finalized);
    }

    #[tokio::test]
    async fn test_two_pages_form_one_array_in_order() {
        let service = InMemoryWorkflowService::new().with_history(
            "wf-1",
            vec![
                vec![event("1", "Started"), event("2", "TaskScheduled")],
                vec![event("3", "TaskStarted"), event("9007199254740993", "Completed")],
            ],
        );
        let (result, sink) = export(service).await;

        assert_eq!(result.unwrap(), ExportSummary { pages: 2, events: 4 });
        assert!(sink.output.contains(r#""eventId":9007199254740993"#));

        let parsed: Vec<Value> = serde_json::from_str(&sink.output).unwrap();
        let types: Vec<&str> = parsed
            .iter()
            .map(|e| e["eventType"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["Started", "TaskScheduled", "TaskStarted", "Completed"]);
    }

    #[tokio::test]
    async fn test_empty_pages_do_not_break_the_array() {
        let service = InMemoryWorkflowService::new().with_history(
            "wf-1",
            vec![vec![], vec![event("1", "Started")], vec![], vec![event("2", "Completed")]],
        );
        let (result, sink) = export(service).await;

        assert_eq!(result.unwrap().events, 2);
        assert_eq!(
            sink.output,
            r#"[{"eventId":1,"eventType":"Started","version":0},{"eventId":2,"eventType":"Completed","version":0}]"#
        );
    }

    #[tokio::test]
    async fn test_follows_continuation_tokens() {
        let backend = Arc::new(InMemoryWorkflowService::new().with_history(
            "wf-1",
            vec![vec![event("1", "A")], vec![event("2", "B")], vec![event("3", "C")]],
        ));
        let exporter = HistoryExporter::new(backend.clone());
        let mut sink = BufferSink::new();
        exporter
            .export(&AccessContext::anonymous(), &execution(), &mut sink)
            .await
            .unwrap();

        let tokens: Vec<Option<Vec<u8>>> = backend
            .calls()
            .await
            .into_iter()
            .map(|call| match call {
                RecordedCall::GetHistory { next_page_token, .. } => {
                    next_page_token.map(|t| t.into_bytes())
                }
                other => panic!("unexpected call {:?}", other),
            })
            .collect();
        assert_eq!(
            tokens,
            vec![None, Some(b"page-1".to_vec()), Some(b"page-2".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_failure_on_first_page_writes_nothing() {
        let service = InMemoryWorkflowService::new()
            .with_history_pages("wf-1", vec![Err(RpcError::not_found("no such workflow"))]);
        let (result, sink) = export(service).await;

        match result {
            Err(ExportError::Rpc(e)) => assert_eq!(e.kind, RpcErrorKind::NotFound),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(sink.output, "");
        assert!(!sink.aborted);
        assert!(!sink.finalized);
    }

    #[tokio::test]
    async fn test_failure_mid_stream_aborts_sink() {
        let service = InMemoryWorkflowService::new().with_history_pages(
            "wf-1",
            vec![
                Ok(vec![event("1", "A"), event("2", "B")]),
                Err(RpcError::unavailable("connection reset")),
            ],
        );
        let (result, sink) = export(service).await;

        match result {
            Err(ExportError::Truncated {
                events_written,
                source,
            }) => {
                assert_eq!(events_written, 2);
                assert_eq!(source.kind, RpcErrorKind::Unavailable);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(sink.aborted);
        assert!(!sink.finalized);
        assert!(!sink.output.ends_with(']'));
    }
}
