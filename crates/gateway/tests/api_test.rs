// Router tests against the in-memory backend

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sightline_core::memory::{InMemoryWorkflowService, RecordedCall};
use sightline_core::{HistoryEvent, PollerInfo, RpcError, TaskQueueType, WorkflowExecution};
use sightline_gateway::{app, GatewaySettings};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn settings() -> GatewaySettings {
    GatewaySettings {
        permit_write_api: true,
        auth_enabled: false,
        namespace_page_size: 50,
    }
}

fn router(backend: &Arc<InMemoryWorkflowService>) -> Router {
    app(backend.clone(), &settings())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn event(id: &str) -> HistoryEvent {
    HistoryEvent::from_json(format!(r#"{{"eventId":{},"eventType":"E{}"}}"#, id, id)).unwrap()
}

#[tokio::test]
async fn test_health() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

// ============================================================================
// Namespaces
// ============================================================================

#[tokio::test]
async fn test_list_namespaces_uses_page_size_token_and_bearer() {
    let backend = Arc::new(
        InMemoryWorkflowService::new()
            .with_namespaces(vec![json!({"namespaceInfo": {"name": "default"}})]),
    );

    let request = Request::builder()
        .uri("/api/namespaces?nextPageToken=AAE%3D")
        .header(header::AUTHORIZATION, "Bearer user-token")
        .body(Body::empty())
        .unwrap();
    let response = router(&backend).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["namespaces"][0]["namespaceInfo"]["name"],
        "default"
    );

    match &backend.calls().await[..] {
        [RecordedCall::ListNamespaces {
            page_size,
            next_page_token,
        }] => {
            assert_eq!(*page_size, 50);
            assert_eq!(next_page_token.as_ref().unwrap().as_bytes(), &[0, 1]);
        }
        other => panic!("unexpected calls {:?}", other),
    }
    assert_eq!(
        backend.access_tokens().await,
        vec![Some("user-token".to_string())]
    );
}

#[tokio::test]
async fn test_unknown_namespace_is_404() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(get("/api/namespaces/missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Namespace missing is not found."})
    );
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_time_range_listing_requires_valid_range() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(get(
            "/api/namespaces/default/workflows/open?startTime=yesterday&endTime=2024-01-02",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("startTime"));
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn test_closed_listing_forwards_filters() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(get(
            "/api/namespaces/default/workflows/closed?startTime=2024-01-01T00:00:00Z&endTime=2024-01-02T00:00:00Z&workflowName=OrderWorkflow&status=",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    match &backend.calls().await[..] {
        [RecordedCall::ListClosed(request)] => {
            assert_eq!(request.namespace, "default");
            assert_eq!(request.start_time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
            assert_eq!(request.type_filter.as_deref(), Some("OrderWorkflow"));
            assert_eq!(request.execution_filter, None);
            assert_eq!(request.status, None);
        }
        other => panic!("unexpected calls {:?}", other),
    }
}

#[tokio::test]
async fn test_archived_listing_synthesizes_query() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(get(
            "/api/namespaces/default/workflows/archived?startTime=2024-01-01T00:00:00Z&endTime=2024-01-02T00:00:00Z&status=Completed",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    match &backend.calls().await[..] {
        [RecordedCall::ListArchived(request)] => assert_eq!(
            request.query.as_deref(),
            Some(r#"CloseTime >= "2024-01-01T00:00:00.000Z" and CloseTime <= "2024-01-02T00:00:00.000Z" and ExecutionStatus = "Completed""#)
        ),
        other => panic!("unexpected calls {:?}", other),
    }
}

#[tokio::test]
async fn test_query_listing_passes_query_verbatim() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(get(
            "/api/namespaces/default/workflows/list?queryString=WorkflowType%20%3D%20%22A%22",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    match &backend.calls().await[..] {
        [RecordedCall::ListByQuery(request)] => {
            assert_eq!(request.query.as_deref(), Some(r#"WorkflowType = "A""#));
            assert!(request.next_page_token.is_none());
        }
        other => panic!("unexpected calls {:?}", other),
    }
}

// ============================================================================
// History and export
// ============================================================================

#[tokio::test]
async fn test_history_page_echoes_raw_events() {
    let backend = Arc::new(
        InMemoryWorkflowService::new()
            .with_history("wf-1", vec![vec![event("9007199254740993")], vec![event("2")]]),
    );
    let response = router(&backend)
        .oneshot(get(
            "/api/namespaces/default/workflows/wf-1/run-1/history?waitForNewEvent",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(text.contains(r#""eventId":9007199254740993"#));
    assert!(text.contains(r#""nextPageToken":"cGFnZS0x""#));

    match &backend.calls().await[..] {
        [RecordedCall::GetHistory {
            wait_for_new_event, ..
        }] => assert!(*wait_for_new_event),
        other => panic!("unexpected calls {:?}", other),
    }
}

#[tokio::test]
async fn test_export_of_empty_history_is_empty_array() {
    let backend = Arc::new(InMemoryWorkflowService::new().with_history("wf-1", vec![vec![]]));
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1/export"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(body_text(response).await, "[]");
}

#[tokio::test]
async fn test_export_joins_pages_and_keeps_digits() {
    let backend = Arc::new(InMemoryWorkflowService::new().with_history(
        "wf-1",
        vec![
            vec![event("1"), event("2")],
            vec![event("3"), event("9007199254740993")],
        ],
    ));
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1/export"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        body_text(response).await,
        r#"[{"eventId":1,"eventType":"E1"},{"eventId":2,"eventType":"E2"},{"eventId":3,"eventType":"E3"},{"eventId":9007199254740993,"eventType":"E9007199254740993"}]"#
    );
}

#[tokio::test]
async fn test_export_failure_before_output_is_error_response() {
    let backend = Arc::new(InMemoryWorkflowService::new().with_history_pages(
        "wf-1",
        vec![Err(RpcError::not_found("workflow execution not found"))],
    ));
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1/export"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"error": "workflow execution not found"})
    );
}

#[tokio::test]
async fn test_export_failure_after_output_aborts_body() {
    let backend = Arc::new(InMemoryWorkflowService::new().with_history_pages(
        "wf-1",
        vec![
            Ok(vec![event("1")]),
            Err(RpcError::unavailable("connection reset")),
        ],
    ));
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1/export"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.into_body().collect().await.is_err());
}

#[tokio::test]
async fn test_export_forwards_access_token_on_every_page() {
    let backend = Arc::new(
        InMemoryWorkflowService::new()
            .with_history("wf-1", vec![vec![event("1")], vec![event("2")], vec![]]),
    );
    let request = Request::builder()
        .uri("/api/namespaces/default/workflows/wf-1/run-1/export")
        .header(header::AUTHORIZATION, "Bearer t0k")
        .body(Body::empty())
        .unwrap();
    let response = router(&backend).oneshot(request).await.unwrap();
    body_text(response).await;

    assert_eq!(
        backend.access_tokens().await,
        vec![Some("t0k".to_string()); 3]
    );
}

#[tokio::test]
async fn test_client_disconnect_cancels_export() {
    let backend = Arc::new(
        InMemoryWorkflowService::new()
            .with_history("wf-1", vec![vec![event("1")], vec![event("2")]])
            .with_stalled_history_page("wf-1", 1),
    );
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1/export"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert_eq!(&first[..], br#"[{"eventId":1,"eventType":"E1"}"#);

    // Wait until the export is parked on the second page
    tokio::time::timeout(Duration::from_secs(1), async {
        while backend.calls().await.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(Arc::strong_count(&backend) > 1);

    drop(body);

    // The export task and its pending backend call release the service
    tokio::time::timeout(Duration::from_secs(1), async {
        while Arc::strong_count(&backend) > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(backend.calls().await.len(), 2);
}

// ============================================================================
// Detail, queries and write operations
// ============================================================================

#[tokio::test]
async fn test_describe_falls_back_to_archived_history() {
    let started = HistoryEvent::from_json(
        r#"{"eventId":"1","eventTime":"2024-03-01T12:00:00Z","workflowExecutionStartedEventAttributes":{"workflowType":{"name":"OrderWorkflow"},"taskQueue":{"name":"orders"},"workflowExecutionTimeout":"0s","workflowTaskTimeout":"10s"}}"#,
    )
    .unwrap();
    let backend = Arc::new(InMemoryWorkflowService::new().with_history("wf-1", vec![vec![started]]));

    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["workflowExecutionInfo"]["isArchived"], true);
    assert_eq!(
        body["workflowExecutionInfo"]["execution"],
        json!({"runId": "run-1", "workflowId": "wf-1"})
    );
    assert_eq!(body["executionConfig"]["taskQueue"]["name"], "orders");
    assert_eq!(body["pendingActivities"], Value::Null);
    assert_eq!(body["pendingChildren"], Value::Null);
}

#[tokio::test]
async fn test_describe_without_history_is_404() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_live_describe_is_passed_through() {
    let descriptor = json!({"workflowExecutionInfo": {"status": "WORKFLOW_EXECUTION_STATUS_RUNNING"}});
    let backend = Arc::new(InMemoryWorkflowService::new().with_describe("wf-1", Ok(descriptor.clone())));
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, descriptor);
}

#[tokio::test]
async fn test_query_type_discovery() {
    let backend = Arc::new(InMemoryWorkflowService::new().with_query(
        "wf-1",
        Err(RpcError::invalid_argument(
            "unknown queryType __cadence_web_list. KnownQueryTypes=[__cadence_web_list foo bar]",
        )),
    ));
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1/query"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!(["foo", "bar"]));
}

#[tokio::test]
async fn test_accepted_query_probe_is_500() {
    let backend =
        Arc::new(InMemoryWorkflowService::new().with_query("wf-1", Ok(json!({"queryResult": {}}))));
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/workflows/wf-1/run-1/query"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_named_query_returns_backend_answer() {
    let backend = Arc::new(
        InMemoryWorkflowService::new().with_query("wf-1", Ok(json!({"queryResult": {"payloads": []}}))),
    );
    let response = router(&backend)
        .oneshot(post(
            "/api/namespaces/default/workflows/wf-1/run-1/query/getState",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    match &backend.calls().await[..] {
        [RecordedCall::Query { query_type, .. }] => assert_eq!(query_type, "getState"),
        other => panic!("unexpected calls {:?}", other),
    }
}

#[tokio::test]
async fn test_terminate_forwards_reason() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(post(
            "/api/namespaces/default/workflows/wf-1/run-1/terminate",
            json!({"reason": "stuck"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        backend.calls().await,
        vec![RecordedCall::Terminate {
            execution: WorkflowExecution::new("default", "wf-1", "run-1"),
            reason: Some("stuck".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_terminate_without_body() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/namespaces/default/workflows/wf-1/run-1/terminate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    match &backend.calls().await[..] {
        [RecordedCall::Terminate { reason, .. }] => assert_eq!(reason, &None),
        other => panic!("unexpected calls {:?}", other),
    }
}

#[tokio::test]
async fn test_write_api_gate_refuses_without_backend_call() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let settings = GatewaySettings {
        permit_write_api: false,
        ..settings()
    };
    let router = app(backend.clone(), &settings);

    let response = router
        .clone()
        .oneshot(post(
            "/api/namespaces/default/workflows/wf-1/run-1/terminate",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(post(
            "/api/namespaces/default/workflows/wf-1/run-1/signal/refresh",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn test_signal_forwards_name() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(post(
            "/api/namespaces/default/workflows/wf-1/run-1/signal/refresh",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    match &backend.calls().await[..] {
        [RecordedCall::Signal { signal_name, .. }] => assert_eq!(signal_name, "refresh"),
        other => panic!("unexpected calls {:?}", other),
    }
}

// ============================================================================
// Task queues
// ============================================================================

fn poller_backend() -> Arc<InMemoryWorkflowService> {
    let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
    Arc::new(
        InMemoryWorkflowService::new()
            .with_pollers(
                "orders",
                TaskQueueType::Activity,
                Ok(vec![PollerInfo::new("w1", at(100))]),
            )
            .with_pollers(
                "orders",
                TaskQueueType::Workflow,
                Ok(vec![PollerInfo::new("w1", at(200))]),
            ),
    )
}

#[tokio::test]
async fn test_merged_pollers() {
    let backend = poller_backend();
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/task-queues/orders/pollers"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        body_json(response).await,
        json!({
            "w1": {
                "lastAccessTime": "1970-01-01T00:03:20Z",
                "taskQueueTypes": ["workflow", "activity"]
            }
        })
    );
}

#[tokio::test]
async fn test_combined_pollers_with_trailing_slash() {
    let backend = poller_backend();
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/task-queues/orders/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let pollers = body["pollers"].as_array().unwrap();
    assert_eq!(pollers.len(), 2);
    assert_eq!(pollers[0]["lastAccessTime"], "1970-01-01T00:01:40Z");
    assert_eq!(pollers[1]["lastAccessTime"], "1970-01-01T00:03:20Z");
}

#[tokio::test]
async fn test_combined_pollers_keep_backend_fields() {
    let raw = json!({
        "identity": "1@h",
        "lastAccessTime": "2024-01-01T00:00:05.100Z",
        "ratePerSecond": 100000,
        "workerVersionCapabilities": {"buildId": "abc"}
    });
    let backend = Arc::new(InMemoryWorkflowService::new().with_raw_pollers(
        "orders",
        TaskQueueType::Workflow,
        Ok(vec![raw.clone()]),
    ));
    let response = router(&backend)
        .oneshot(get("/api/namespaces/default/task-queues/orders/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(text.contains(r#""ratePerSecond":100000,"#));
    assert_eq!(
        serde_json::from_str::<Value>(&text).unwrap(),
        json!({"pollers": [raw]})
    );
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_web_settings_and_me() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let settings = GatewaySettings {
        permit_write_api: false,
        auth_enabled: true,
        namespace_page_size: 50,
    };
    let router = app(backend, &settings);

    let response = router.clone().oneshot(get("/api/web-settings")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"health": "OK", "permitWriteApi": false})
    );

    let response = router.oneshot(get("/api/me")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"isAuthEnabled": true, "user": null})
    );
}

#[tokio::test]
async fn test_version_info_passthrough() {
    let backend = Arc::new(
        InMemoryWorkflowService::new().with_cluster_info(json!({"serverVersion": "1.24.2"})),
    );
    let response = router(&backend)
        .oneshot(get("/api/cluster/version-info"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"serverVersion": "1.24.2"}));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let backend = Arc::new(InMemoryWorkflowService::new());
    let response = router(&backend)
        .oneshot(get("/api-doc/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert!(doc["paths"]["/api/namespaces/{namespace}/workflows/{workflow_id}/{run_id}/export"].is_object());
}
