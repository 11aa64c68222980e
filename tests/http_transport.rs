use axum::{
    extract::State,
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use rag_bench::client::{HttpTransport, RagTransport, TransportError};
use rag_bench::model::{BenchmarkRequest, ClientConfig, Document, OpOutcome, SearchQuery};
use rag_bench::orchestrator::Orchestrator;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

const BENCHMARK_BODY: &str = r#"{
    "ok": true,
    "documents_indexed": 3,
    "indexing_time_s": 0.4321,
    "index_size": {"index_mb": 0.0123, "metadata_mb": 0.0004, "total_mb": 0.0127},
    "memory": {"rss_before_mb": 200.0, "rss_after_mb": 201.5, "delta_mb": 1.5},
    "vram": {"allocated_mb": 0.0, "reserved_mb": 0.0, "peak_mb": 0.0},
    "relevance": {"recall_at_3": 0.6666, "queries_evaluated": 3},
    "restoration": {"restore_time_s": 0.01, "documents_restored": 3},
    "retrieval_performance": {
        "avg_query_time_ms": 1.75,
        "topk_avg_times_ms": {"10": 2.5, "1": 1.0, "5": 1.5}
    },
    "rag_impact": {"skipped": "no LLM named"}
}"#;

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn transport(base_url: String) -> HttpTransport {
    HttpTransport::new(&ClientConfig {
        base_url,
        ..ClientConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn list_and_search_speak_the_service_contract() {
    let recorded = Recorded::default();
    let router = Router::new()
        .route(
            "/rag/list",
            get(|| async {
                Json(json!({ "documents": [{ "id": "d1", "text": "rust is fast" }] }))
            }),
        )
        .route(
            "/rag/search",
            post(
                |State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                    rec.bodies.lock().unwrap().push(body);
                    Json(json!({ "results": ["rust is fast"] }))
                },
            ),
        )
        .with_state(recorded.clone());
    let client = transport(spawn_server(router).await);

    let docs = client.list_documents().await.unwrap();
    assert_eq!(
        docs,
        vec![Document {
            id: "d1".into(),
            text: "rust is fast".into()
        }]
    );

    let query = SearchQuery::new("rust", 2, 0.5).unwrap();
    let results = client.search(&query).await.unwrap();
    assert_eq!(results, vec!["rust is fast".to_string()]);
    assert_eq!(
        recorded.bodies.lock().unwrap()[0],
        json!({ "query": "rust", "top_k": 2, "similarity_threshold": 0.5 })
    );
}

#[tokio::test]
async fn server_error_field_becomes_the_message() {
    let router = Router::new()
        .route(
            "/rag/clear",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "disk full" })),
                )
            }),
        )
        .route(
            "/rag/add",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
        );
    let orch = Orchestrator::new(transport(spawn_server(router).await));

    match orch.transport().clear_documents().await {
        Err(TransportError::Server { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "disk full");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert_eq!(orch.clear().await, OpOutcome::Failed);
    assert_eq!(orch.add("hello").await, OpOutcome::Failed);
    let state = orch.snapshot().await;
    let log: Vec<_> = state.log.messages().collect();
    assert_eq!(
        log,
        vec![
            "Failed to clear: disk full",
            "Failed to add: request failed with status 503 Service Unavailable",
        ]
    );
}

#[tokio::test]
async fn add_then_reload_over_http() {
    let corpus: Arc<Mutex<Vec<Value>>> = Arc::default();
    let router = Router::new()
        .route(
            "/rag/add",
            post(
                |State(corpus): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                    let mut docs = corpus.lock().unwrap();
                    let id = (docs.len() + 1).to_string();
                    docs.push(json!({ "id": id, "text": body["text"] }));
                    Json(json!({ "status": "ok" }))
                },
            ),
        )
        .route(
            "/rag/list",
            get(|State(corpus): State<Arc<Mutex<Vec<Value>>>>| async move {
                let docs = corpus.lock().unwrap().clone();
                Json(json!({ "documents": docs }))
            }),
        )
        .with_state(corpus);
    let orch = Orchestrator::new(transport(spawn_server(router).await));

    assert_eq!(orch.add("hello").await, OpOutcome::Succeeded);

    let state = orch.snapshot().await;
    assert_eq!(
        state.docs,
        vec![Document {
            id: "1".into(),
            text: "hello".into()
        }]
    );
    let log: Vec<_> = state.log.messages().collect();
    assert_eq!(log, vec!["Added document", "Loaded 1 documents"]);
}

#[tokio::test]
async fn benchmark_keeps_topk_order_and_sends_empty_body() {
    let recorded = Recorded::default();
    let router = Router::new()
        .route(
            "/rag_metrics",
            post(
                |State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                    rec.bodies.lock().unwrap().push(body);
                    ([(header::CONTENT_TYPE, "application/json")], BENCHMARK_BODY)
                },
            ),
        )
        .with_state(recorded.clone());
    let orch = Orchestrator::new(transport(spawn_server(router).await));

    assert_eq!(orch.benchmark(false, None).await, OpOutcome::Succeeded);

    assert_eq!(recorded.bodies.lock().unwrap()[0], json!({}));
    let state = orch.snapshot().await;
    let metrics = state.metrics.expect("metrics stored");
    let keys: Vec<_> = metrics
        .retrieval_performance
        .topk_avg_times_ms
        .iter()
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(keys, vec!["10", "1", "5"]);
    assert_eq!(
        metrics.rag_impact,
        Some(rag_bench::metrics::RagImpact::Skipped {
            reason: "no LLM named".into()
        })
    );
}

#[tokio::test]
async fn benchmark_gets_its_own_longer_timeout() {
    let router = Router::new()
        .route(
            "/rag/list",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({ "documents": [] }))
            }),
        )
        .route(
            "/rag_metrics",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                ([(header::CONTENT_TYPE, "application/json")], BENCHMARK_BODY)
            }),
        );
    let base_url = spawn_server(router).await;
    let client = HttpTransport::new(&ClientConfig {
        base_url,
        timeout: Duration::from_millis(100),
        benchmark_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    })
    .unwrap();

    match client.list_documents().await {
        Err(TransportError::Request(e)) => assert!(e.is_timeout()),
        other => panic!("expected a timeout, got {other:?}"),
    }

    let raw = client
        .run_benchmark(&BenchmarkRequest::default())
        .await
        .unwrap();
    assert_eq!(raw.documents_indexed, Some(3));
}
