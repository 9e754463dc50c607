use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sentinel_console::backend::Backend;
use sentinel_console::models::SimulationRequest;
use sentinel_console::{
    AttackPathQuery, ClientConfig, ConsoleError, GraphOutcome, IncidentId, InvestigationSession,
    NodeId, RemoteBackend, SimulationOutcome,
};
use serde_json::{json, Value};
use std::sync::Arc;

const REPORT_BYTES: &[u8] = &[0x25, 0x50, 0x44, 0x46, 0x2d, 0x31, 0x2e, 0x34, 0x0a, 0xe2, 0xe3, 0xcf, 0xd3, 0x00, 0xff];

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn graph_handler(Path(id): Path<String>) -> Json<Value> {
    if id == "missing" {
        return Json(json!({"error": "not found"}));
    }
    Json(json!({
        "nodes": [{"id": "endpoint-1", "meta": {"kind": "host"}}, {"id": "db-2"}],
        "edges": [
            {"from": "endpoint-1", "to": "db-2", "meta": {"rel": "connects"}},
            {"from": "db-2", "to": "k8s-node-7"},
        ],
    }))
}

async fn report_handler(Path(id): Path<String>) -> impl IntoResponse {
    let disposition = format!("attachment; filename=incident_{}.pdf", id);
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        REPORT_BYTES.to_vec(),
    )
}

fn sentinel_app() -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route(
            "/incidents",
            get(|| async {
                Json(json!([
                    {"id": "INC-1", "source": "endpoint-1", "severity": 0.8, "description": "suspicious process spawn", "timestamp": 100.0},
                    {"id": "INC-2", "source": "db-2", "severity": 0.95, "description": "credential brute force", "timestamp": 200.0},
                ]))
            }),
        )
        .route("/agent/run", post(|| async { Json(json!({"incident_id": "INC-3"})) }))
        .route("/storyboard/graph/:id", get(graph_handler))
        .route(
            "/tier3/analyze/:id",
            post(|Path(id): Path<String>| async move {
                Json(json!({"mode": "template", "analysis": {"incident_id": id}, "context": []}))
            }),
        )
        .route(
            "/attackpath/simulate",
            post(|Json(body): Json<Value>| async move {
                Json(json!({"paths": [["endpoint-1", "api-gateway", "db-2"]], "vector_hints": [], "received": body}))
            }),
        )
        .route("/incident/:id/report", get(report_handler))
        .route(
            "/zero-day/scan",
            post(|| async { Json(json!({"status": "error", "error": "scanner offline"})) }),
        )
}

async fn backend() -> RemoteBackend {
    let url = serve(sentinel_app()).await;
    RemoteBackend::new(&ClientConfig::new(&url)).unwrap()
}

#[tokio::test]
async fn test_list_and_hunt() {
    let backend = backend().await;

    let incidents = backend.list_incidents().await.unwrap();
    assert_eq!(incidents.len(), 2);
    assert_eq!(incidents[0].id, IncidentId::new("INC-1"));
    assert_eq!(incidents[1].source.as_deref(), Some("db-2"));

    backend.trigger_hunt().await.unwrap();
    assert!(backend.health().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_graph_and_explicit_error() {
    let backend = backend().await;

    let graph = backend.fetch_graph(&IncidentId::new("INC-1")).await.unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 2);

    let err = backend.fetch_graph(&IncidentId::new("missing")).await.unwrap_err();
    assert_eq!(err, ConsoleError::Backend("not found".to_string()));
}

#[tokio::test]
async fn test_simulation_request_body() {
    let backend = backend().await;
    let request = SimulationRequest {
        entry_nodes: vec![NodeId::from("endpoint-1")],
        targets: vec![NodeId::from("db-2")],
        query: "data exfil".to_string(),
    };

    let result = backend.simulate_attack_path(&request).await.unwrap();
    assert_eq!(
        result["received"],
        json!({"entry_nodes": ["endpoint-1"], "targets": ["db-2"], "query": "data exfil"})
    );
}

#[tokio::test]
async fn test_report_bytes_are_not_decoded() {
    let backend = backend().await;
    let bytes = backend.fetch_report(&IncidentId::new("INC-2")).await.unwrap();
    assert_eq!(bytes.as_ref(), REPORT_BYTES);
}

#[tokio::test]
async fn test_zero_day_error_status() {
    let backend = backend().await;
    let err = backend.zero_day_scan().await.unwrap_err();
    assert_eq!(err, ConsoleError::Backend("scanner offline".to_string()));
}

#[tokio::test]
async fn test_error_status_uses_body_message() {
    let app = Router::new().route(
        "/incidents",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "engine crashed"}))) }),
    );
    let url = serve(app).await;
    let backend = RemoteBackend::new(&ClientConfig::new(&url)).unwrap();

    let err = backend.list_incidents().await.unwrap_err();
    assert_eq!(err, ConsoleError::Backend("engine crashed".to_string()));

    // Unknown route: plain 404 without a JSON body
    let err = backend.health().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Backend(ref m) if m.contains("404")));
}

#[tokio::test]
async fn test_storyboard_timeline() {
    let app = Router::new().route(
        "/storyboard/:id",
        get(|Path(id): Path<String>| async move {
            Json(json!({
                "timeline": [{"id": id, "timestamp": 100.0, "severity": 0.8, "description": "suspicious process spawn"}],
                "narrative": format!("Incident Storyboard for {} (source: endpoint-1)", id),
            }))
        }),
    );
    let url = serve(app).await;
    let backend = RemoteBackend::new(&ClientConfig::new(&url)).unwrap();

    let storyboard = backend.fetch_storyboard(&IncidentId::new("INC-1")).await.unwrap();
    assert_eq!(storyboard.timeline[0].id, IncidentId::new("INC-1"));
    assert!(storyboard.narrative.contains("endpoint-1"));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = RemoteBackend::new(&ClientConfig::new(&format!("http://{}", addr))).unwrap();
    assert!(matches!(backend.list_incidents().await, Err(ConsoleError::Transport(_))));
}

#[tokio::test]
async fn test_session_end_to_end_over_http() {
    let url = serve(sentinel_app()).await;
    let dir = tempfile::tempdir().unwrap();
    let session = InvestigationSession::connect(ClientConfig::new(&url))
        .unwrap()
        .with_report_sink(Arc::new(sentinel_console::FileReportSink::new(dir.path())));

    assert_eq!(session.refresh_incidents().await.unwrap(), 2);
    let newest = session.incidents().state().incidents[0].id.clone();
    assert_eq!(newest, IncidentId::new("INC-2"));

    match session.select_incident(newest.clone()).await.unwrap() {
        GraphOutcome::Loaded(graph) => {
            assert_eq!(graph.node_count(), 2);
            assert_eq!(graph.edge_count(), 1);
            assert_eq!(graph.diagnostics.dropped_edges, 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    session.run_tier3().await.unwrap();
    let tier3 = session.current_tier3().unwrap();
    assert_eq!(tier3.result().unwrap()["analysis"]["incident_id"], json!("INC-2"));

    let outcome = session.simulate_path(AttackPathQuery::default()).await.unwrap();
    assert!(matches!(outcome, SimulationOutcome::Completed(ref v) if v["paths"][0][1] == "api-gateway"));

    let location = session.download_report().await.unwrap();
    assert_eq!(location, dir.path().join("incident_INC-2.pdf"));
    assert_eq!(std::fs::read(location).unwrap(), REPORT_BYTES);
}
