//! HTTP Service Module
//!
//! Exposes the ingestion and query services over HTTP:
//! - `POST /api/report`: store one interval report
//! - `GET  /api/traffic`: full history, ascending by timestamp label
//! - `GET  /healthz`: liveness probe
//! - `GET  /`: minimal status page

mod dto;
mod handlers;

pub use dto::{ApiError, ReportAccepted};

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::history::{IngestionService, QueryService};
use crate::core::store::ReportStore;
use crate::core::{CoreError, CoreResult};

/// State shared by all request handlers
#[derive(Clone)]
pub struct ServerState {
    pub ingest: IngestionService,
    pub query: QueryService,
    pub info: Arc<ServerInfo>,
}

/// Static details shown on the status page
#[derive(Clone, Debug, Default)]
pub struct ServerInfo {
    pub location_name: String,
    pub timezone: String,
}

impl ServerState {
    pub fn new<P: AsRef<Path>>(db_path: P, info: ServerInfo) -> Self {
        Self {
            ingest: IngestionService::new(&db_path),
            query: QueryService::new(&db_path),
            info: Arc::new(info),
        }
    }
}

/// Builds the service router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/report", post(handlers::submit_report))
        .route("/api/traffic", get(handlers::list_traffic))
        .with_state(state)
}

/// Creates or migrates the database before the first request arrives
pub fn init_database(db_path: &Path) -> CoreResult<()> {
    let existed = db_path.exists();
    let store = ReportStore::open(db_path)?;
    if existed {
        info!(
            "Database '{}' found and verified ({} reports)",
            db_path.display(),
            store.len()?
        );
    } else {
        info!("Database '{}' created", db_path.display());
    }
    Ok(())
}

/// Running HTTP server
pub struct ServerHandle {
    pub local_addr: SocketAddr,
    pub task: tokio::task::JoinHandle<CoreResult<()>>,
}

/// Binds `bind_addr` and serves requests on a background task
pub async fn spawn_server(bind_addr: &str, db_path: PathBuf, info: ServerInfo) -> CoreResult<ServerHandle> {
    init_database(&db_path)?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| CoreError::Internal(format!("Failed to bind {}: {}", bind_addr, e)))?;
    let local_addr = listener.local_addr()?;

    let app = router(ServerState::new(&db_path, info));
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .map_err(|e| CoreError::Internal(format!("HTTP server failed: {}", e)))
    });

    info!("History service listening on http://{}", local_addr);
    Ok(ServerHandle { local_addr, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reporting::{HttpReportSink, ReportSink};
    use crate::core::{HistoryEntry, Report};
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn start() -> (ServerHandle, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_server(
            "127.0.0.1:0",
            dir.path().join("trafic.db"),
            ServerInfo {
                location_name: "I-278 at Adams Street".to_string(),
                timezone: "America/New_York".to_string(),
            },
        )
        .await
        .unwrap();
        (handle, dir)
    }

    fn url(handle: &ServerHandle, path: &str) -> String {
        format!("http://{}{}", handle.local_addr, path)
    }

    #[tokio::test]
    async fn test_post_report_returns_created() {
        let (server, _dir) = start().await;
        let client = reqwest::Client::new();

        let response = client
            .post(url(&server, "/api/report"))
            .json(&json!({"timestamp": "14:00", "count": 150}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["id"], 1);
        assert_eq!(body["received"], json!({"timestamp": "14:00", "count": 150}));

        let history: Vec<HistoryEntry> = client
            .get(url(&server, "/api/traffic"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            history,
            vec![HistoryEntry {
                timestamp: "14:00".to_string(),
                count: 150,
                location: "N/A".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_post_missing_timestamp_is_bad_request() {
        let (server, _dir) = start().await;
        let client = reqwest::Client::new();

        let response = client
            .post(url(&server, "/api/report"))
            .json(&json!({"count": 150}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "error");

        let history: Vec<Value> = client
            .get(url(&server, "/api/traffic"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_post_oversized_count_is_bad_request() {
        let (server, _dir) = start().await;
        let response = reqwest::Client::new()
            .post(url(&server, "/api/report"))
            .json(&json!({"timestamp": "14:00", "count": u64::MAX}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_concurrent_posts_are_all_stored() {
        let (server, _dir) = start().await;
        let client = reqwest::Client::new();
        let endpoint = url(&server, "/api/report");

        let mut tasks = Vec::new();
        for i in 0..32u64 {
            let client = client.clone();
            let endpoint = endpoint.clone();
            tasks.push(tokio::spawn(async move {
                client
                    .post(endpoint)
                    .json(&json!({"timestamp": format!("10:{:02}", i), "count": i}))
                    .send()
                    .await
                    .unwrap()
                    .status()
                    .as_u16()
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), 201);
        }

        let history: Vec<HistoryEntry> = client
            .get(url(&server, "/api/traffic"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history.len(), 32);
        assert_eq!(history.iter().map(|h| h.count).sum::<u64>(), (0..32).sum::<u64>());
    }

    #[tokio::test]
    async fn test_post_non_json_is_bad_request() {
        let (server, _dir) = start().await;
        let response = reqwest::Client::new()
            .post(url(&server, "/api/report"))
            .body("timestamp=14:00&count=3")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_history_is_sorted_by_timestamp() {
        let (server, _dir) = start().await;
        let client = reqwest::Client::new();

        for (stamp, count) in [("09:00", 12), ("08:30", 8)] {
            let status = client
                .post(url(&server, "/api/report"))
                .json(&json!({"timestamp": stamp, "count": count, "location": "Test"}))
                .send()
                .await
                .unwrap()
                .status();
            assert_eq!(status.as_u16(), 201);
        }

        let history: Vec<HistoryEntry> = client
            .get(url(&server, "/api/traffic"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let stamps: Vec<&str> = history.iter().map(|h| h.timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["08:30", "09:00"]);
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        // The database path is a directory, so every request fails to open it.
        let app_state = ServerState::new(dir.path(), ServerInfo::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(app_state)).await });

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/api/report", addr))
            .json(&json!({"timestamp": "14:00", "count": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 500);

        let response = client
            .get(format!("http://{}/api/traffic", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 500);
    }

    #[tokio::test]
    async fn test_http_sink_delivers_to_service() {
        let (server, _dir) = start().await;
        let sink =
            HttpReportSink::new(&url(&server, "/api/report"), Duration::from_secs(5)).unwrap();

        sink.deliver(&Report {
            timestamp: "14:01".to_string(),
            count: 1,
            location: "Test".to_string(),
        })
        .await
        .unwrap();

        let history: Vec<HistoryEntry> = reqwest::get(url(&server, "/api/traffic"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].location, "Test");
    }

    #[tokio::test]
    async fn test_status_page_and_health() {
        let (server, _dir) = start().await;

        let health = reqwest::get(url(&server, "/healthz"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(health, "ok");

        let page = reqwest::get(url(&server, "/"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("I-278 at Adams Street"));
        assert!(page.contains("America/New_York"));
    }
}
