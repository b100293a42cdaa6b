// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Result Publishing
 * Writes a finished report to disk or serves it over HTTP
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::errors::PublishError;
use crate::orchestrator::CancelSignal;
use crate::types::{AlertsSummary, ScanReport};

/// Sink for a finished report
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    async fn publish(&self, report: &ScanReport) -> Result<(), PublishError>;
}

/// Writes the alerts document to a file
pub struct FilePublisher {
    path: PathBuf,
}

impl FilePublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultPublisher for FilePublisher {
    async fn publish(&self, report: &ScanReport) -> Result<(), PublishError> {
        let document = report.alerts_document()?;
        tokio::fs::write(&self.path, &document)
            .await
            .map_err(|source| PublishError::Write {
                path: self.path.display().to_string(),
                source,
            })?;

        info!(path = ?self.path, alerts = report.alerts.len(), "Results written");
        Ok(())
    }
}

/// Encoded once, served many times
struct PublishedResults {
    alerts: Vec<u8>,
    summary: AlertsSummary,
}

/// Serves the alerts document until `shutdown` fires
pub struct HttpPublisher {
    bind: SocketAddr,
    shutdown: CancelSignal,
}

impl HttpPublisher {
    pub fn new(bind: SocketAddr, shutdown: CancelSignal) -> Self {
        Self { bind, shutdown }
    }
}

#[async_trait]
impl ResultPublisher for HttpPublisher {
    async fn publish(&self, report: &ScanReport) -> Result<(), PublishError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|source| PublishError::Bind {
                addr: self.bind.to_string(),
                source,
            })?;
        info!(addr = %self.bind, "Serving scan results");

        serve(listener, report, self.shutdown.clone()).await
    }
}

/// Routes over an encoded report
pub fn router(report: &ScanReport) -> Result<Router, PublishError> {
    let state = Arc::new(PublishedResults {
        alerts: report.alerts_document()?,
        summary: report.summary.clone(),
    });

    Ok(Router::new()
        .route("/", get(alerts))
        .route("/alerts", get(alerts))
        .route("/summary", get(summary))
        .route("/health", get(|| async { "OK" }))
        .with_state(state))
}

/// Serve on an already bound listener
pub async fn serve(
    listener: TcpListener,
    report: &ScanReport,
    shutdown: CancelSignal,
) -> Result<(), PublishError> {
    let app = router(report)?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(PublishError::Serve)?;

    info!("Result server stopped");
    Ok(())
}

async fn alerts(State(results): State<Arc<PublishedResults>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        results.alerts.clone(),
    )
}

async fn summary(State(results): State<Arc<PublishedResults>>) -> Json<AlertsSummary> {
    Json(results.summary.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::cancellation;
    use crate::types::{Alert, Risk, ScanMode};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn report() -> ScanReport {
        let mut extra = BTreeMap::new();
        extra.insert("solution".to_string(), serde_json::json!("Escape output"));
        let alerts = vec![Alert {
            id: "7".to_string(),
            risk: Risk::High,
            url: "http://target/search".to_string(),
            description: "Reflected XSS".to_string(),
            name: "Cross Site Scripting (Reflected)".to_string(),
            plugin_id: "40012".to_string(),
            confidence: "Medium".to_string(),
            extra,
        }];

        ScanReport {
            run_id: Uuid::new_v4(),
            target: "http://target".to_string(),
            mode: ScanMode::Crawl,
            summary: AlertsSummary::from_alerts(&alerts),
            alerts,
            discovered_urls: Vec::new(),
            warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_file_publisher_writes_alerts_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");

        FilePublisher::new(&path).publish(&report()).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let records = written.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["risk"], "High");
        assert_eq!(records[0]["solution"], "Escape output");
    }

    #[tokio::test]
    async fn test_file_publisher_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("alerts.json");

        let result = FilePublisher::new(&path).publish(&report()).await;
        assert!(matches!(result, Err(PublishError::Write { .. })));
    }

    #[tokio::test]
    async fn test_http_routes_and_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (handle, signal) = cancellation();
        let report = report();

        let server = tokio::spawn(async move { serve(listener, &report, signal).await });
        let base = format!("http://{}", addr);
        let client = reqwest::Client::new();

        let root: serde_json::Value = client.get(&base).send().await.unwrap().json().await.unwrap();
        let alerts: serde_json::Value = client
            .get(format!("{}/alerts", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(root, alerts);
        assert_eq!(alerts[0]["pluginId"], "40012");

        let summary: serde_json::Value = client
            .get(format!("{}/summary", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(summary["High"], 1);

        let health = client.get(format!("{}/health", base)).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "OK");

        handle.cancel();
        assert!(server.await.unwrap().is_ok());
    }
}
