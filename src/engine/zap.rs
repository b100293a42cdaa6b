// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::responses::{
    ActionResult, AlertsSummaryView, AlertsView, EngineErrorBody, ScanStarted, ScanStatus,
    UrlsView,
};
use super::{ActiveScanOptions, ScanEngineClient, ScriptSpec};
use crate::errors::{classify_status, ScanError, ScanResult};
use crate::types::{ActiveScanId, Alert, AlertsSummary, Credential, Progress, SpiderScanId};

/// Header carrying the pre-shared API key on every call
pub const API_KEY_HEADER: &str = "X-ZAP-API-Key";

/// Alert listings for large targets run to tens of megabytes
const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

const DEFAULT_POOL_IDLE_PER_HOST: usize = 16;

#[derive(Debug, Clone, Copy)]
enum CallKind {
    Action,
    View,
}

impl CallKind {
    fn as_str(&self) -> &'static str {
        match self {
            CallKind::Action => "action",
            CallKind::View => "view",
        }
    }
}

/// Client for a ZAP-compatible JSON control API.
///
/// Cheap to clone; clones share one connection pool, so concurrent runs for
/// different targets never queue behind a lock.
#[derive(Clone)]
pub struct ZapClient {
    client: Arc<Client>,
    base: Url,
    api_key: Option<Arc<str>>,
    max_body_size: usize,
}

impl ZapClient {
    pub fn new(address: &str, credential: &Credential, timeout: Duration) -> ScanResult<Self> {
        let base = Url::parse(address)
            .map_err(|e| ScanError::rejected("configure engine client", format!("{}: {}", address, e)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(ScanError::rejected(
                "configure engine client",
                format!("unsupported scheme {:?} in {}", base.scheme(), address),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(DEFAULT_POOL_IDLE_PER_HOST)
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ScanError::unavailable(address, format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            base,
            api_key: credential.key_material().filter(|k| !k.is_empty()).map(Arc::from),
            max_body_size: MAX_BODY_SIZE,
        })
    }

    /// Cap on response bodies; larger responses fail with `Decode`
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn address(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, component: &str, kind: CallKind, name: &str, params: &[(&str, &str)]) -> Url {
        let path = format!(
            "{}/JSON/{}/{}/{}/",
            self.base.path().trim_end_matches('/'),
            component,
            kind.as_str(),
            name
        );
        let mut url = self.base.clone();
        url.set_path(&path);
        url.set_query(None);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        url
    }

    /// Read at most `max_body_size` bytes without buffering past the cap
    async fn read_body(&self, operation: &str, mut response: reqwest::Response) -> ScanResult<Vec<u8>> {
        let too_large = |size: u64| {
            ScanError::decode(
                operation,
                format!("response of {} bytes exceeds {}", size, self.max_body_size),
            )
        };

        if let Some(declared) = response.content_length() {
            if declared > self.max_body_size as u64 {
                return Err(too_large(declared));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            ScanError::unavailable(self.base.as_str(), format!("{}: reading body: {}", operation, e))
        })? {
            if body.len() + chunk.len() > self.max_body_size {
                return Err(too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        component: &str,
        kind: CallKind,
        name: &str,
        params: &[(&str, &str)],
    ) -> ScanResult<T> {
        let operation = format!("{}/{}", component, name);
        let url = self.endpoint(component, kind, name, params);

        trace!(operation = %operation, url = %url, "Engine call");

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            ScanError::unavailable(self.base.as_str(), format!("{}: {}", operation, e))
        })?;

        let status = response.status();
        let body = self.read_body(&operation, response).await?;

        if !status.is_success() {
            let message = match serde_json::from_slice::<EngineErrorBody>(&body) {
                Ok(err) => err.to_string(),
                Err(_) => String::from_utf8_lossy(&body).chars().take(256).collect(),
            };
            debug!(operation = %operation, status = status.as_u16(), "Engine call failed");
            return Err(classify_status(&operation, status.as_u16(), &message));
        }

        // Some engine versions report errors with a 200 status.
        if let Ok(err) = serde_json::from_slice::<EngineErrorBody>(&body) {
            return Err(ScanError::rejected(&operation, err.to_string()));
        }

        serde_json::from_slice::<T>(&body).map_err(|e| ScanError::decode(&operation, e.to_string()))
    }
}

#[async_trait]
impl ScanEngineClient for ZapClient {
    async fn start_spider(&self, target: &str) -> ScanResult<SpiderScanId> {
        let started: ScanStarted = self
            .call(
                "spider",
                CallKind::Action,
                "scan",
                &[
                    ("url", target),
                    ("maxChildren", ""),
                    ("recurse", ""),
                    ("contextName", ""),
                    ("subtreeOnly", ""),
                ],
            )
            .await?;
        Ok(SpiderScanId(started.scan))
    }

    async fn spider_status(&self, id: &SpiderScanId) -> ScanResult<Progress> {
        let status: ScanStatus = self
            .call("spider", CallKind::View, "status", &[("scanId", id.0.as_str())])
            .await?;
        status.progress("spider/status")
    }

    async fn start_active_scan(
        &self,
        target: &str,
        options: &ActiveScanOptions,
    ) -> ScanResult<ActiveScanId> {
        let recurse = if options.recurse { "True" } else { "False" };
        let in_scope_only = if options.in_scope_only { "True" } else { "False" };
        let policy = options.scan_policy.as_deref().unwrap_or("");

        let started: ScanStarted = self
            .call(
                "ascan",
                CallKind::Action,
                "scan",
                &[
                    ("url", target),
                    ("recurse", recurse),
                    ("inScopeOnly", in_scope_only),
                    ("scanPolicyName", policy),
                    ("method", ""),
                    ("postData", ""),
                ],
            )
            .await?;
        Ok(ActiveScanId(started.scan))
    }

    async fn active_scan_status(&self, id: &ActiveScanId) -> ScanResult<Progress> {
        let status: ScanStatus = self
            .call("ascan", CallKind::View, "status", &[("scanId", id.0.as_str())])
            .await?;
        status.progress("ascan/status")
    }

    async fn fetch_alerts(&self, target: &str) -> ScanResult<Vec<Alert>> {
        let view: AlertsView = self
            .call(
                "core",
                CallKind::View,
                "alerts",
                &[("baseurl", target), ("start", ""), ("count", ""), ("riskId", "")],
            )
            .await?;
        Ok(view.alerts)
    }

    async fn fetch_summary(&self, target: &str) -> ScanResult<AlertsSummary> {
        let view: AlertsSummaryView = self
            .call("core", CallKind::View, "alertsSummary", &[("baseurl", target)])
            .await?;
        view.into_summary("core/alertsSummary")
    }

    async fn load_script(&self, script: &ScriptSpec) -> ScanResult<()> {
        let result: ActionResult = self
            .call(
                "script",
                CallKind::Action,
                "load",
                &[
                    ("scriptName", script.name.as_str()),
                    ("scriptType", script.script_type.as_str()),
                    ("scriptEngine", script.engine.as_str()),
                    ("fileName", script.file_name.as_str()),
                    ("scriptDescription", ""),
                    ("charset", ""),
                ],
            )
            .await?;
        result.ensure_ok("script/load")
    }

    async fn enable_script(&self, name: &str) -> ScanResult<()> {
        let result: ActionResult = self
            .call("script", CallKind::Action, "enable", &[("scriptName", name)])
            .await?;
        result.ensure_ok("script/enable")
    }

    async fn import_openapi(&self, spec_url: &str, target: &str) -> ScanResult<Vec<String>> {
        // The import action answers with a list of warnings, not the imported URLs.
        let _: serde_json::Value = self
            .call(
                "openapi",
                CallKind::Action,
                "importUrl",
                &[("url", spec_url), ("hostOverride", "")],
            )
            .await?;
        self.list_urls(target).await
    }

    async fn list_urls(&self, target: &str) -> ScanResult<Vec<String>> {
        let view: UrlsView = self
            .call("core", CallKind::View, "urls", &[("baseurl", target)])
            .await?;
        Ok(view.urls)
    }
}
