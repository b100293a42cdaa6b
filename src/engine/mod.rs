// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Engine Module
 * Typed access to the remote scan engine's control API
 *
 * © 2026 Bountyy Oy
 */

pub mod responses;
#[cfg(test)]
pub(crate) mod scripted;
pub mod zap;

pub use zap::ZapClient;

use async_trait::async_trait;

use crate::errors::ScanResult;
use crate::types::{ActiveScanId, Alert, AlertsSummary, Progress, SpiderScanId};

/// Script type for hooks on the engine's outbound traffic
pub const HTTP_SENDER_SCRIPT_TYPE: &str = "httpsender";

/// Script engine the response-inspection scripts are written for
pub const DEFAULT_SCRIPT_ENGINE: &str = "Oracle Nashorn";

/// Where the engine image keeps its bundled scripts
pub const DEFAULT_SCRIPT_DIR: &str = "/home/zap/.ZAP_D/scripts/scripts/httpsender";

/// Response-inspection scripts enabled before an API scan
pub const RESPONSE_INSPECTION_SCRIPTS: &[&str] = &[
    "Alert_on_HTTP_Response_Code_Errors.js",
    "Alert_on_Unexpected_Content_Types.js",
];

/// Capability-typed view of the scan engine.
///
/// Every call is a single round trip: no polling, no retries. Implementations
/// must tolerate concurrent use from unrelated runs.
#[async_trait]
pub trait ScanEngineClient: Send + Sync {
    async fn start_spider(&self, target: &str) -> ScanResult<SpiderScanId>;

    async fn spider_status(&self, id: &SpiderScanId) -> ScanResult<Progress>;

    async fn start_active_scan(
        &self,
        target: &str,
        options: &ActiveScanOptions,
    ) -> ScanResult<ActiveScanId>;

    async fn active_scan_status(&self, id: &ActiveScanId) -> ScanResult<Progress>;

    async fn fetch_alerts(&self, target: &str) -> ScanResult<Vec<Alert>>;

    async fn fetch_summary(&self, target: &str) -> ScanResult<AlertsSummary>;

    async fn load_script(&self, script: &ScriptSpec) -> ScanResult<()>;

    async fn enable_script(&self, name: &str) -> ScanResult<()>;

    /// Import an OpenAPI document against `target` and return the URLs the engine now knows for it
    async fn import_openapi(&self, spec_url: &str, target: &str) -> ScanResult<Vec<String>>;

    async fn list_urls(&self, target: &str) -> ScanResult<Vec<String>>;
}

/// Options for starting an active scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveScanOptions {
    /// Attack everything under the target, including what the spider or import found
    pub recurse: bool,
    pub in_scope_only: bool,
    pub scan_policy: Option<String>,
}

impl ActiveScanOptions {
    /// Attack the crawled tree beneath the target without restricting to a context scope
    pub fn crawl_then_attack() -> Self {
        Self {
            recurse: true,
            in_scope_only: false,
            scan_policy: None,
        }
    }
}

impl Default for ActiveScanOptions {
    fn default() -> Self {
        Self::crawl_then_attack()
    }
}

/// A script to load into the engine
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSpec {
    pub name: String,
    pub script_type: String,
    pub engine: String,
    pub file_name: String,
}

impl ScriptSpec {
    /// An HTTP-sender script shipped with the engine image under `dir`
    pub fn http_sender(name: &str, dir: &str) -> Self {
        Self {
            name: name.to_string(),
            script_type: HTTP_SENDER_SCRIPT_TYPE.to_string(),
            engine: DEFAULT_SCRIPT_ENGINE.to_string(),
            file_name: format!("{}/{}", dir.trim_end_matches('/'), name),
        }
    }
}

/// The fixed response-inspection pair, resolved against `dir`
pub fn response_inspection_scripts(dir: &str) -> Vec<ScriptSpec> {
    RESPONSE_INSPECTION_SCRIPTS
        .iter()
        .map(|name| ScriptSpec::http_sender(name, dir))
        .collect()
}
