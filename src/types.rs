// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which phase sequence a run follows
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Spider the target, wait for passive analysis, then attack
    Crawl,
    /// Import an OpenAPI document, then attack the discovered endpoints
    ApiSpec,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Crawl => "crawl",
            ScanMode::ApiSpec => "api-spec",
        }
    }
}

/// Identity of a watched cluster resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Credential used to authenticate against the engine.
///
/// Never printed: `Debug` redacts the key material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Credential {
    /// Key material held in memory (CLI path)
    ApiKey { value: String },
    /// Reference to a cluster secret holding the key (reconciliation path)
    SecretRef { name: String, key: String },
}

impl Credential {
    pub fn api_key(value: impl Into<String>) -> Self {
        Credential::ApiKey {
            value: value.into(),
        }
    }

    /// Key material, when this credential carries it directly
    pub fn key_material(&self) -> Option<&str> {
        match self {
            Credential::ApiKey { value } => Some(value.as_str()),
            Credential::SecretRef { .. } => None,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey { .. } => f.write_str("ApiKey(<redacted>)"),
            Credential::SecretRef { name, key } => {
                write!(f, "SecretRef({}/{})", name, key)
            }
        }
    }
}

/// Everything a run needs to know about what it scans. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTarget {
    pub url: String,
    pub engine_address: String,
    pub credential: Credential,
    #[serde(default)]
    pub analyzer_image: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub owner: Option<ResourceId>,
}

impl ScanTarget {
    pub fn new(url: impl Into<String>, engine_address: impl Into<String>, credential: Credential) -> Self {
        Self {
            url: url.into(),
            engine_address: engine_address.into(),
            credential,
            analyzer_image: None,
            namespace: None,
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: ResourceId) -> Self {
        self.namespace = Some(owner.namespace.clone());
        self.owner = Some(owner);
        self
    }
}

/// Completion percentage reported by the engine for a spider or active scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Progress(u8);

impl Progress {
    pub const DONE: Progress = Progress(100);

    /// Values above 100 are clamped
    pub fn new(percent: u32) -> Self {
        Progress(percent.min(100) as u8)
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    pub fn is_complete(&self) -> bool {
        self.0 >= 100
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Engine-assigned spider scan id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpiderScanId(pub String);

/// Engine-assigned active scan id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveScanId(pub String);

impl std::fmt::Display for SpiderScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ActiveScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Risk classification, spelled the way the engine spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Risk {
    High,
    Medium,
    Low,
    #[serde(alias = "Info")]
    Informational,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::High => "High",
            Risk::Medium => "Medium",
            Risk::Low => "Low",
            Risk::Informational => "Informational",
        }
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding. Engine-owned; fields we do not model are kept verbatim
/// so the published record matches what the engine returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub id: String,
    pub risk: Risk,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "alert", default)]
    pub name: String,
    #[serde(rename = "pluginId", default)]
    pub plugin_id: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Alert counts by risk. Zero counts are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertsSummary {
    counts: BTreeMap<Risk, u64>,
}

impl AlertsSummary {
    pub fn from_counts<I: IntoIterator<Item = (Risk, u64)>>(counts: I) -> Self {
        let mut summary = Self::default();
        for (risk, count) in counts {
            if count > 0 {
                *summary.counts.entry(risk).or_insert(0) += count;
            }
        }
        summary
    }

    pub fn from_alerts(alerts: &[Alert]) -> Self {
        Self::from_counts(alerts.iter().map(|a| (a.risk, 1)))
    }

    pub fn count(&self, risk: Risk) -> u64 {
        self.counts.get(&risk).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Risk, u64)> + '_ {
        self.counts.iter().map(|(r, c)| (*r, *c))
    }
}

/// Non-fatal conditions attached to a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RunWarning {
    /// The API specification import produced no URLs; the active scan likely covered nothing
    NoUrlsImported { spec_url: String },
    /// A response-inspection script could not be loaded or enabled
    ScriptUnavailable { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Clean,
    /// Finished, but with a condition an operator should look at
    Warnings,
}

/// Aggregated findings for one finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub run_id: Uuid,
    pub target: String,
    pub mode: ScanMode,
    pub alerts: Vec<Alert>,
    pub summary: AlertsSummary,
    #[serde(default)]
    pub discovered_urls: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<RunWarning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    /// Import failures make a report non-clean. Script warnings alone do not.
    pub fn status(&self) -> ReportStatus {
        let degraded = self
            .warnings
            .iter()
            .any(|w| matches!(w, RunWarning::NoUrlsImported { .. }));
        if degraded {
            ReportStatus::Warnings
        } else {
            ReportStatus::Clean
        }
    }

    /// The published document: the alert records, as returned by the engine
    pub fn alerts_document(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.alerts)
    }
}
