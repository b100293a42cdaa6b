// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response bodies of the engine's JSON API, one struct per view or action.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::errors::{ScanError, ScanResult};
use crate::types::{Alert, AlertsSummary, Progress, Risk};

/// `{"scan": "3"}` from spider/ascan scan actions
#[derive(Debug, Deserialize)]
pub struct ScanStarted {
    pub scan: String,
}

/// `{"status": "40"}` from spider/ascan status views
#[derive(Debug, Deserialize)]
pub struct ScanStatus {
    pub status: String,
}

impl ScanStatus {
    pub fn progress(&self, operation: &str) -> ScanResult<Progress> {
        self.status
            .trim()
            .parse::<u32>()
            .map(Progress::new)
            .map_err(|e| {
                ScanError::decode(
                    operation,
                    format!("status {:?} is not a percentage: {}", self.status, e),
                )
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct AlertsView {
    pub alerts: Vec<Alert>,
}

/// Counts keyed by risk name. Older engines send counts as strings.
#[derive(Debug, Deserialize)]
pub struct AlertsSummaryView {
    #[serde(rename = "alertsSummary")]
    pub alerts_summary: BTreeMap<String, serde_json::Value>,
}

impl AlertsSummaryView {
    pub fn into_summary(self, operation: &str) -> ScanResult<AlertsSummary> {
        let mut counts = Vec::with_capacity(self.alerts_summary.len());

        for (name, value) in self.alerts_summary {
            let risk = parse_risk(&name)
                .ok_or_else(|| ScanError::decode(operation, format!("unknown risk {:?}", name)))?;

            let count = match &value {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            }
            .ok_or_else(|| {
                ScanError::decode(operation, format!("count for {} is {}", name, value))
            })?;

            counts.push((risk, count));
        }

        Ok(AlertsSummary::from_counts(counts))
    }
}

fn parse_risk(name: &str) -> Option<Risk> {
    match name {
        "High" => Some(Risk::High),
        "Medium" => Some(Risk::Medium),
        "Low" => Some(Risk::Low),
        "Informational" | "Info" => Some(Risk::Informational),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlsView {
    pub urls: Vec<String>,
}

/// `{"Result": "OK"}` from actions without a payload
#[derive(Debug, Deserialize)]
pub struct ActionResult {
    #[serde(rename = "Result")]
    pub result: String,
}

impl ActionResult {
    pub fn ensure_ok(&self, operation: &str) -> ScanResult<()> {
        if self.result.eq_ignore_ascii_case("OK") {
            Ok(())
        } else {
            Err(ScanError::rejected(operation, format!("engine answered {:?}", self.result)))
        }
    }
}

/// Error document the engine sends for rejected calls
#[derive(Debug, Deserialize)]
pub struct EngineErrorBody {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for EngineErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}
