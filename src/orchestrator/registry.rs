// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::errors::{ScanError, ScanResult};
use crate::types::{ActiveScanId, SpiderScanId};

/// What we track locally about a run that has not finished yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub run_id: Uuid,
    pub spider_scan_id: Option<SpiderScanId>,
    pub active_scan_id: Option<ActiveScanId>,
}

/// Process-wide set of targets with a run in flight. At most one per target URL.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<Mutex<HashMap<String, InFlight>>>,
}

static GLOBAL: OnceLock<RunRegistry> = OnceLock::new();

impl RunRegistry {
    /// A registry private to its holders. Tests and embedders that want
    /// isolation use this; orchestrators default to [`RunRegistry::global`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every orchestrator in the process
    pub fn global() -> Self {
        GLOBAL.get_or_init(RunRegistry::new).clone()
    }

    /// Claim `target` for `run_id`; released when the guard drops
    pub fn acquire(&self, target: &str, run_id: Uuid) -> ScanResult<RunGuard> {
        let key = registry_key(target);
        let mut runs = self.runs.lock();
        if runs.contains_key(&key) {
            return Err(ScanError::AlreadyRunning {
                target: target.to_string(),
            });
        }

        runs.insert(
            key.clone(),
            InFlight {
                run_id,
                spider_scan_id: None,
                active_scan_id: None,
            },
        );

        Ok(RunGuard {
            runs: Arc::clone(&self.runs),
            target: key,
            run_id,
        })
    }

    pub fn in_flight(&self, target: &str) -> Option<InFlight> {
        self.runs.lock().get(&registry_key(target)).cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.lock().is_empty()
    }
}

/// Spellings of one URL (empty path, host case, default port) share a slot
fn registry_key(target: &str) -> String {
    Url::parse(target)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| target.to_string())
}

/// Ownership of one target's registry slot
pub struct RunGuard {
    runs: Arc<Mutex<HashMap<String, InFlight>>>,
    target: String,
    run_id: Uuid,
}

impl RunGuard {
    pub fn record_spider(&self, id: &SpiderScanId) {
        if let Some(entry) = self.runs.lock().get_mut(&self.target) {
            entry.spider_scan_id = Some(id.clone());
        }
    }

    pub fn record_active(&self, id: &ActiveScanId) {
        if let Some(entry) = self.runs.lock().get_mut(&self.target) {
            entry.active_scan_id = Some(id.clone());
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut runs = self.runs.lock();
        if runs.get(&self.target).map(|e| e.run_id) == Some(self.run_id) {
            if let Some(released) = runs.remove(&self.target) {
                debug!(
                    target_url = %self.target,
                    run_id = %self.run_id,
                    spider_scan_id = ?released.spider_scan_id,
                    active_scan_id = ?released.active_scan_id,
                    "Released run tracking"
                );
            }
        }
    }
}
