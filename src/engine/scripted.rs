// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Simulated engine replaying scripted progress sequences.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::{ActiveScanOptions, ScanEngineClient, ScriptSpec};
use crate::errors::{ScanError, ScanResult};
use crate::types::{ActiveScanId, Alert, AlertsSummary, Progress, SpiderScanId};

/// Engine double. Progress sequences repeat their last value once drained;
/// queued failures are returned before any scripted success for that call.
#[derive(Default)]
pub struct ScriptedEngine {
    spider: Mutex<VecDeque<u32>>,
    active: Mutex<VecDeque<u32>>,
    alerts: Vec<Alert>,
    summary: Option<AlertsSummary>,
    urls: Vec<String>,
    failures: Mutex<HashMap<&'static str, VecDeque<ScanError>>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spider_progress<I: IntoIterator<Item = u32>>(mut self, seq: I) -> Self {
        self.spider = Mutex::new(seq.into_iter().collect());
        self
    }

    pub fn active_progress<I: IntoIterator<Item = u32>>(mut self, seq: I) -> Self {
        self.active = Mutex::new(seq.into_iter().collect());
        self
    }

    pub fn alerts(mut self, alerts: Vec<Alert>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn summary(mut self, summary: AlertsSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn urls<I: IntoIterator<Item = &'static str>>(mut self, urls: I) -> Self {
        self.urls = urls.into_iter().map(String::from).collect();
        self
    }

    pub fn fail(self, call: &'static str, error: ScanError) -> Self {
        self.failures.lock().entry(call).or_default().push_back(error);
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: &'static str) -> ScanResult<()> {
        self.calls.lock().push(call);
        match self.failures.lock().get_mut(call).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next(seq: &Mutex<VecDeque<u32>>) -> Progress {
        let mut seq = seq.lock();
        let value = if seq.len() > 1 {
            seq.pop_front()
        } else {
            seq.front().copied()
        };
        Progress::new(value.unwrap_or(100))
    }
}

#[async_trait]
impl ScanEngineClient for ScriptedEngine {
    async fn start_spider(&self, _target: &str) -> ScanResult<SpiderScanId> {
        self.record("start_spider")?;
        Ok(SpiderScanId("0".into()))
    }

    async fn spider_status(&self, _id: &SpiderScanId) -> ScanResult<Progress> {
        self.record("spider_status")?;
        Ok(Self::next(&self.spider))
    }

    async fn start_active_scan(
        &self,
        _target: &str,
        _options: &ActiveScanOptions,
    ) -> ScanResult<ActiveScanId> {
        self.record("start_active_scan")?;
        Ok(ActiveScanId("1".into()))
    }

    async fn active_scan_status(&self, _id: &ActiveScanId) -> ScanResult<Progress> {
        self.record("active_scan_status")?;
        Ok(Self::next(&self.active))
    }

    async fn fetch_alerts(&self, _target: &str) -> ScanResult<Vec<Alert>> {
        self.record("fetch_alerts")?;
        Ok(self.alerts.clone())
    }

    async fn fetch_summary(&self, _target: &str) -> ScanResult<AlertsSummary> {
        self.record("fetch_summary")?;
        Ok(self
            .summary
            .clone()
            .unwrap_or_else(|| AlertsSummary::from_alerts(&self.alerts)))
    }

    async fn load_script(&self, _script: &ScriptSpec) -> ScanResult<()> {
        self.record("load_script")
    }

    async fn enable_script(&self, _name: &str) -> ScanResult<()> {
        self.record("enable_script")
    }

    async fn import_openapi(&self, _spec_url: &str, _target: &str) -> ScanResult<Vec<String>> {
        self.record("import_openapi")?;
        Ok(self.urls.clone())
    }

    async fn list_urls(&self, _target: &str) -> ScanResult<Vec<String>> {
        self.record("list_urls")?;
        Ok(self.urls.clone())
    }
}
