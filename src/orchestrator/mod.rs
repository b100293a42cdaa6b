// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Orchestrator
 * Drives one target through the engine's scan phases
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

pub mod poll;
pub mod registry;
pub mod run;

pub use poll::{cancellation, CancelHandle, CancelSignal, Poller};
pub use registry::{InFlight, RunGuard, RunRegistry};
pub use run::{PhaseTransition, RunOutcome, ScanPhase, ScanRun};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::engine::{
    response_inspection_scripts, ActiveScanOptions, ScanEngineClient, ScriptSpec,
    DEFAULT_SCRIPT_DIR,
};
use crate::errors::{ScanError, ScanResult};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::types::{RunWarning, ScanMode, ScanReport, ScanTarget};

/// What to do when an API specification import yields no URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyImportPolicy {
    /// Keep scanning and attach a warning to the report
    #[default]
    Warn,
    /// Abort the run with `ScanError::EmptyImport`
    Fail,
}

/// Timing and policy knobs for every run an orchestrator drives
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub spider_interval: Duration,
    /// Time given to passive analysis of crawled traffic before attacking
    pub passive_grace: Duration,
    pub active_interval: Duration,
    /// Upper bound on a whole run; `None` means only explicit cancellation stops it
    pub deadline: Option<Duration>,
    pub active_scan: ActiveScanOptions,
    pub scripts: Vec<ScriptSpec>,
    pub empty_import: EmptyImportPolicy,
    pub collect_retry: RetryConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            spider_interval: Duration::from_secs(1),
            passive_grace: Duration::from_secs(2),
            active_interval: Duration::from_secs(5),
            deadline: None,
            active_scan: ActiveScanOptions::crawl_then_attack(),
            scripts: response_inspection_scripts(DEFAULT_SCRIPT_DIR),
            empty_import: EmptyImportPolicy::Warn,
            collect_retry: RetryConfig::default(),
        }
    }
}

/// Which phase sequence to drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPlan {
    Crawl,
    ApiSpec { spec_url: String },
}

impl ScanPlan {
    pub fn mode(&self) -> ScanMode {
        match self {
            ScanPlan::Crawl => ScanMode::Crawl,
            ScanPlan::ApiSpec { .. } => ScanMode::ApiSpec,
        }
    }
}

/// Runs scans end to end against a shared engine client.
///
/// Runs for different targets may proceed concurrently; a second run for a
/// target that already has one in flight fails with `AlreadyRunning`.
pub struct ScanOrchestrator {
    client: Arc<dyn ScanEngineClient>,
    settings: OrchestratorSettings,
    registry: RunRegistry,
}

impl ScanOrchestrator {
    pub fn new(client: Arc<dyn ScanEngineClient>, settings: OrchestratorSettings) -> Self {
        Self {
            client,
            settings,
            registry: RunRegistry::global(),
        }
    }

    /// Track runs in `registry` instead of the process-wide one
    pub fn with_registry(mut self, registry: RunRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Drive one run to a terminal phase. Never panics on engine failures;
    /// the outcome is recorded on the returned run.
    pub async fn execute(&self, target: ScanTarget, plan: ScanPlan, cancel: CancelSignal) -> ScanRun {
        let mut run = ScanRun::new(target, plan.mode());

        let guard = match self.registry.acquire(&run.target.url, run.id) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(target_url = %run.target.url, error = %err, "Refusing concurrent run");
                run.fail(err);
                return run;
            }
        };

        let span = tracing::info_span!(
            "scan_run",
            run_id = %run.id,
            mode = %run.mode,
            target_url = %run.target.url
        );

        let poller = Poller::with_timeout(cancel, self.settings.deadline);
        let result = async {
            match &plan {
                ScanPlan::Crawl => self.drive_crawl(&mut run, &guard, &poller).await,
                ScanPlan::ApiSpec { spec_url } => {
                    self.drive_api_spec(&mut run, spec_url, &guard, &poller).await
                }
            }
        }
        .instrument(span)
        .await;

        match result {
            Ok(report) => {
                info!(
                    run_id = %run.id,
                    alerts = report.alerts.len(),
                    status = ?report.status(),
                    "Scan complete"
                );
                run.finish(report);
            }
            Err(ScanError::Cancelled { reason }) => {
                warn!(run_id = %run.id, phase = %run.phase, reason = %reason, "Scan cancelled");
                run.cancel(reason);
            }
            Err(err) => {
                warn!(run_id = %run.id, phase = %run.phase, error = %err, "Scan failed");
                run.fail(err);
            }
        }

        drop(guard);
        run
    }

    pub async fn run_crawl(&self, target: ScanTarget, cancel: CancelSignal) -> ScanRun {
        self.execute(target, ScanPlan::Crawl, cancel).await
    }

    pub async fn run_api_spec(&self, target: ScanTarget, spec_url: &str, cancel: CancelSignal) -> ScanRun {
        self.execute(
            target,
            ScanPlan::ApiSpec {
                spec_url: spec_url.to_string(),
            },
            cancel,
        )
        .await
    }

    /// Run on its own task so long scans stay off the caller's event path
    pub fn spawn(self: &Arc<Self>, target: ScanTarget, plan: ScanPlan, cancel: CancelSignal) -> JoinHandle<ScanRun> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.execute(target, plan, cancel).await })
    }

    async fn drive_crawl(&self, run: &mut ScanRun, guard: &RunGuard, poller: &Poller) -> ScanResult<ScanReport> {
        let target = run.target.url.clone();

        run.transition(ScanPhase::Spidering);
        info!(target_url = %target, "Spider starting");
        let spider_id = poller.run(self.client.start_spider(&target)).await?;
        guard.record_spider(&spider_id);
        run.spider_scan_id = Some(spider_id.clone());

        poller
            .until_complete(
                self.settings.spider_interval,
                || self.client.spider_status(&spider_id),
                |progress| {
                    debug!(spider_scan_id = %spider_id, progress = progress.percent(), "Spider progress");
                    run.spider_progress = Some(progress);
                },
            )
            .await?;
        info!(target_url = %target, "Spider complete");

        run.transition(ScanPhase::PassiveGrace);
        poller.wait(self.settings.passive_grace).await?;

        self.active_scan(run, guard, poller).await?;
        self.collect(run, poller).await
    }

    async fn drive_api_spec(
        &self,
        run: &mut ScanRun,
        spec_url: &str,
        guard: &RunGuard,
        poller: &Poller,
    ) -> ScanResult<ScanReport> {
        let target = run.target.url.clone();

        run.transition(ScanPhase::LoadingScripts);
        for script in &self.settings.scripts {
            // Load can fail for a script an earlier run already loaded; enable anyway.
            if let Err(err) = poller.run(self.client.load_script(script)).await {
                self.script_failure(run, &script.name, err)?;
            }
            if let Err(err) = poller.run(self.client.enable_script(&script.name)).await {
                self.script_failure(run, &script.name, err)?;
            }
        }

        run.transition(ScanPhase::ImportingSpec);
        info!(target_url = %target, spec_url = %spec_url, "Importing OpenAPI document");
        let urls = poller.run(self.client.import_openapi(spec_url, &target)).await?;

        if urls.is_empty() {
            match self.settings.empty_import {
                EmptyImportPolicy::Warn => {
                    warn!(spec_url = %spec_url, "OpenAPI import discovered no URLs");
                    run.warnings.push(RunWarning::NoUrlsImported {
                        spec_url: spec_url.to_string(),
                    });
                }
                EmptyImportPolicy::Fail => {
                    return Err(ScanError::EmptyImport {
                        spec_url: spec_url.to_string(),
                    });
                }
            }
        } else {
            info!(discovered = urls.len(), "OpenAPI import complete");
        }
        run.discovered_urls = urls;

        self.active_scan(run, guard, poller).await?;
        self.collect(run, poller).await
    }

    /// Script problems are logged and recorded, never fatal. Cancellation still is.
    fn script_failure(&self, run: &mut ScanRun, name: &str, err: ScanError) -> ScanResult<()> {
        if err.is_cancellation() {
            return Err(err);
        }
        warn!(script = %name, error = %err, "Response-inspection script unavailable");
        let seen = run
            .warnings
            .iter()
            .any(|w| matches!(w, RunWarning::ScriptUnavailable { name: n, .. } if n == name));
        if !seen {
            run.warnings.push(RunWarning::ScriptUnavailable {
                name: name.to_string(),
                reason: err.to_string(),
            });
        }
        Ok(())
    }

    async fn active_scan(&self, run: &mut ScanRun, guard: &RunGuard, poller: &Poller) -> ScanResult<()> {
        let target = run.target.url.clone();

        run.transition(ScanPhase::ActiveScanning);
        info!(target_url = %target, "Active scan starting");
        let active_id = poller
            .run(self.client.start_active_scan(&target, &self.settings.active_scan))
            .await?;
        guard.record_active(&active_id);
        run.active_scan_id = Some(active_id.clone());

        poller
            .until_complete(
                self.settings.active_interval,
                || self.client.active_scan_status(&active_id),
                |progress| {
                    info!(active_scan_id = %active_id, progress = progress.percent(), "Active scan progress");
                    run.active_progress = Some(progress);
                },
            )
            .await?;
        info!(target_url = %target, "Active scan complete");
        Ok(())
    }

    /// Fetch alerts and summary. Transient failures re-fetch; the scan is never re-run.
    async fn collect(&self, run: &mut ScanRun, poller: &Poller) -> ScanResult<ScanReport> {
        let target = run.target.url.clone();
        run.transition(ScanPhase::Collecting);

        let alerts = poller
            .run(retry_with_backoff(&self.settings.collect_retry, "fetch_alerts", || {
                self.client.fetch_alerts(&target)
            }))
            .await
            .map_err(|e| collection_failure(&target, e))?;

        let summary = poller
            .run(retry_with_backoff(&self.settings.collect_retry, "fetch_summary", || {
                self.client.fetch_summary(&target)
            }))
            .await
            .map_err(|e| collection_failure(&target, e))?;

        for (risk, count) in summary.iter() {
            info!(risk = %risk, count = count, "Alerts by risk");
        }

        Ok(ScanReport {
            run_id: run.id,
            target,
            mode: run.mode,
            alerts,
            summary,
            discovered_urls: run.discovered_urls.clone(),
            warnings: run.warnings.clone(),
            started_at: run.started_at,
            finished_at: Utc::now(),
        })
    }
}

fn collection_failure(target: &str, err: ScanError) -> ScanError {
    if err.is_cancellation() {
        return err;
    }
    ScanError::ResultCollectionFailed {
        target: target.to_string(),
        reason: err.to_string(),
    }
}
