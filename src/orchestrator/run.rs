// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{CancelReason, ScanError, ScanResult};
use crate::types::{
    ActiveScanId, Progress, RunWarning, ScanMode, ScanReport, ScanTarget, SpiderScanId,
};

/// Phases of a run.
///
/// Crawl: `Idle → Spidering → PassiveGrace → ActiveScanning → Collecting → Done`.
/// API spec: `Idle → LoadingScripts → ImportingSpec → ActiveScanning → Collecting → Done`.
/// `Failed` and `Cancelled` are reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanPhase {
    Idle,
    LoadingScripts,
    ImportingSpec,
    Spidering,
    PassiveGrace,
    ActiveScanning,
    Collecting,
    Done,
    Failed,
    Cancelled,
}

impl ScanPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanPhase::Done | ScanPhase::Failed | ScanPhase::Cancelled)
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::LoadingScripts => "loading-scripts",
            ScanPhase::ImportingSpec => "importing-spec",
            ScanPhase::Spidering => "spidering",
            ScanPhase::PassiveGrace => "passive-grace",
            ScanPhase::ActiveScanning => "active-scanning",
            ScanPhase::Collecting => "collecting",
            ScanPhase::Done => "done",
            ScanPhase::Failed => "failed",
            ScanPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    pub from: ScanPhase,
    pub to: ScanPhase,
    pub at: DateTime<Utc>,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Done(ScanReport),
    Failed(ScanError),
    Cancelled(CancelReason),
}

/// One scan of one target, mutated only by the orchestrator driving it
#[derive(Debug)]
pub struct ScanRun {
    pub id: Uuid,
    pub target: ScanTarget,
    pub mode: ScanMode,
    pub phase: ScanPhase,
    pub spider_scan_id: Option<SpiderScanId>,
    pub active_scan_id: Option<ActiveScanId>,
    pub spider_progress: Option<Progress>,
    pub active_progress: Option<Progress>,
    pub started_at: DateTime<Utc>,
    pub history: Vec<PhaseTransition>,
    pub warnings: Vec<RunWarning>,
    pub discovered_urls: Vec<String>,
    pub outcome: Option<RunOutcome>,
}

impl ScanRun {
    pub fn new(target: ScanTarget, mode: ScanMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            mode,
            phase: ScanPhase::Idle,
            spider_scan_id: None,
            active_scan_id: None,
            spider_progress: None,
            active_progress: None,
            started_at: Utc::now(),
            history: Vec::new(),
            warnings: Vec::new(),
            discovered_urls: Vec::new(),
            outcome: None,
        }
    }

    /// Move to `to`. Terminal phases are final; later transitions are ignored.
    pub(crate) fn transition(&mut self, to: ScanPhase) {
        if self.phase.is_terminal() {
            return;
        }
        self.history.push(PhaseTransition {
            from: self.phase,
            to,
            at: Utc::now(),
        });
        self.phase = to;
    }

    pub(crate) fn finish(&mut self, report: ScanReport) {
        self.transition(ScanPhase::Done);
        self.outcome = Some(RunOutcome::Done(report));
    }

    pub(crate) fn fail(&mut self, error: ScanError) {
        self.transition(ScanPhase::Failed);
        self.outcome = Some(RunOutcome::Failed(error));
    }

    pub(crate) fn cancel(&mut self, reason: CancelReason) {
        self.transition(ScanPhase::Cancelled);
        self.outcome = Some(RunOutcome::Cancelled(reason));
    }

    /// Number of times the run moved from `from` to `to`
    pub fn transitions(&self, from: ScanPhase, to: ScanPhase) -> usize {
        self.history
            .iter()
            .filter(|t| t.from == from && t.to == to)
            .count()
    }

    pub fn entered(&self, phase: ScanPhase) -> bool {
        self.history.iter().any(|t| t.to == phase)
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match &self.outcome {
            Some(RunOutcome::Done(report)) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        match &self.outcome {
            Some(RunOutcome::Failed(err)) => Some(err),
            _ => None,
        }
    }

    /// Collapse the run into its report, treating cancellation as an error
    pub fn into_result(self) -> ScanResult<ScanReport> {
        match self.outcome {
            Some(RunOutcome::Done(report)) => Ok(report),
            Some(RunOutcome::Failed(err)) => Err(err),
            Some(RunOutcome::Cancelled(reason)) => Err(ScanError::Cancelled { reason }),
            None => Err(ScanError::Cancelled {
                reason: CancelReason::Signal,
            }),
        }
    }
}
