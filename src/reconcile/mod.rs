// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Reconciliation
 * Converges supporting scan infrastructure for annotated services
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

pub mod analyzer;
pub mod controller;
pub mod resolver;

pub use analyzer::{AnalyzerDeployment, AnalyzerReconciler, InMemoryWorkloads, WorkloadApi};
pub use controller::{ReconcileOutcome, ReconciliationController, ResourceSource};
pub use resolver::{resolve_target, DesiredScanSpec, Resolution, WatchedResource};

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::ReconcileResult;

/// Categories of infrastructure a reconciler can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Analyzer,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Analyzer => "analyzer",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a reconciler did to reach the desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    Created,
    Updated,
    Unchanged,
}

/// Converges one category of infrastructure toward a desired spec.
///
/// Implementations are stateless between calls and must be idempotent.
#[async_trait]
pub trait ComponentReconciler: Send + Sync {
    fn kind(&self) -> ComponentKind;

    async fn reconcile(&self, spec: &DesiredScanSpec) -> ReconcileResult<ReconcileAction>;
}
