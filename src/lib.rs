// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - DAST Operator Library
 * Scan orchestration against ZAP-compatible engines and the reconciliation
 * that keeps analyzer workloads next to annotated services
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod publisher;
pub mod reconcile;
pub mod types;

// Production error handling and resilience modules
pub mod errors;
pub mod retry;

pub use engine::{ScanEngineClient, ZapClient};
pub use errors::{PublishError, ReconcileError, ScanError};
pub use orchestrator::{ScanOrchestrator, ScanPlan};
pub use types::{Alert, AlertsSummary, Risk, ScanReport, ScanTarget};
