// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::resolver::{resolve_target, Resolution, WatchedResource};
use super::{ComponentKind, ComponentReconciler, ReconcileAction};
use crate::errors::{ReconcileError, ReconcileResult};
use crate::retry::RetryConfig;
use crate::types::ResourceId;

/// Read access to watched resources
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// `Ok(None)` when the resource no longer exists
    async fn get(&self, id: &ResourceId) -> ReconcileResult<Option<WatchedResource>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum ReconcileOutcome {
    /// Deleted; nothing to clean up
    NotFound,
    OptedOut { reason: String },
    Converged {
        actions: Vec<(ComponentKind, ReconcileAction)>,
    },
}

/// Entry point for the watch framework, one call per observed change
pub struct ReconciliationController {
    resources: Arc<dyn ResourceSource>,
    reconcilers: Vec<Arc<dyn ComponentReconciler>>,
    requeue: RetryConfig,
}

impl ReconciliationController {
    pub fn new(resources: Arc<dyn ResourceSource>) -> Self {
        Self {
            resources,
            reconcilers: Vec::new(),
            requeue: RetryConfig::requeue(),
        }
    }

    /// Reconcilers run in registration order
    pub fn with_reconciler(mut self, reconciler: Arc<dyn ComponentReconciler>) -> Self {
        self.reconcilers.push(reconciler);
        self
    }

    pub fn with_requeue(mut self, requeue: RetryConfig) -> Self {
        self.requeue = requeue;
        self
    }

    pub async fn reconcile(&self, id: &ResourceId) -> ReconcileResult<ReconcileOutcome> {
        let Some(resource) = self.resources.get(id).await? else {
            debug!(resource = %id, "Resource gone, nothing to reconcile");
            return Ok(ReconcileOutcome::NotFound);
        };

        let spec = match resolve_target(&resource) {
            Resolution::Desired(spec) => spec,
            Resolution::Absent(reason) => {
                debug!(resource = %id, reason = %reason, "Resource not opted in to scanning");
                return Ok(ReconcileOutcome::OptedOut { reason });
            }
        };

        info!(
            resource = %id,
            target_url = %spec.target_url,
            proxy = %spec.proxy_address,
            "Reconciling scan infrastructure"
        );

        let mut actions = Vec::with_capacity(self.reconcilers.len());
        for reconciler in &self.reconcilers {
            let action = reconciler.reconcile(&spec).await.map_err(|err| {
                warn!(
                    resource = %id,
                    component = %reconciler.kind(),
                    error = %err,
                    "Component reconciliation failed"
                );
                err
            })?;
            actions.push((reconciler.kind(), action));
        }

        Ok(ReconcileOutcome::Converged { actions })
    }

    /// Requeue delay for the `attempt`th consecutive failure
    pub fn error_policy(&self, err: &ReconcileError, attempt: u32) -> Duration {
        let delay = self.requeue.calculate_backoff(attempt.max(1));
        debug!(
            error = %err,
            attempt = attempt,
            requeue_ms = delay.as_millis() as u64,
            "Requeueing reconciliation"
        );
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::analyzer::{AnalyzerReconciler, InMemoryWorkloads};
    use crate::reconcile::resolver::ANNOTATION_PROXY;
    use crate::reconcile::DesiredScanSpec;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Resources(Mutex<HashMap<ResourceId, WatchedResource>>);

    impl Resources {
        fn with(resource: WatchedResource) -> Arc<Self> {
            let store = Self::default();
            store.0.lock().insert(resource.id.clone(), resource);
            Arc::new(store)
        }
    }

    #[async_trait]
    impl ResourceSource for Resources {
        async fn get(&self, id: &ResourceId) -> ReconcileResult<Option<WatchedResource>> {
            Ok(self.0.lock().get(id).cloned())
        }
    }

    /// Counts calls and fails when told to
    struct Probe {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Probe {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl ComponentReconciler for Probe {
        fn kind(&self) -> ComponentKind {
            ComponentKind::Analyzer
        }

        async fn reconcile(&self, spec: &DesiredScanSpec) -> ReconcileResult<ReconcileAction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ReconcileError::Api {
                    operation: "create".to_string(),
                    resource: spec.resource.to_string(),
                    reason: "forbidden".to_string(),
                });
            }
            Ok(ReconcileAction::Unchanged)
        }
    }

    fn annotated() -> WatchedResource {
        WatchedResource::new("shop", "orders").annotate(ANNOTATION_PROXY, "zap")
    }

    #[tokio::test]
    async fn test_missing_resource_is_success() {
        let probe = Probe::new(false);
        let controller = ReconciliationController::new(Arc::new(Resources::default()))
            .with_reconciler(probe.clone());

        let outcome = controller.reconcile(&ResourceId::new("shop", "gone")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NotFound);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_opt_out_invokes_no_reconciler() {
        let probe = Probe::new(false);
        let controller =
            ReconciliationController::new(Resources::with(WatchedResource::new("shop", "orders")))
                .with_reconciler(probe.clone());

        let outcome = controller.reconcile(&ResourceId::new("shop", "orders")).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::OptedOut { .. }));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_error_short_circuits() {
        let first = Probe::new(true);
        let second = Probe::new(false);
        let controller = ReconciliationController::new(Resources::with(annotated()))
            .with_reconciler(first.clone())
            .with_reconciler(second.clone());

        let result = controller.reconcile(&ResourceId::new("shop", "orders")).await;
        assert!(matches!(result, Err(ReconcileError::Api { .. })));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_reconcile_converges_once() {
        let workloads = InMemoryWorkloads::new();
        let controller = ReconciliationController::new(Resources::with(annotated()))
            .with_reconciler(Arc::new(AnalyzerReconciler::new(Arc::new(workloads.clone()))));
        let id = ResourceId::new("shop", "orders");

        let first = controller.reconcile(&id).await.unwrap();
        let second = controller.reconcile(&id).await.unwrap();

        assert_eq!(
            first,
            ReconcileOutcome::Converged {
                actions: vec![(ComponentKind::Analyzer, ReconcileAction::Created)]
            }
        );
        assert_eq!(
            second,
            ReconcileOutcome::Converged {
                actions: vec![(ComponentKind::Analyzer, ReconcileAction::Unchanged)]
            }
        );
        assert_eq!(workloads.writes(), 1);
    }

    #[test]
    fn test_error_policy_grows() {
        let controller = ReconciliationController::new(Arc::new(Resources::default()))
            .with_requeue(RetryConfig::requeue().without_jitter());
        let err = ReconcileError::Conflict {
            resource: "shop/orders".to_string(),
            reason: "resourceVersion".to_string(),
        };

        assert_eq!(controller.error_policy(&err, 0), Duration::from_secs(5));
        assert_eq!(controller.error_policy(&err, 2), Duration::from_secs(10));
        assert_eq!(controller.error_policy(&err, 20), Duration::from_secs(300));
    }
}
