// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ComponentKind, ComponentReconciler, DesiredScanSpec, ReconcileAction};
use crate::errors::{ReconcileError, ReconcileResult};
use crate::types::{Credential, ResourceId};

pub const ANALYZER_NAME_PREFIX: &str = "dast-analyzer-";
pub const API_KEY_ENV: &str = "ZAPAPIKEY";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const COMPONENT_LABEL: &str = "app.kubernetes.io/component";
pub const MANAGER_NAME: &str = "dast-operator";

/// Upper bound on workload names (DNS-1123 label)
pub const MAX_NAME_LEN: usize = 63;
const NAME_HASH_LEN: usize = 8;

/// Analyzer workload name for `resource`, unique per namespace and name.
/// Long names are cut and suffixed with a hash of the full name.
pub fn analyzer_name(resource: &ResourceId) -> String {
    let full = format!("{}{}-{}", ANALYZER_NAME_PREFIX, resource.namespace, resource.name);
    if full.len() <= MAX_NAME_LEN {
        return full;
    }

    let digest = Sha256::digest(full.as_bytes());
    let suffix: String = digest
        .iter()
        .take(NAME_HASH_LEN / 2)
        .map(|b| format!("{:02x}", b))
        .collect();
    let head: String = full.chars().take(MAX_NAME_LEN - NAME_HASH_LEN - 1).collect();
    format!("{}-{}", head.trim_end_matches('-'), suffix)
}

/// Environment variable populated from a secret key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretEnv {
    pub name: String,
    pub secret: String,
    pub key: String,
}

/// Analyzer workload as exchanged with the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerDeployment {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub args: Vec<String>,
    pub env_from_secret: Vec<SecretEnv>,
    pub labels: BTreeMap<String, String>,
    pub owner: ResourceId,
}

impl AnalyzerDeployment {
    /// The workload that should exist for `spec`
    pub fn desired(spec: &DesiredScanSpec) -> ReconcileResult<Self> {
        let (secret, key) = match &spec.api_key {
            Credential::SecretRef { name, key } => (name.clone(), key.clone()),
            Credential::ApiKey { .. } => {
                return Err(ReconcileError::InvalidSpec {
                    resource: spec.resource.to_string(),
                    reason: "analyzer credentials must come from a secret".to_string(),
                })
            }
        };

        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGER_NAME.to_string());
        labels.insert(COMPONENT_LABEL.to_string(), ComponentKind::Analyzer.to_string());

        Ok(Self {
            name: analyzer_name(&spec.resource),
            namespace: spec.proxy_namespace.clone(),
            image: spec.analyzer_image.clone(),
            args: vec![
                "scanner".to_string(),
                "-t".to_string(),
                spec.target_url.clone(),
                "-p".to_string(),
                spec.proxy_address.clone(),
            ],
            env_from_secret: vec![SecretEnv {
                name: API_KEY_ENV.to_string(),
                secret,
                key,
            }],
            labels,
            owner: spec.resource.clone(),
        })
    }
}

/// Cluster workload operations the analyzer reconciler needs
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> ReconcileResult<Option<AnalyzerDeployment>>;

    async fn create(&self, deployment: &AnalyzerDeployment) -> ReconcileResult<()>;

    async fn replace(&self, deployment: &AnalyzerDeployment) -> ReconcileResult<()>;
}

/// Workload store held in memory, for dry runs and tests
#[derive(Clone, Default)]
pub struct InMemoryWorkloads {
    deployments: Arc<Mutex<BTreeMap<(String, String), AnalyzerDeployment>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, namespace: &str, name: &str) -> Option<AnalyzerDeployment> {
        self.deployments
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of create or replace calls accepted so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.deployments.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deployments.lock().is_empty()
    }
}

#[async_trait]
impl WorkloadApi for InMemoryWorkloads {
    async fn get(&self, namespace: &str, name: &str) -> ReconcileResult<Option<AnalyzerDeployment>> {
        Ok(self.snapshot(namespace, name))
    }

    async fn create(&self, deployment: &AnalyzerDeployment) -> ReconcileResult<()> {
        let key = (deployment.namespace.clone(), deployment.name.clone());
        let mut deployments = self.deployments.lock();
        if deployments.contains_key(&key) {
            return Err(ReconcileError::Conflict {
                resource: format!("{}/{}", key.0, key.1),
                reason: "already exists".to_string(),
            });
        }
        deployments.insert(key, deployment.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn replace(&self, deployment: &AnalyzerDeployment) -> ReconcileResult<()> {
        let key = (deployment.namespace.clone(), deployment.name.clone());
        let mut deployments = self.deployments.lock();
        match deployments.get_mut(&key) {
            Some(existing) => {
                *existing = deployment.clone();
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(ReconcileError::Api {
                operation: "replace".to_string(),
                resource: format!("{}/{}", key.0, key.1),
                reason: "not found".to_string(),
            }),
        }
    }
}

/// Keeps one analyzer deployment per annotated service
pub struct AnalyzerReconciler {
    workloads: Arc<dyn WorkloadApi>,
}

impl AnalyzerReconciler {
    pub fn new(workloads: Arc<dyn WorkloadApi>) -> Self {
        Self { workloads }
    }
}

#[async_trait]
impl ComponentReconciler for AnalyzerReconciler {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Analyzer
    }

    async fn reconcile(&self, spec: &DesiredScanSpec) -> ReconcileResult<ReconcileAction> {
        let desired = AnalyzerDeployment::desired(spec)?;

        match self.workloads.get(&desired.namespace, &desired.name).await? {
            None => {
                self.workloads.create(&desired).await?;
                info!(
                    deployment = %desired.name,
                    namespace = %desired.namespace,
                    image = %desired.image,
                    "Created analyzer deployment"
                );
                Ok(ReconcileAction::Created)
            }
            Some(existing) if existing.owner != desired.owner => Err(ReconcileError::Conflict {
                resource: format!("{}/{}", desired.namespace, desired.name),
                reason: format!("owned by {}, not {}", existing.owner, desired.owner),
            }),
            Some(existing) if existing != desired => {
                self.workloads.replace(&desired).await?;
                info!(
                    deployment = %desired.name,
                    namespace = %desired.namespace,
                    "Updated drifted analyzer deployment"
                );
                Ok(ReconcileAction::Updated)
            }
            Some(_) => {
                debug!(deployment = %desired.name, "Analyzer deployment converged");
                Ok(ReconcileAction::Unchanged)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::resolver::{
        resolve_target, Resolution, WatchedResource, ANNOTATION_ANALYZER_IMAGE, ANNOTATION_PROXY,
        ANNOTATION_PROXY_NAMESPACE,
    };

    fn spec(image: &str) -> DesiredScanSpec {
        resolved(
            WatchedResource::new("shop", "orders")
                .annotate(ANNOTATION_PROXY, "zap")
                .annotate(ANNOTATION_ANALYZER_IMAGE, image),
        )
    }

    fn resolved(resource: WatchedResource) -> DesiredScanSpec {
        match resolve_target(&resource) {
            Resolution::Desired(spec) => spec,
            Resolution::Absent(reason) => panic!("unexpected absence: {}", reason),
        }
    }

    #[test]
    fn test_desired_deployment_wiring() {
        let deployment = AnalyzerDeployment::desired(&spec("analyzer:1")).unwrap();

        assert_eq!(deployment.name, "dast-analyzer-shop-orders");
        assert_eq!(
            deployment.args,
            vec![
                "scanner",
                "-t",
                "http://orders.shop.svc.cluster.local:80",
                "-p",
                "http://zap.shop.svc.cluster.local:8080"
            ]
        );
        assert_eq!(deployment.env_from_secret[0].name, "ZAPAPIKEY");
        assert_eq!(deployment.env_from_secret[0].secret, "zap");
    }

    #[test]
    fn test_inline_key_is_invalid_for_deployments() {
        let mut spec = spec("analyzer:1");
        spec.api_key = Credential::api_key("secret");
        assert!(matches!(
            AnalyzerDeployment::desired(&spec),
            Err(ReconcileError::InvalidSpec { .. })
        ));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let workloads = InMemoryWorkloads::new();
        let reconciler = AnalyzerReconciler::new(Arc::new(workloads.clone()));
        let spec = spec("analyzer:1");

        assert_eq!(reconciler.reconcile(&spec).await.unwrap(), ReconcileAction::Created);
        let first = workloads.snapshot("shop", "dast-analyzer-shop-orders").unwrap();

        assert_eq!(reconciler.reconcile(&spec).await.unwrap(), ReconcileAction::Unchanged);
        assert_eq!(workloads.writes(), 1);
        assert_eq!(workloads.len(), 1);
        assert_eq!(workloads.snapshot("shop", "dast-analyzer-shop-orders").unwrap(), first);
    }

    #[tokio::test]
    async fn test_drift_is_replaced() {
        let workloads = InMemoryWorkloads::new();
        let reconciler = AnalyzerReconciler::new(Arc::new(workloads.clone()));

        reconciler.reconcile(&spec("analyzer:1")).await.unwrap();
        let action = reconciler.reconcile(&spec("analyzer:2")).await.unwrap();

        assert_eq!(action, ReconcileAction::Updated);
        assert_eq!(
            workloads.snapshot("shop", "dast-analyzer-shop-orders").unwrap().image,
            "analyzer:2"
        );
        assert_eq!(workloads.writes(), 2);
    }

    fn shared_proxy_spec(namespace: &str, name: &str) -> DesiredScanSpec {
        resolved(
            WatchedResource::new(namespace, name)
                .annotate(ANNOTATION_PROXY, "zap")
                .annotate(ANNOTATION_PROXY_NAMESPACE, "security"),
        )
    }

    #[tokio::test]
    async fn test_same_name_in_two_namespaces_converges() {
        let workloads = InMemoryWorkloads::new();
        let reconciler = AnalyzerReconciler::new(Arc::new(workloads.clone()));
        let shop = shared_proxy_spec("shop", "api");
        let billing = shared_proxy_spec("billing", "api");

        for round in 0..3 {
            let expected = if round == 0 {
                ReconcileAction::Created
            } else {
                ReconcileAction::Unchanged
            };
            assert_eq!(reconciler.reconcile(&shop).await.unwrap(), expected);
            assert_eq!(reconciler.reconcile(&billing).await.unwrap(), expected);
        }

        assert_eq!(workloads.len(), 2);
        assert_eq!(workloads.writes(), 2);
        assert!(workloads.snapshot("security", "dast-analyzer-shop-api").is_some());
        assert!(workloads.snapshot("security", "dast-analyzer-billing-api").is_some());
    }

    #[test]
    fn test_long_names_are_bounded_and_distinct() {
        let namespace = "team-".repeat(10);
        let a = analyzer_name(&ResourceId::new(namespace.as_str(), "orders-service-a"));
        let b = analyzer_name(&ResourceId::new(namespace.as_str(), "orders-service-b"));

        assert!(a.len() <= MAX_NAME_LEN);
        assert!(b.len() <= MAX_NAME_LEN);
        assert_ne!(a, b);
        assert!(a.starts_with(ANALYZER_NAME_PREFIX));
        assert_eq!(a, analyzer_name(&ResourceId::new(namespace.as_str(), "orders-service-a")));
    }

    #[tokio::test]
    async fn test_foreign_owner_is_a_conflict() {
        let workloads = InMemoryWorkloads::new();
        let reconciler = AnalyzerReconciler::new(Arc::new(workloads.clone()));
        let spec = spec("analyzer:1");

        let mut squatter = AnalyzerDeployment::desired(&spec).unwrap();
        squatter.owner = ResourceId::new("other", "orders");
        workloads.create(&squatter).await.unwrap();

        assert!(matches!(
            reconciler.reconcile(&spec).await,
            Err(ReconcileError::Conflict { .. })
        ));
        assert_eq!(workloads.writes(), 1);
    }
}
