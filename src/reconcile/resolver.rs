// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Derives the desired scan configuration from a watched service's annotations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Credential, ResourceId, ScanTarget};

pub const ANNOTATION_PREFIX: &str = "dast.security.banzaicloud.io/";

/// Proxy (engine) deployment name. Required; without it the service opts out.
pub const ANNOTATION_PROXY: &str = "dast.security.banzaicloud.io/zaproxy";
pub const ANNOTATION_PROXY_NAMESPACE: &str = "dast.security.banzaicloud.io/zaproxy-namespace";
pub const ANNOTATION_ANALYZER_IMAGE: &str = "dast.security.banzaicloud.io/analyzer_image";

pub const DEFAULT_ANALYZER_IMAGE: &str = "banzaicloud/dast-analyzer:latest";
pub const DEFAULT_SERVICE_PORT: u16 = 80;
pub const PROXY_PORT: u16 = 8080;

/// Secret key holding the engine API key, in a secret named after the proxy
pub const API_KEY_SECRET_KEY: &str = "zap_api_key";

/// Snapshot of a watched service as the watch framework delivered it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedResource {
    pub id: ResourceId,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Declared service ports, in declaration order
    #[serde(default)]
    pub ports: Vec<u16>,
}

impl WatchedResource {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            id: ResourceId::new(namespace, name),
            ..Self::default()
        }
    }

    pub fn annotate(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_ports(mut self, ports: &[u16]) -> Self {
        self.ports = ports.to_vec();
        self
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Declarative scan configuration for one resource, rebuilt on every pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredScanSpec {
    pub resource: ResourceId,
    pub proxy_name: String,
    pub proxy_namespace: String,
    pub proxy_address: String,
    pub analyzer_image: String,
    pub target_url: String,
    pub api_key: Credential,
}

impl DesiredScanSpec {
    /// Run target for an orchestrator driving this resource's scan in-process
    pub fn scan_target(&self) -> ScanTarget {
        let mut target = ScanTarget::new(&self.target_url, &self.proxy_address, self.api_key.clone())
            .with_owner(self.resource.clone());
        target.analyzer_image = Some(self.analyzer_image.clone());
        target
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Desired(DesiredScanSpec),
    /// The resource opts out of scanning
    Absent(String),
}

/// Pure mapping from resource metadata to a desired spec
pub fn resolve_target(resource: &WatchedResource) -> Resolution {
    let Some(proxy_name) = resource.annotation(ANNOTATION_PROXY) else {
        return Resolution::Absent(format!("missing annotation {}", ANNOTATION_PROXY));
    };

    let proxy_namespace = resource
        .annotation(ANNOTATION_PROXY_NAMESPACE)
        .unwrap_or(&resource.id.namespace);
    let analyzer_image = resource
        .annotation(ANNOTATION_ANALYZER_IMAGE)
        .unwrap_or(DEFAULT_ANALYZER_IMAGE);
    let port = resource.ports.first().copied().unwrap_or(DEFAULT_SERVICE_PORT);

    Resolution::Desired(DesiredScanSpec {
        resource: resource.id.clone(),
        proxy_name: proxy_name.to_string(),
        proxy_namespace: proxy_namespace.to_string(),
        proxy_address: format!(
            "http://{}.{}.svc.cluster.local:{}",
            proxy_name, proxy_namespace, PROXY_PORT
        ),
        analyzer_image: analyzer_image.to_string(),
        target_url: format!(
            "http://{}.{}.svc.cluster.local:{}",
            resource.id.name, resource.id.namespace, port
        ),
        api_key: Credential::SecretRef {
            name: proxy_name.to_string(),
            key: API_KEY_SECRET_KEY.to_string(),
        },
    })
}
