// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::engine::{response_inspection_scripts, ScriptSpec, DEFAULT_SCRIPT_DIR, RESPONSE_INSPECTION_SCRIPTS};
use crate::orchestrator::{EmptyImportPolicy, OrchestratorSettings};
use crate::retry::RetryConfig;
use crate::types::Credential;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Engine (proxy) base address
    #[validate(url)]
    #[serde(default = "default_engine_address")]
    pub address: String,

    /// Never written back out
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[validate(length(min = 1))]
    #[serde(default = "default_script_dir")]
    pub script_dir: String,

    #[serde(default = "default_scripts")]
    pub scripts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScanConfig {
    #[validate(url)]
    #[serde(default = "default_target")]
    pub target: String,

    /// OpenAPI document location for API scans
    #[validate(url)]
    #[serde(default = "default_openapi")]
    pub openapi: String,

    #[validate(range(min = 100, max = 600000))]
    #[serde(default = "default_spider_interval")]
    pub spider_interval_ms: u64,

    #[validate(range(max = 600000))]
    #[serde(default = "default_passive_grace")]
    pub passive_grace_ms: u64,

    #[validate(range(min = 100, max = 600000))]
    #[serde(default = "default_active_interval")]
    pub active_interval_ms: u64,

    #[validate(range(min = 1))]
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    #[serde(default)]
    pub fail_on_empty_import: bool,

    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_collect_attempts")]
    pub collect_max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublishConfig {
    #[serde(default)]
    pub serve: bool,

    #[validate(length(min = 1))]
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: default_engine_address(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            script_dir: default_script_dir(),
            scripts: default_scripts(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            openapi: default_openapi(),
            spider_interval_ms: default_spider_interval(),
            passive_grace_ms: default_passive_grace(),
            active_interval_ms: default_active_interval(),
            deadline_secs: None,
            fail_on_empty_import: false,
            collect_max_attempts: default_collect_attempts(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            serve: false,
            bind: default_bind(),
            output: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    pub fn credential(&self) -> Credential {
        Credential::api_key(self.api_key.clone().unwrap_or_default())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn script_specs(&self) -> Vec<ScriptSpec> {
        if self.scripts.is_empty() {
            return response_inspection_scripts(&self.script_dir);
        }
        self.scripts
            .iter()
            .map(|name| ScriptSpec::http_sender(name, &self.script_dir))
            .collect()
    }
}

impl AnalyzerConfig {
    /// Orchestrator timing and policy derived from this configuration
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            spider_interval: Duration::from_millis(self.scan.spider_interval_ms),
            passive_grace: Duration::from_millis(self.scan.passive_grace_ms),
            active_interval: Duration::from_millis(self.scan.active_interval_ms),
            deadline: self.scan.deadline_secs.map(Duration::from_secs),
            scripts: self.engine.script_specs(),
            empty_import: if self.scan.fail_on_empty_import {
                EmptyImportPolicy::Fail
            } else {
                EmptyImportPolicy::Warn
            },
            collect_retry: RetryConfig::default().with_max_attempts(self.scan.collect_max_attempts),
            ..OrchestratorSettings::default()
        }
    }
}

fn default_engine_address() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_script_dir() -> String {
    DEFAULT_SCRIPT_DIR.to_string()
}

fn default_scripts() -> Vec<String> {
    RESPONSE_INSPECTION_SCRIPTS.iter().map(|s| s.to_string()).collect()
}

fn default_target() -> String {
    "http://127.0.0.1:8090/target".to_string()
}

fn default_openapi() -> String {
    "http://127.0.0.1:8090/swagger.yaml".to_string()
}

fn default_spider_interval() -> u64 {
    1000
}

fn default_passive_grace() -> u64 {
    2000
}

fn default_active_interval() -> u64 {
    5000
}

fn default_collect_attempts() -> u32 {
    3
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_orchestrator_defaults() {
        let settings = AnalyzerConfig::default().orchestrator_settings();
        let expected = OrchestratorSettings::default();

        assert_eq!(settings.spider_interval, expected.spider_interval);
        assert_eq!(settings.passive_grace, expected.passive_grace);
        assert_eq!(settings.active_interval, expected.active_interval);
        assert_eq!(settings.scripts, expected.scripts);
        assert_eq!(settings.empty_import, EmptyImportPolicy::Warn);
        assert!(settings.deadline.is_none());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = AnalyzerConfig::default();
        config.engine.api_key = Some("s3cret".to_string());

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("s3cret"));
    }
}
