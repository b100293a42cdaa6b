// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::core::AnalyzerConfig;
use super::validation::ConfigValidator;

pub const ENV_ZAP_PROXY: &str = "ZAP_PROXY";
pub const ENV_API_KEY: &str = "ZAPAPIKEY";
pub const ENV_TARGET: &str = "DAST_TARGET";
pub const ENV_DEADLINE: &str = "DAST_DEADLINE_SECS";

pub struct ConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub zap_proxy: Option<String>,
    pub api_key: Option<String>,
    pub target: Option<String>,
    pub openapi: Option<String>,
    pub deadline_secs: Option<u64>,
    pub serve: bool,
    pub bind: Option<String>,
    pub output: Option<PathBuf>,
    pub fail_on_empty_import: bool,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref().to_path_buf();
        let format = Self::detect_format(&path)?;

        Ok(Self {
            config_path: path,
            format,
        })
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file format"))?;

        match extension {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported config file format: {}", extension)),
        }
    }

    /// Parse the file only; no overrides, no validation
    pub fn read_file(&self) -> Result<AnalyzerConfig> {
        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;

        let config: AnalyzerConfig = match self.format {
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .context("Failed to parse YAML config")?,
            ConfigFormat::Toml => toml::from_str(&content)
                .context("Failed to parse TOML config")?,
            ConfigFormat::Json => serde_json::from_str(&content)
                .context("Failed to parse JSON config")?,
        };

        Ok(config)
    }

    pub fn load_config(&self) -> Result<AnalyzerConfig> {
        let mut config = self.read_file()?;

        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

        ConfigValidator::validate_analyzer_config(&config)?;

        Ok(config)
    }
}

/// Layer `lookup` (normally the process environment) over `config`
pub fn apply_env_overrides<F>(config: &mut AnalyzerConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(address) = lookup(ENV_ZAP_PROXY) {
        config.engine.address = address;
    }

    if let Some(api_key) = lookup(ENV_API_KEY) {
        config.engine.api_key = Some(api_key);
    }

    if let Some(target) = lookup(ENV_TARGET) {
        config.scan.target = target;
    }

    if let Some(deadline) = lookup(ENV_DEADLINE) {
        config.scan.deadline_secs = Some(deadline.parse()
            .with_context(|| format!("Invalid {}", ENV_DEADLINE))?);
    }

    Ok(())
}

pub fn apply_cli_overrides(config: &mut AnalyzerConfig, cli: &CliOverrides) {
    if let Some(address) = &cli.zap_proxy {
        config.engine.address = address.clone();
    }
    if let Some(api_key) = &cli.api_key {
        config.engine.api_key = Some(api_key.clone());
    }
    if let Some(target) = &cli.target {
        config.scan.target = target.clone();
    }
    if let Some(openapi) = &cli.openapi {
        config.scan.openapi = openapi.clone();
    }
    if let Some(deadline) = cli.deadline_secs {
        config.scan.deadline_secs = Some(deadline);
    }
    if cli.serve {
        config.publish.serve = true;
    }
    if let Some(bind) = &cli.bind {
        config.publish.bind = bind.clone();
    }
    if let Some(output) = &cli.output {
        config.publish.output = Some(output.clone());
    }
    if cli.fail_on_empty_import {
        config.scan.fail_on_empty_import = true;
    }
}

/// Defaults, then the optional file, then the environment, then the command line
pub fn load_config_with_overrides(
    config_path: Option<&Path>,
    cli: &CliOverrides,
) -> Result<AnalyzerConfig> {
    load_layered(config_path, |key| std::env::var(key).ok(), cli)
}

pub fn load_layered<F>(
    config_path: Option<&Path>,
    lookup: F,
    cli: &CliOverrides,
) -> Result<AnalyzerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match config_path {
        Some(path) => {
            debug!(path = ?path, "Loading configuration file");
            ConfigLoader::new(path)?.read_file()?
        }
        None => AnalyzerConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    apply_cli_overrides(&mut config, cli);

    ConfigValidator::validate_analyzer_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(ConfigLoader::detect_format(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigLoader::detect_format(Path::new("a.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigLoader::detect_format(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigLoader::detect_format(Path::new("a.ini")).is_err());
        assert!(ConfigLoader::detect_format(Path::new("config")).is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let file = write_config(
            ".toml",
            r#"
[engine]
address = "http://zap.security:8080"

[scan]
passive_grace_ms = 500
"#,
        );

        let config = load_layered(Some(file.path()), no_env, &CliOverrides::default()).unwrap();
        assert_eq!(config.engine.address, "http://zap.security:8080");
        assert_eq!(config.scan.passive_grace_ms, 500);
        assert_eq!(config.scan.spider_interval_ms, 1000);
        assert_eq!(config.engine.scripts.len(), 2);
    }

    #[test]
    fn test_yaml_and_json() {
        let yaml = write_config(".yaml", "scan:\n  fail_on_empty_import: true\n");
        let config = load_layered(Some(yaml.path()), no_env, &CliOverrides::default()).unwrap();
        assert!(config.scan.fail_on_empty_import);

        let json = write_config(".json", r#"{"publish": {"serve": true, "bind": "127.0.0.1:9000"}}"#);
        let config = load_layered(Some(json.path()), no_env, &CliOverrides::default()).unwrap();
        assert!(config.publish.serve);
        assert_eq!(config.publish.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_precedence_defaults_file_env_cli() {
        let file = write_config(
            ".toml",
            r#"
[engine]
address = "http://from-file:8080"

[scan]
target = "http://file-target/"
deadline_secs = 60
"#,
        );
        let env: HashMap<&str, &str> = [
            (ENV_ZAP_PROXY, "http://from-env:8080"),
            (ENV_TARGET, "http://env-target/"),
            (ENV_API_KEY, "env-key"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());
        let cli = CliOverrides {
            target: Some("http://cli-target/".to_string()),
            ..CliOverrides::default()
        };

        let config = load_layered(Some(file.path()), lookup, &cli).unwrap();

        assert_eq!(config.engine.address, "http://from-env:8080");
        assert_eq!(config.engine.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.scan.target, "http://cli-target/");
        assert_eq!(config.scan.deadline_secs, Some(60));
        assert_eq!(config.scan.openapi, "http://127.0.0.1:8090/swagger.yaml");
    }

    #[test]
    fn test_invalid_env_deadline() {
        let lookup = |key: &str| (key == ENV_DEADLINE).then(|| "soon".to_string());
        assert!(load_layered(None, lookup, &CliOverrides::default()).is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let file = write_config(".toml", "[scan]\nactive_interval_ms = 1\n");
        assert!(load_layered(Some(file.path()), no_env, &CliOverrides::default()).is_err());
        assert!(ConfigLoader::new(file.path()).unwrap().load_config().is_err());
    }
}
