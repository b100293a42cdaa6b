// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use validator::Validate;

use super::core::AnalyzerConfig;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_analyzer_config(config: &AnalyzerConfig) -> Result<()> {
        config.engine.validate()
            .context("Engine configuration validation failed")?;
        config.scan.validate()
            .context("Scan configuration validation failed")?;
        config.publish.validate()
            .context("Publish configuration validation failed")?;

        Self::validate_engine_config(config)?;
        Self::validate_publish_config(config)?;

        Ok(())
    }

    fn validate_engine_config(config: &AnalyzerConfig) -> Result<()> {
        let address = &config.engine.address;
        if !address.starts_with("http://") && !address.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "Engine address must start with http:// or https://"
            ));
        }

        if config.engine.scripts.iter().any(|s| s.trim().is_empty()) {
            return Err(anyhow::anyhow!("Script names cannot be empty"));
        }

        Ok(())
    }

    fn validate_publish_config(config: &AnalyzerConfig) -> Result<()> {
        if config.publish.serve {
            config.publish.bind.parse::<SocketAddr>()
                .with_context(|| format!("Invalid bind address: {}", config.publish.bind))?;
        }

        Ok(())
    }
}
