// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod core;
pub mod loader;
pub mod validation;

pub use core::{AnalyzerConfig, EngineConfig, ObservabilityConfig, PublishConfig, ScanConfig};

pub use loader::{
    apply_cli_overrides, apply_env_overrides, load_config_with_overrides, load_layered,
    CliOverrides, ConfigFormat, ConfigLoader,
};

pub use validation::ConfigValidator;
