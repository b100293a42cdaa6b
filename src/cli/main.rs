// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Dynamic Analyzer
 * Standalone CLI driving a ZAP-compatible engine through a full scan
 *
 * Commands:
 * - scanner: spider, passive grace, active scan, collect
 * - apiscan: response-inspection scripts, OpenAPI import, active scan, collect
 *
 * (c) 2026 Bountyy Oy
 */

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dast_operator::config::{load_config_with_overrides, AnalyzerConfig, CliOverrides};
use dast_operator::orchestrator::{cancellation, CancelHandle, CancelSignal};
use dast_operator::publisher::{FilePublisher, HttpPublisher, ResultPublisher};
use dast_operator::types::{ReportStatus, ScanReport, ScanTarget};
use dast_operator::{ScanOrchestrator, ScanPlan, ZapClient};

/// Dynamic application security testing against a ZAP-compatible proxy
#[derive(Parser)]
#[command(name = "dynamic-analyzer")]
#[command(author = "Bountyy Oy")]
#[command(version)]
#[command(about = "Drive a ZAP-compatible engine through a DAST scan", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file path (toml, yaml or json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the target, then actively scan what was found
    Scanner {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Import an OpenAPI document, then actively scan the declared endpoints
    Apiscan {
        #[command(flatten)]
        common: CommonArgs,

        /// OpenAPI document URL [default: http://127.0.0.1:8090/swagger.yaml]
        #[arg(short = 'o', long)]
        openapi: Option<String>,

        /// Fail the scan when the import discovers no URLs
        #[arg(long)]
        fail_on_empty_import: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// ZAP proxy address [default: http://127.0.0.1:8080]
    #[arg(short = 'p', long)]
    zap_proxy: Option<String>,

    /// Target URL [default: http://127.0.0.1:8090/target]
    #[arg(short = 't', long)]
    target: Option<String>,

    /// ZAP API key
    #[arg(short = 'a', long, env = "ZAPAPIKEY", hide_env_values = true)]
    apikey: Option<String>,

    /// Serve results over HTTP after the scan
    #[arg(short = 's', long)]
    serve: bool,

    /// Listen address for --serve [default: 0.0.0.0:8080]
    #[arg(long)]
    bind: Option<String>,

    /// Write the alerts document to a file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Abort the scan after this many seconds
    #[arg(long)]
    deadline: Option<u64>,
}

impl CommonArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            zap_proxy: self.zap_proxy.clone(),
            api_key: self.apikey.clone(),
            target: self.target.clone(),
            openapi: None,
            deadline_secs: self.deadline,
            serve: self.serve,
            bind: self.bind.clone(),
            output: self.output.clone(),
            fail_on_empty_import: false,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (overrides, api_mode) = match &cli.command {
        Commands::Scanner { common } => (common.overrides(), false),
        Commands::Apiscan {
            common,
            openapi,
            fail_on_empty_import,
        } => {
            let mut overrides = common.overrides();
            overrides.openapi = openapi.clone();
            overrides.fail_on_empty_import = *fail_on_empty_import;
            (overrides, true)
        }
    };

    let config = load_config_with_overrides(cli.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    let default_level = if cli.debug {
        "debug"
    } else {
        config.observability.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("dynamic-analyzer")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config, api_mode))
}

async fn async_main(config: AnalyzerConfig, api_mode: bool) -> Result<()> {
    let credential = config.engine.credential();
    let client = ZapClient::new(&config.engine.address, &credential, config.engine.request_timeout())
        .context("Failed to create engine client")?;
    let orchestrator = Arc::new(ScanOrchestrator::new(
        Arc::new(client),
        config.orchestrator_settings(),
    ));

    let (handle, signal) = cancellation();
    tokio::spawn(cancel_on_interrupt(handle));

    let plan = if api_mode {
        ScanPlan::ApiSpec {
            spec_url: config.scan.openapi.clone(),
        }
    } else {
        ScanPlan::Crawl
    };
    let target = ScanTarget::new(&config.scan.target, &config.engine.address, credential);

    info!(
        target_url = %config.scan.target,
        proxy = %config.engine.address,
        mode = %plan.mode(),
        "Starting scan"
    );

    let run = orchestrator
        .spawn(target, plan, signal.clone())
        .await
        .context("Scan task panicked")?;
    let report = run.into_result().context("Scan failed")?;

    log_report(&report);
    publish(&config, &report, signal).await
}

async fn cancel_on_interrupt(handle: CancelHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupt received, cancelling");
        handle.cancel();
    }
}

fn log_report(report: &ScanReport) {
    for (risk, count) in report.summary.iter() {
        info!(risk = %risk, count = count, "Alerts");
    }
    info!(
        alerts = report.alerts.len(),
        discovered_urls = report.discovered_urls.len(),
        "Scan finished"
    );
    if report.status() == ReportStatus::Warnings {
        for warning in &report.warnings {
            warn!(warning = ?warning, "Scan finished with warnings");
        }
    }
}

async fn publish(config: &AnalyzerConfig, report: &ScanReport, shutdown: CancelSignal) -> Result<()> {
    if let Some(path) = &config.publish.output {
        FilePublisher::new(path).publish(report).await?;
    }

    if config.publish.serve {
        let bind: SocketAddr = config
            .publish
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", config.publish.bind))?;
        HttpPublisher::new(bind, shutdown).publish(report).await?;
    } else if config.publish.output.is_none() {
        let document = report.alerts_document()?;
        println!("{}", String::from_utf8_lossy(&document));
    }

    Ok(())
}
