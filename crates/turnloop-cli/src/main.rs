mod cli;
mod config;
mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use turnloop_core::app::LoopStatus;
use turnloop_core::domain::TaskReport;
use turnloop_core::{TaskExecutionFault, TaskId, TurnLoop, params};

use crate::cli::CliArgs;
use crate::config::RunnerConfig;
use crate::demo::ServiceRegistry;

#[derive(Debug, Serialize)]
struct Summary {
    status: LoopStatus,
    services: Vec<String>,
    returns: IndexMap<TaskId, serde_json::Value>,
    elapsed: IndexMap<TaskId, String>,
    total: String,
    errors: IndexMap<TaskId, TaskExecutionFault>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reports: Vec<TaskReport>,
}

impl Summary {
    fn collect(lp: &TurnLoop, services: &ServiceRegistry) -> Self {
        Self {
            status: lp.status(),
            services: services.content(),
            returns: lp.returns(),
            elapsed: lp.elapsed_times(),
            total: lp.total_time(),
            errors: lp.errors(),
            reports: lp.reports(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = RunnerConfig::load(args.config.as_deref())
        .context("failed to load configuration")?
        .overlay(&args);
    info!(?config, "configuration resolved");

    let lp = TurnLoop::with_config(config.turn_loop.clone());
    let services = ServiceRegistry::default();
    let tasks = demo::defer_services(&lp, &services, &config.demo);
    info!(tasks = tasks.len(), "services deferred");

    let outcome = lp.run(params(json!({
        "greeting": "ready",
        "inputs": ["first", "second", "third"],
    })));

    let summary = Summary::collect(&lp, &services);
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("failed to render summary")?
    );

    if let Err(err) = outcome {
        error!(error = %err, "run failed");
        return Err(err).context("turn loop run failed");
    }
    Ok(())
}
