use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use turnloop_core::{LimitAction, LoopConfig};

use crate::cli::CliArgs;

/// Runner configuration loaded from TOML.
///
/// ```toml
/// [loop]
/// debug = true
/// default_limit = 20
///
/// [demo]
/// tasks = 5
/// wait_seconds = 0.1
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    #[serde(rename = "loop")]
    pub turn_loop: LoopConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of chained services
    pub tasks: usize,
    /// Seconds the last service waits before registering
    pub wait_seconds: f64,
    /// Defer an extra task that panics
    pub faulty: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tasks: 3,
            wait_seconds: 0.0,
            faulty: false,
        }
    }
}

impl RunnerConfig {
    /// Load config from the given path; defaults when no path is given.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            debug!("no config file given, using defaults");
            return Ok(Self::default());
        };
        let config_path = PathBuf::from(path);
        debug!(?config_path, "loading config");
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse config: {}", config_path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Flags win over the file.
    pub fn overlay(mut self, args: &CliArgs) -> Self {
        let settings = &mut self.turn_loop;
        settings.debug |= args.debug;
        settings.handle_errors |= args.handle_errors;
        if let Some(limit) = args.limit {
            settings.default_limit = limit;
        }
        if args.abort_on_limit {
            settings.default_limit_action = LimitAction::Abort;
        }
        if let Some(tasks) = args.tasks {
            self.demo.tasks = tasks;
        }
        if let Some(wait) = args.wait {
            self.demo.wait_seconds = wait;
        }
        self.demo.faulty |= args.faulty;
        self
    }
}
