//! # FeatureHub Server
//!
//! The `fhub` binary: loads the configuration named by `--conf`, composes the
//! HTTP feature stack and runs it until Ctrl+C or SIGTERM.
//!
//! ## Example
//! ```no_run
//! use fhub_server::{Args, Server};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let args = Args { conf: "config/server.yaml".into() };
//! Server::from_args(&args)?.run().await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use fhub::Application;
use fhub::domain::config::AppConfig;
use fhub::kernel::config::load_app_config;
use fhub::kernel::prelude::{RunReport, Runner};
use std::path::PathBuf;
use tracing::info;

/// Command line of the `fhub` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "fhub", version, about = "Feature-based application server")]
pub struct Args {
    /// Configuration file (YAML, TOML or JSON). `FHUB__FEATURES__<SECTION>__<KEY>`
    /// environment variables override its values.
    #[arg(short, long = "conf", value_name = "PATH", default_value = "config/server.yaml")]
    pub conf: PathBuf,
}

/// A composed application ready to run.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    runner: Runner,
}

impl Server {
    /// Loads the configuration file and builds the feature registry.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be loaded or any feature
    /// rejects its section or fails to initialize.
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = load_app_config(&args.conf)
            .with_context(|| format!("Critical: configuration {} is malformed", args.conf.display()))?;
        Self::from_config(config)
    }

    /// Builds the feature registry from an already loaded configuration.
    ///
    /// # Errors
    /// Returns an error if any feature rejects its section or fails to initialize.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let runner = Application::builder()
            .features(fhub::features::http_stack())
            .config(config)
            .build()
            .context("Platform bootstrap failed")?;
        Ok(Self { runner })
    }

    #[must_use]
    pub const fn runner(&self) -> &Runner {
        &self.runner
    }

    /// Runs until a shutdown signal arrives or the server stops on its own.
    ///
    /// # Errors
    /// Returns an error if startup fails, the server loop fails, or any
    /// feature fails to shut down cleanly.
    pub async fn run(self) -> Result<RunReport> {
        let report = self.runner.run().await?;
        info!(reason = %report.reason, server_abandoned = report.server_abandoned, "Server stopped");
        Ok(report)
    }
}
