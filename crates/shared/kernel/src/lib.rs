//! # Kernel
//!
//! Feature registry and lifecycle orchestrator.
//!
//! Features are independent [`Feature`](feature::Feature) implementations
//! composed into one process. The [`Registry`](registry::Registry) binds each
//! feature's configuration section and runs `init` in registration order; the
//! [`Runner`](runner::Runner) then awaits `on_startup` for each feature,
//! serves, and awaits `on_shutdown` in reverse order.
//!
//! ```rust,no_run
//! use fhub_kernel::prelude::*;
//!
//! struct Clock;
//!
//! #[async_trait]
//! impl Feature for Clock {
//!     fn name(&self) -> &str {
//!         "clock"
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::builder().feature(Clock).config(ConfigDocument::new()).build()?;
//! let report = registry.into_runner(RunnerConfig::default()).run().await?;
//! println!("stopped: {}", report.reason);
//! # Ok(())
//! # }
//! ```
pub mod binding;
pub mod config;
pub mod context;
pub mod error;
pub mod feature;
pub mod lifecycle;
pub mod prelude;
pub mod registry;
pub mod runner;
pub mod signal;

pub use async_trait::async_trait;
pub use fhub_domain as domain;
