// src/observability/mod.rs
//! Observability: structured logging and metrics
//!
//! - **Tracing**: `tracing-subscriber` with `EnvFilter` and optional JSON output
//! - **Metrics**: Prometheus recorder for the `metrics` facade
//!
//! Metric names recorded by the engine live here so call sites and dashboards
//! agree on them.

use crate::utils::config::LoggingConfig;
use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Requests answered from a local file or with overridden headers
pub const REQUESTS_INTERCEPTED: &str = "overrides_requests_intercepted_total";

/// Requests handed back to the transport unmodified
pub const REQUESTS_PASSED_THROUGH: &str = "overrides_requests_passed_through_total";

/// Interception pattern recomputations submitted to the transport
pub const PATTERN_UPDATES: &str = "overrides_pattern_updates_total";

/// `.headers` files rejected during recomputation
pub const MALFORMED_HEADER_FILES: &str = "overrides_malformed_header_files_total";

/// Current size of the binding table
pub const ACTIVE_BINDINGS: &str = "overrides_active_bindings";

/// Initialize the global tracing subscriber
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log filter")?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
            .context("Failed to install JSON tracing subscriber")?;
    } else {
        registry
            .with(fmt::layer().with_target(true))
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }

    Ok(())
}

/// Install the Prometheus recorder and return its render handle
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}
