//! Metrics infrastructure for batch stages.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `init`/`flush`: Prometheus recorder setup and the textfile export
//!
//! A stage runs to completion and exits, so there is nothing to scrape.
//! Instead the rendered exposition is written once at exit to the path in
//! `metrics.textfile`, for a node-exporter textfile collector to pick up.
//! Without a textfile the recorder is not installed and events are no-ops.

pub mod events;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::sync::OnceLock;
use tracing::info;

use crate::config::MetricsConfig;
use crate::error::{AlreadyInitializedSnafu, MetricsError, PrometheusInitSnafu, TextfileWriteSnafu};

/// Histogram buckets for duration metrics (in seconds). Load jobs can run for minutes.
const DURATION_BUCKETS: &[f64] = &[
    0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Macro for emitting metric events (Vector-style pattern).
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding Prometheus metric.
///
/// # Example
///
/// ```ignore
/// use enem_core::metrics::events::ShardProcessed;
///
/// emit!(ShardProcessed { status: UnitStatus::Success });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

// Re-export the macro at module level
pub use emit;

/// Install the Prometheus recorder when a textfile export is configured.
pub fn init(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.textfile.is_none() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context(PrometheusInitSnafu)?
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    HANDLE
        .set(handle)
        .map_err(|_| AlreadyInitializedSnafu.build())
}

/// Render the current metrics in Prometheus text format, if a recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

/// Write the rendered metrics to the configured textfile.
///
/// The exposition is written next to the target and renamed into place, so
/// a collector never reads a half-written file.
pub fn flush(config: &MetricsConfig) -> Result<(), MetricsError> {
    let (Some(path), Some(text)) = (config.textfile.as_ref(), render()) else {
        return Ok(());
    };

    let temp = path.with_extension("prom.tmp");
    std::fs::write(&temp, text)
        .and_then(|()| std::fs::rename(&temp, path))
        .context(TextfileWriteSnafu { path })?;

    info!(path = %path.display(), "Wrote metrics textfile");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_textfile() {
        let config = MetricsConfig::default();
        init(&config).unwrap();
        flush(&config).unwrap();
    }
}
