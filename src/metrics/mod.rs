//! Metrics for the merge pipeline.
//!
//! Each pipeline phase defines its metrics in a dedicated submodule. Without
//! an installed recorder every call is a no-op, which is what unit tests get.

pub mod matching;

pub use matching::MatchingMetrics;

use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::error::Result;

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the in-process Prometheus recorder.
///
/// Idempotent. No HTTP listener is started; the run renders a snapshot to a
/// file instead, since the process exits right after the merge.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("Metrics handle already stored");
            }
            MatchingMetrics::register_metrics();
            info!("Prometheus recorder installed");
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    }
}

/// Write the current metrics snapshot in Prometheus text format.
///
/// Returns `false` when no recorder was installed.
pub fn write_snapshot(path: &Path) -> Result<bool> {
    let Some(handle) = HANDLE.get() else {
        return Ok(false);
    };
    fs::write(path, handle.render())?;
    Ok(true)
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase so they appear before first use
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Metric names follow `kbbe_{phase}_{metric_name}` with `_total` on counters
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("kbbe_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("kbbe_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("kbbe_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
