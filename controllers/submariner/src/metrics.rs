//! Operator metrics.
//!
//! Reconcilers report through the [`MetricsRecorder`] trait; the production
//! implementation keeps its collectors on a registry owned by the operator
//! and served by [`crate::web`].

use crate::error::ControllerError;
use crate::uninstall::Outcome;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Sink for the operator's metrics
pub trait MetricsRecorder: Send + Sync {
    /// One reconcile of a `kind` CR finished
    fn reconcile_result(&self, kind: &str, ok: bool);

    /// One uninstall orchestrator run for a `kind` CR finished
    fn uninstall_outcome(&self, kind: &str, outcome: Outcome);

    /// Number of gateway nodes currently scheduled
    fn gateways(&self, count: i64);
}

/// [`MetricsRecorder`] backed by Prometheus collectors
#[derive(Debug, Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    reconciles: IntCounterVec,
    uninstall_runs: IntCounterVec,
    gateways: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconciles = IntCounterVec::new(
            Opts::new(
                "submariner_operator_reconciles_total",
                "Reconciliations by resource kind and result",
            ),
            &["kind", "result"],
        )?;
        let uninstall_runs = IntCounterVec::new(
            Opts::new(
                "submariner_operator_uninstall_runs_total",
                "Uninstall orchestrator runs by resource kind and outcome",
            ),
            &["kind", "outcome"],
        )?;
        let gateways = IntGauge::new("submariner_gateways", "Gateway nodes scheduled")?;

        registry.register(Box::new(reconciles.clone()))?;
        registry.register(Box::new(uninstall_runs.clone()))?;
        registry.register(Box::new(gateways.clone()))?;

        Ok(Self {
            registry,
            reconciles,
            uninstall_runs,
            gateways,
        })
    }

    /// Registered metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        exposition(buffer)
    }
}

fn exposition(buffer: Vec<u8>) -> Result<String, ControllerError> {
    String::from_utf8(buffer).map_err(|e| {
        ControllerError::Metrics(prometheus::Error::Msg(format!("metrics are not UTF-8: {}", e)))
    })
}

impl MetricsRecorder for PrometheusMetrics {
    fn reconcile_result(&self, kind: &str, ok: bool) {
        let result = if ok { "success" } else { "error" };
        self.reconciles.with_label_values(&[kind, result]).inc();
    }

    fn uninstall_outcome(&self, kind: &str, outcome: Outcome) {
        self.uninstall_runs
            .with_label_values(&[kind, outcome.as_str()])
            .inc();
    }

    fn gateways(&self, count: i64) {
        self.gateways.set(count);
    }
}

/// In-memory recorder for unit tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    pub reconciles: std::sync::Mutex<Vec<(String, bool)>>,
    pub outcomes: std::sync::Mutex<Vec<(String, Outcome)>>,
    pub gateways: std::sync::Mutex<Option<i64>>,
}

#[cfg(test)]
impl MetricsRecorder for RecordingMetrics {
    fn reconcile_result(&self, kind: &str, ok: bool) {
        self.reconciles.lock().unwrap().push((kind.to_string(), ok));
    }

    fn uninstall_outcome(&self, kind: &str, outcome: Outcome) {
        self.outcomes.lock().unwrap().push((kind.to_string(), outcome));
    }

    fn gateways(&self, count: i64) {
        *self.gateways.lock().unwrap() = Some(count);
    }
}
