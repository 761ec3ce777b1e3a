//! Observability infrastructure for the healer
//!
//! Prometheus metrics for tick timing, cluster coverage and action outcomes.
//! Metrics register once in a global instance; the public handle is a cheap
//! clone shared across components.

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;

/// Histogram buckets for tick duration (seconds)
const TICK_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

static GLOBAL_METRICS: OnceLock<HealerMetricsInner> = OnceLock::new();

struct HealerMetricsInner {
    tick_duration_seconds: Histogram,
    ticks_total: IntGauge,
    tick_failures_total: IntGauge,
    pods_observed: IntGauge,
    nodes_observed: IntGauge,
    predictions_emitted: IntGauge,
    check_reports: IntGauge,
    stuck_containers: IntGauge,
    restart_patterns: IntGauge,
    actions_executed_total: IntGauge,
    audit_log_size: IntGauge,
}

impl HealerMetricsInner {
    fn new() -> Self {
        Self {
            tick_duration_seconds: register_histogram!(
                "healer_tick_duration_seconds",
                "Time spent running one control loop tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),

            ticks_total: register_int_gauge!(
                "healer_ticks_total",
                "Total control loop ticks completed"
            )
            .expect("Failed to register ticks_total"),

            tick_failures_total: register_int_gauge!(
                "healer_tick_failures_total",
                "Ticks aborted because the pod listing failed"
            )
            .expect("Failed to register tick_failures_total"),

            pods_observed: register_int_gauge!(
                "healer_pods_observed",
                "Non-system pods seen in the latest tick"
            )
            .expect("Failed to register pods_observed"),

            nodes_observed: register_int_gauge!(
                "healer_nodes_observed",
                "Nodes seen in the latest tick"
            )
            .expect("Failed to register nodes_observed"),

            predictions_emitted: register_int_gauge!(
                "healer_predictions_emitted",
                "Predictions emitted in the latest tick"
            )
            .expect("Failed to register predictions_emitted"),

            check_reports: register_int_gauge!(
                "healer_check_reports",
                "Container check reports needing action in the latest tick"
            )
            .expect("Failed to register check_reports"),

            stuck_containers: register_int_gauge!(
                "healer_stuck_containers",
                "Containers flagged stuck in the latest tick"
            )
            .expect("Failed to register stuck_containers"),

            restart_patterns: register_int_gauge!(
                "healer_restart_patterns",
                "Pods with restart findings in the latest tick"
            )
            .expect("Failed to register restart_patterns"),

            actions_executed_total: register_int_gauge!(
                "healer_actions_executed_total",
                "Healing actions dispatched since startup"
            )
            .expect("Failed to register actions_executed_total"),

            audit_log_size: register_int_gauge!(
                "healer_audit_log_size",
                "Entries currently held in the audit log"
            )
            .expect("Failed to register audit_log_size"),
        }
    }
}

/// Lightweight handle to the global metrics instance
#[derive(Clone)]
pub struct HealerMetrics {
    _private: (),
}

impl Default for HealerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HealerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HealerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &'static HealerMetricsInner {
        GLOBAL_METRICS.get_or_init(HealerMetricsInner::new)
    }

    pub fn observe_tick_duration(&self, seconds: f64) {
        self.inner().tick_duration_seconds.observe(seconds);
        self.inner().ticks_total.inc();
    }

    pub fn record_tick_failure(&self) {
        self.inner().tick_failures_total.inc();
    }

    pub fn set_cluster_view(&self, pods: usize, nodes: usize) {
        self.inner().pods_observed.set(pods as i64);
        self.inner().nodes_observed.set(nodes as i64);
    }

    pub fn set_findings(
        &self,
        predictions: usize,
        check_reports: usize,
        stuck: usize,
        restart_patterns: usize,
    ) {
        self.inner().predictions_emitted.set(predictions as i64);
        self.inner().check_reports.set(check_reports as i64);
        self.inner().stuck_containers.set(stuck as i64);
        self.inner().restart_patterns.set(restart_patterns as i64);
    }

    pub fn add_actions(&self, count: usize) {
        self.inner().actions_executed_total.add(count as i64);
    }

    pub fn set_audit_log_size(&self, size: usize) {
        self.inner().audit_log_size.set(size as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_once_and_update() {
        let metrics = HealerMetrics::new();
        let also = HealerMetrics::new();

        metrics.set_cluster_view(12, 3);
        also.set_findings(2, 1, 0, 4);
        metrics.observe_tick_duration(0.2);
        metrics.add_actions(2);
        metrics.set_audit_log_size(7);

        // second handle shares the same registry
        also.observe_tick_duration(0.1);
    }
}
