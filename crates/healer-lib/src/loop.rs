//! The healer control loop
//!
//! Drives the fixed-cadence diagnose -> predict -> decide -> act -> record
//! cycle. A tick is sequential internally and never overlaps the next one.

use crate::actions::{ActionEngine, AuditLog};
use crate::cluster::ClusterGateway;
use crate::collector::Collector;
use crate::diagnostics::{analyze_restart_patterns, DiagnosticsEngine};
use crate::history::HistoryStore;
use crate::models::Severity;
use crate::observability::HealerMetrics;
use crate::predictor::Predictor;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default seconds between ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for the control loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between ticks
    pub tick_interval: Duration,
    /// Replace mutations with DRY_RUN audit records
    pub dry_run: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            dry_run: false,
        }
    }
}

/// What one tick produced, for logging
#[derive(Debug, Default)]
struct TickSummary {
    pods: usize,
    nodes: usize,
    predictions: usize,
    check_reports: usize,
    stuck: usize,
    restart_patterns: usize,
    actions: usize,
}

/// Long-lived control task owning all per-tick state
pub struct HealerLoop {
    collector: Collector,
    history: HistoryStore,
    predictor: Predictor,
    diagnostics: DiagnosticsEngine,
    engine: ActionEngine,
    audit: AuditLog,
    metrics: HealerMetrics,
    config: LoopConfig,
}

impl HealerLoop {
    pub fn new(gateway: Arc<dyn ClusterGateway>, audit: AuditLog, config: LoopConfig) -> Self {
        Self {
            collector: Collector::new(gateway.clone()),
            history: HistoryStore::new(),
            predictor: Predictor::new(),
            diagnostics: DiagnosticsEngine::new(gateway.clone()),
            engine: ActionEngine::new(gateway, audit.clone(), config.dry_run),
            audit,
            metrics: HealerMetrics::new(),
            config,
        }
    }

    /// Run until the shutdown signal fires. A failed tick is logged and the
    /// same condition is simply re-observed next interval.
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            dry_run = self.config.dry_run,
            "Starting healer control loop"
        );

        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();
                    match self.tick().await {
                        Ok(summary) => {
                            self.metrics.observe_tick_duration(start.elapsed().as_secs_f64());
                            debug!(
                                pods = summary.pods,
                                nodes = summary.nodes,
                                predictions = summary.predictions,
                                check_reports = summary.check_reports,
                                stuck = summary.stuck,
                                restart_patterns = summary.restart_patterns,
                                actions = summary.actions,
                                elapsed_ms = start.elapsed().as_millis(),
                                "tick complete"
                            );
                        }
                        Err(e) => {
                            self.metrics.record_tick_failure();
                            warn!(error = %e, "tick aborted, retrying next interval");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down healer control loop");
                    break;
                }
            }
        }
    }

    async fn tick(&mut self) -> Result<TickSummary> {
        let sample = self.collector.collect().await?;
        self.history.update(&sample.observations);

        let predictions = self.predictor.predict(&sample.observations, &self.history);
        let check_reports = self.diagnostics.run_container_checks(&sample.pods).await;
        let stuck = self.diagnostics.diagnose_stuck(&sample.pods).await;
        let restart_patterns = analyze_restart_patterns(&sample.pods, Utc::now());

        for report in &stuck {
            warn!(
                pod = %report.key,
                container = %report.container,
                reason = report.reason.description(),
                "stuck container detected"
            );
        }
        for pattern in &restart_patterns {
            if pattern.severity >= Severity::High {
                warn!(
                    pod = %pattern.key,
                    restarts = pattern.restart_count,
                    pattern = ?pattern.pattern,
                    root_cause = %pattern.root_cause,
                    "restart pattern"
                );
            }
        }

        let mut actions = self.engine.apply_predictions(&predictions).await;
        actions += self.engine.apply_check_reports(&check_reports).await;

        self.metrics
            .set_cluster_view(sample.observations.len(), sample.nodes.len());
        self.metrics.set_findings(
            predictions.len(),
            check_reports.len(),
            stuck.len(),
            restart_patterns.len(),
        );
        self.metrics.add_actions(actions);
        self.metrics.set_audit_log_size(self.audit.total().await);

        Ok(TickSummary {
            pods: sample.observations.len(),
            nodes: sample.nodes.len(),
            predictions: predictions.len(),
            check_reports: check_reports.len(),
            stuck: stuck.len(),
            restart_patterns: restart_patterns.len(),
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{async_trait, NodeSnapshot};
    use crate::models::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A cluster with one pod pinned in Pending; every tick should decide to
    /// restart it until the per-target cap bites.
    struct StuckClusterGateway {
        deletes: Mutex<usize>,
    }

    #[async_trait]
    impl ClusterGateway for StuckClusterGateway {
        async fn list_pods(&self) -> anyhow::Result<Vec<PodSnapshot>> {
            Ok(vec![PodSnapshot {
                key: PodKey::new("default", "web-1"),
                node: "node-1".into(),
                phase: PodPhase::Pending,
                containers: vec![],
                created_at: Utc::now(),
            }])
        }
        async fn list_pod_usage(&self) -> anyhow::Result<HashMap<PodKey, ResourceUsage>> {
            Ok(HashMap::new())
        }
        async fn list_nodes(&self) -> anyhow::Result<Vec<NodeSnapshot>> {
            Ok(vec![])
        }
        async fn list_node_usage(&self) -> anyhow::Result<HashMap<String, ResourceUsage>> {
            Ok(HashMap::new())
        }
        async fn list_events(&self, _: &str, _: &str) -> anyhow::Result<Vec<EventRecord>> {
            Ok(vec![])
        }
        async fn list_deployments(&self, _: &str) -> anyhow::Result<Vec<String>> {
            Ok(vec![])
        }
        async fn delete_pod(&self, _: &PodKey) -> anyhow::Result<()> {
            *self.deletes.lock().unwrap() += 1;
            Ok(())
        }
        async fn scale_deployment(&self, _: &str, _: &str, _: i32) -> anyhow::Result<i32> {
            Ok(1)
        }
        async fn exec(&self, _: &PodKey, _: &str, _: &str) -> anyhow::Result<ExecOutput> {
            Ok(ExecOutput::default())
        }
    }

    #[tokio::test]
    async fn ticks_respect_the_action_cap_end_to_end() {
        let gateway = Arc::new(StuckClusterGateway {
            deletes: Mutex::new(0),
        });
        let audit = AuditLog::new();
        let mut healer = HealerLoop::new(gateway.clone(), audit.clone(), LoopConfig::default());

        for _ in 0..5 {
            healer.tick().await.unwrap();
        }

        // three deletes, then skips
        assert_eq!(*gateway.deletes.lock().unwrap(), 3);
        assert_eq!(audit.total().await, 3);

        let entries = audit.all().await;
        assert!(entries
            .iter()
            .all(|e| e.action_type == ActionTag::RestartPod));
    }

    #[tokio::test]
    async fn tick_builds_history_per_pod() {
        let gateway = Arc::new(StuckClusterGateway {
            deletes: Mutex::new(0),
        });
        let mut healer = HealerLoop::new(gateway, AuditLog::new(), LoopConfig::default());

        for _ in 0..3 {
            healer.tick().await.unwrap();
        }
        assert_eq!(
            healer.history.sample_count(&PodKey::new("default", "web-1")),
            3
        );
    }
}
