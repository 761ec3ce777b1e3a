//! Per-tick cluster sampling
//!
//! Materializes a flat view of pod and node state with joined usage metrics.
//! Pod and usage listings run concurrently and are joined on pod key before
//! anything downstream sees them.

use crate::cluster::ClusterGateway;
use crate::models::{NodeObservation, PodObservation, PodSnapshot};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

/// CPU "percent" is a coarse surrogate: milli-cores divided by 10.
const CPU_MILLIS_PER_PERCENT: f64 = 10.0;

/// Memory "percent" assumes a 1 GiB reference, not the pod's limit.
const MEM_REFERENCE_BYTES: f64 = 1024.0 * 1024.0 * 1024.0;

/// Everything one tick observed about the cluster
#[derive(Debug, Clone, Default)]
pub struct ClusterSample {
    /// Non-system pods with raw status detail (for diagnostics).
    pub pods: Vec<PodSnapshot>,
    /// Non-system pods with joined usage (for prediction).
    pub observations: Vec<PodObservation>,
    /// Node usage relative to capacity.
    pub nodes: Vec<NodeObservation>,
}

/// Samples the cluster through the gateway once per tick
pub struct Collector {
    gateway: Arc<dyn ClusterGateway>,
}

impl Collector {
    pub fn new(gateway: Arc<dyn ClusterGateway>) -> Self {
        Self { gateway }
    }

    /// Collect one sample. A pod listing failure is an error and aborts the
    /// tick; a usage listing failure degrades to zeroed percents.
    pub async fn collect(&self) -> Result<ClusterSample> {
        let (pods, usage) = tokio::join!(self.gateway.list_pods(), self.gateway.list_pod_usage());

        let all_pods = pods?;
        let usage = match usage {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "pod usage unavailable, continuing with zeroed metrics");
                Default::default()
            }
        };

        let now = Utc::now();
        let mut observations = Vec::new();
        let mut pods = Vec::new();

        for pod in &all_pods {
            if pod.key.is_system() {
                continue;
            }

            let used = usage.get(&pod.key).copied().unwrap_or_default();
            observations.push(PodObservation {
                key: pod.key.clone(),
                node: pod.node.clone(),
                phase: pod.phase,
                restart_count: pod.restart_total(),
                cpu_percent: used.cpu_millis / CPU_MILLIS_PER_PERCENT,
                mem_percent: used.memory_bytes / MEM_REFERENCE_BYTES * 100.0,
                age_secs: (now - pod.created_at).num_seconds(),
                timestamp: now,
            });
            pods.push(pod.clone());
        }

        let nodes = self.collect_nodes(&all_pods).await;

        Ok(ClusterSample {
            pods,
            observations,
            nodes,
        })
    }

    /// Node observations are presentation-only; failures degrade to empty.
    async fn collect_nodes(&self, all_pods: &[PodSnapshot]) -> Vec<NodeObservation> {
        let (nodes, usage) = tokio::join!(
            self.gateway.list_nodes(),
            self.gateway.list_node_usage()
        );

        let nodes = match nodes {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "node list unavailable");
                return Vec::new();
            }
        };
        let usage = match usage {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "node usage unavailable");
                Default::default()
            }
        };

        nodes
            .into_iter()
            .map(|node| {
                let used = usage.get(&node.name).copied().unwrap_or_default();
                let cpu_percent = if node.capacity.cpu_millis > 0.0 {
                    used.cpu_millis / node.capacity.cpu_millis * 100.0
                } else {
                    0.0
                };
                let mem_percent = if node.capacity.memory_bytes > 0.0 {
                    used.memory_bytes / node.capacity.memory_bytes * 100.0
                } else {
                    0.0
                };
                let pod_count = all_pods.iter().filter(|p| p.node == node.name).count();

                NodeObservation {
                    name: node.name,
                    cpu_percent,
                    mem_percent,
                    pod_count,
                }
            })
            .collect()
    }
}
