//! In-container diagnostics
//!
//! This module provides:
//! - A probe battery run inside each container (DNS, disk, /tmp, network)
//! - A stuckness heuristic over a short per-container stats ring
//! - Restart pattern analysis from pod status alone

mod checks;
mod restart;
mod stuck;

pub use restart::{analyze_pod_restarts, analyze_restart_patterns};
pub use stuck::{detect_stuck, ContainerStatSample, STUCK_STATS_CAPACITY};

use crate::cluster::ClusterGateway;
use crate::models::PodKey;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Runs exec-based probes and tracks per-container stuck statistics
pub struct DiagnosticsEngine {
    gateway: Arc<dyn ClusterGateway>,
    stuck_stats: HashMap<String, VecDeque<ContainerStatSample>>,
}

impl DiagnosticsEngine {
    pub fn new(gateway: Arc<dyn ClusterGateway>) -> Self {
        Self {
            gateway,
            stuck_stats: HashMap::new(),
        }
    }

    /// Run a shell pipeline in a container and return its stdout.
    async fn probe(&self, key: &PodKey, container: &str, command: &str) -> anyhow::Result<String> {
        let output = self.gateway.exec(key, container, command).await?;
        Ok(output.stdout)
    }

    fn stats_key(key: &PodKey, container: &str) -> String {
        format!("{}/{}", key, container)
    }
}
