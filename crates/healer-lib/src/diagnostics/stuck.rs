//! Stuck container heuristic
//!
//! Each tick records a small stat sample per container (process count, load
//! proxy, whether exec itself failed). A container is stuck when the last
//! three samples agree on one of four bad shapes.

use super::DiagnosticsEngine;
use crate::models::{PodPhase, PodSnapshot, Severity, StuckReason, StuckReport};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

/// Samples retained per container
pub const STUCK_STATS_CAPACITY: usize = 10;

/// Samples the heuristic looks at
const STUCK_WINDOW: usize = 3;

/// Load proxy at or above this in every recent sample means stuck
const HIGH_LOAD_THRESHOLD: f64 = 80.0;

/// Process count at or below this in every recent sample means stuck
const MINIMAL_PROCESS_COUNT: i64 = 3;

/// Process count drop from first to last sample that means stuck
const PROCESS_DROP: i64 = 4;

const PROCESS_COUNT_PROBE: &str = "ps aux 2>/dev/null | wc -l || echo 0";
const LOAD_PROBE: &str = "uptime 2>/dev/null || echo '0.0 0.0 0.0'";

/// One stat sample for a container
#[derive(Debug, Clone)]
pub struct ContainerStatSample {
    pub timestamp: DateTime<Utc>,
    pub process_count: i64,
    pub load_proxy: f64,
    pub exec_failed: bool,
}

impl DiagnosticsEngine {
    /// Sample every running, non-system container and report the stuck ones.
    pub async fn diagnose_stuck(&mut self, pods: &[PodSnapshot]) -> Vec<StuckReport> {
        let mut reports = Vec::new();

        for pod in pods {
            if pod.phase != PodPhase::Running || pod.key.is_system() {
                continue;
            }
            for container in &pod.containers {
                let sample = self.sample_container(&pod.key, &container.name).await;
                let stats_key = Self::stats_key(&pod.key, &container.name);

                let ring = self.stuck_stats.entry(stats_key).or_default();
                while ring.len() >= STUCK_STATS_CAPACITY {
                    ring.pop_front();
                }
                ring.push_back(sample);

                if let Some(reason) = detect_stuck(recent_window(ring)) {
                    debug!(pod = %pod.key, container = %container.name, ?reason, "stuck container");
                    reports.push(StuckReport {
                        key: pod.key.clone(),
                        container: container.name.clone(),
                        reason,
                        severity: Severity::Critical,
                        fix_tags: reason.fix_tags(),
                    });
                }
            }
        }

        reports
    }

    async fn sample_container(
        &self,
        key: &crate::models::PodKey,
        container: &str,
    ) -> ContainerStatSample {
        let mut sample = ContainerStatSample {
            timestamp: Utc::now(),
            process_count: 0,
            load_proxy: 0.0,
            exec_failed: false,
        };

        match self.probe(key, container, PROCESS_COUNT_PROBE).await {
            Ok(output) => {
                if let Ok(count) = output.trim().parse::<i64>() {
                    sample.process_count = count;
                }
            }
            Err(_) => sample.exec_failed = true,
        }

        if let Ok(output) = self.probe(key, container, LOAD_PROBE).await {
            sample.load_proxy = parse_load_proxy(&output);
        }

        sample
    }
}

/// The one-minute load average scaled to a rough percentage.
fn parse_load_proxy(uptime_output: &str) -> f64 {
    let fields: Vec<&str> = uptime_output.split_whitespace().collect();
    if fields.len() < 3 {
        return 0.0;
    }
    fields[fields.len() - 3]
        .trim_matches(',')
        .parse::<f64>()
        .map(|load| load * 100.0)
        .unwrap_or(0.0)
}

fn recent_window(ring: &VecDeque<ContainerStatSample>) -> Vec<&ContainerStatSample> {
    let start = ring.len().saturating_sub(STUCK_WINDOW);
    ring.iter().skip(start).collect()
}

/// Classify the most recent samples. Returns `None` below the window size.
pub fn detect_stuck(recent: Vec<&ContainerStatSample>) -> Option<StuckReason> {
    if recent.len() < STUCK_WINDOW {
        return None;
    }

    if recent.iter().any(|s| s.exec_failed) {
        return Some(StuckReason::Unresponsive);
    }

    if recent.iter().all(|s| s.load_proxy >= HIGH_LOAD_THRESHOLD) {
        return Some(StuckReason::HighLoad);
    }

    if recent.iter().all(|s| s.process_count <= MINIMAL_PROCESS_COUNT) {
        return Some(StuckReason::MinimalState);
    }

    let first = recent.first().map(|s| s.process_count).unwrap_or(0);
    let last = recent.last().map(|s| s.process_count).unwrap_or(0);
    if first > 0 && first - last >= PROCESS_DROP {
        return Some(StuckReason::Failing);
    }

    None
}
