//! Per-pod observation history
//!
//! A bounded ring per pod key: 20 samples at the default 30 second tick is
//! ten minutes of history, enough to see a slope and short enough to react.
//! Single writer (the control loop); readers get snapshot clones.

use crate::models::{PodKey, PodObservation};
use std::collections::{HashMap, VecDeque};

/// Samples kept per pod
pub const HISTORY_CAPACITY: usize = 20;

/// Bounded per-pod observation rings
#[derive(Debug, Default)]
pub struct HistoryStore {
    rings: HashMap<PodKey, VecDeque<PodObservation>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observation per pod, evicting the oldest at capacity.
    pub fn update(&mut self, observations: &[PodObservation]) {
        for obs in observations {
            let ring = self
                .rings
                .entry(obs.key.clone())
                .or_insert_with(|| VecDeque::with_capacity(HISTORY_CAPACITY));

            while ring.len() >= HISTORY_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(obs.clone());
        }
    }

    /// Snapshot of the ring for a pod, oldest first. Empty if unknown.
    pub fn samples(&self, key: &PodKey) -> Vec<PodObservation> {
        self.rings
            .get(key)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn sample_count(&self, key: &PodKey) -> usize {
        self.rings.get(key).map(|r| r.len()).unwrap_or(0)
    }

    /// Number of pods with any history. Entries for vanished pods are
    /// retained but never consulted.
    pub fn tracked_pods(&self) -> usize {
        self.rings.len()
    }
}
