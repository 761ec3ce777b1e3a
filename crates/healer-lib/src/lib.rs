//! Healer library: an autonomous control loop for a Kubernetes cluster
//!
//! This crate provides the core functionality for:
//! - Cluster sampling (pods, nodes, usage metrics)
//! - Risk scoring and time-to-failure forecasting
//! - In-container diagnostics and stuckness detection
//! - Restart pattern analysis
//! - Bounded remediation with an audit trail

pub mod actions;
pub mod cluster;
pub mod collector;
pub mod diagnostics;
pub mod history;
mod r#loop;
pub mod models;
pub mod observability;
pub mod predictor;

pub use actions::{ActionEngine, AuditLog, AUDIT_CAPACITY, MAX_ACTIONS_PER_TARGET};
pub use cluster::{ClusterGateway, KubeGateway};
pub use collector::{ClusterSample, Collector};
pub use history::{HistoryStore, HISTORY_CAPACITY};
pub use models::*;
pub use observability::HealerMetrics;
pub use predictor::Predictor;
pub use r#loop::{HealerLoop, LoopConfig, DEFAULT_TICK_INTERVAL};
