//! Core data models for the healer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a pod within the cluster view
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// True for namespaces the healer must never touch
    pub fn is_system(&self) -> bool {
        self.namespace.starts_with("kube-") || self.namespace.starts_with("healer-")
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Pod lifecycle phase as reported by the cluster API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn parse(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Per-container status extracted from the pod's container statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerState {
    pub name: String,
    pub restart_count: i32,
    pub last_exit_code: Option<i32>,
    pub last_termination_reason: Option<String>,
}

/// Raw pod state as read from the cluster, before usage is joined in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub key: PodKey,
    pub node: String,
    pub phase: PodPhase,
    pub containers: Vec<ContainerState>,
    pub created_at: DateTime<Utc>,
}

impl PodSnapshot {
    /// Total restarts summed across container statuses
    pub fn restart_total(&self) -> i32 {
        self.containers.iter().map(|c| c.restart_count).sum()
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 3600.0
    }
}

/// Usage quantities from the metrics API, converted to base units
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_millis: f64,
    pub memory_bytes: f64,
}

/// Snapshot of a pod with joined resource usage, taken at a wall-clock instant.
/// Immutable once emitted by the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodObservation {
    pub key: PodKey,
    pub node: String,
    pub phase: PodPhase,
    pub restart_count: i32,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub age_secs: i64,
    pub timestamp: DateTime<Utc>,
}

/// Node-level usage, capacity-relative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeObservation {
    pub name: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub pod_count: usize,
}

/// A cluster event attached to a pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub reason: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Captured output of an in-container exec
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}{}", self.stdout, self.stderr)
        }
    }
}

/// Risk bands, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "LOW-MEDIUM")]
    LowMedium,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::LowMedium => "LOW-MEDIUM",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Direction of resource usage over the history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendLabel {
    Stable,
    Growing,
    Declining,
    CriticalGrowth,
}

/// Symbolic identifier selecting a remediation branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionTag {
    ScaleUp,
    ScaleUpUrgent,
    ScaleUpPlanned,
    RestartPod,
    RestartPodUrgent,
    RestartPodPlanned,
    RestartPodNetwork,
    Monitor,
    MonitorClosely,
    MonitorMemoryLeak,
    MonitorDisk,
    MonitorResources,
    InvestigateRestarts,
    InvestigatePerformance,
    InvestigateApp,
    CleanupTmp,
    CleanupDisk,
    ScaleStorage,
    CheckNetwork,
    CheckExternalNetwork,
    CheckDnsConfig,
    CheckDnsServers,
    RestartDns,
    FixDns,
    FixNetwork,
    IncreaseMemoryLimits,
    CheckMemoryLeak,
    OptimizeMemory,
    CheckLogs,
    CheckResources,
    CheckHealth,
    CheckConfig,
    CheckStartupProbe,
    CheckDependencies,
    CheckShutdownHooks,
    CheckApplicationLogs,
    DebugApplication,
    RollbackDeployment,
}

impl ActionTag {
    pub fn is_scale_up(self) -> bool {
        matches!(
            self,
            ActionTag::ScaleUp | ActionTag::ScaleUpUrgent | ActionTag::ScaleUpPlanned
        )
    }

    pub fn is_restart_pod(self) -> bool {
        matches!(
            self,
            ActionTag::RestartPod | ActionTag::RestartPodUrgent | ActionTag::RestartPodPlanned
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionTag::ScaleUp => "SCALE_UP",
            ActionTag::ScaleUpUrgent => "SCALE_UP_URGENT",
            ActionTag::ScaleUpPlanned => "SCALE_UP_PLANNED",
            ActionTag::RestartPod => "RESTART_POD",
            ActionTag::RestartPodUrgent => "RESTART_POD_URGENT",
            ActionTag::RestartPodPlanned => "RESTART_POD_PLANNED",
            ActionTag::RestartPodNetwork => "RESTART_POD_NETWORK",
            ActionTag::Monitor => "MONITOR",
            ActionTag::MonitorClosely => "MONITOR_CLOSELY",
            ActionTag::MonitorMemoryLeak => "MONITOR_MEMORY_LEAK",
            ActionTag::MonitorDisk => "MONITOR_DISK",
            ActionTag::MonitorResources => "MONITOR_RESOURCES",
            ActionTag::InvestigateRestarts => "INVESTIGATE_RESTARTS",
            ActionTag::InvestigatePerformance => "INVESTIGATE_PERFORMANCE",
            ActionTag::InvestigateApp => "INVESTIGATE_APP",
            ActionTag::CleanupTmp => "CLEANUP_TMP",
            ActionTag::CleanupDisk => "CLEANUP_DISK",
            ActionTag::ScaleStorage => "SCALE_STORAGE",
            ActionTag::CheckNetwork => "CHECK_NETWORK",
            ActionTag::CheckExternalNetwork => "CHECK_EXTERNAL_NETWORK",
            ActionTag::CheckDnsConfig => "CHECK_DNS_CONFIG",
            ActionTag::CheckDnsServers => "CHECK_DNS_SERVERS",
            ActionTag::RestartDns => "RESTART_DNS",
            ActionTag::FixDns => "FIX_DNS",
            ActionTag::FixNetwork => "FIX_NETWORK",
            ActionTag::IncreaseMemoryLimits => "INCREASE_MEMORY_LIMITS",
            ActionTag::CheckMemoryLeak => "CHECK_MEMORY_LEAK",
            ActionTag::OptimizeMemory => "OPTIMIZE_MEMORY",
            ActionTag::CheckLogs => "CHECK_LOGS",
            ActionTag::CheckResources => "CHECK_RESOURCES",
            ActionTag::CheckHealth => "CHECK_HEALTH",
            ActionTag::CheckConfig => "CHECK_CONFIG",
            ActionTag::CheckStartupProbe => "CHECK_STARTUP_PROBE",
            ActionTag::CheckDependencies => "CHECK_DEPENDENCIES",
            ActionTag::CheckShutdownHooks => "CHECK_SHUTDOWN_HOOKS",
            ActionTag::CheckApplicationLogs => "CHECK_APPLICATION_LOGS",
            ActionTag::DebugApplication => "DEBUG_APPLICATION",
            ActionTag::RollbackDeployment => "ROLLBACK_DEPLOYMENT",
        }
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the forecast expects to run out first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    CpuExhaustion,
    MemoryLeak,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::CpuExhaustion => f.write_str("CPU overload"),
            FailureCause::MemoryLeak => f.write_str("Memory leak"),
        }
    }
}

/// Projected hours until the resource in question reaches 100%
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeToFailure {
    pub hours: f64,
    pub cause: FailureCause,
}

/// Output of the predictor for a single pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub key: PodKey,
    pub risk: RiskLevel,
    pub score: f64,
    pub confidence: u8,
    pub issues: Vec<String>,
    pub action: ActionTag,
    pub time_to_failure: Option<TimeToFailure>,
    pub cpu_slope: f64,
    pub mem_slope: f64,
    pub trend: TrendLabel,
}

/// Result classification of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Ok,
    Warning,
    Critical,
}

/// Severity carried by checks, stuck reports and restart patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Which probe a check result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Dns,
    RootDisk,
    TmpDir,
    Network,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::Dns => "DNS Resolution",
            CheckKind::RootDisk => "Disk Space",
            CheckKind::TmpDir => "/tmp Directory",
            CheckKind::Network => "Network Connectivity",
        }
    }
}

/// A single probe result for one container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerCheck {
    pub kind: CheckKind,
    pub status: CheckStatus,
    pub details: String,
    pub severity: Severity,
    pub fix_tags: Vec<ActionTag>,
}

/// All probe results for one container, with worst-of aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub key: PodKey,
    pub container: String,
    pub checks: Vec<ContainerCheck>,
    pub overall: CheckStatus,
    pub needs_action: bool,
}

/// Why a container was classified as stuck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckReason {
    Unresponsive,
    HighLoad,
    MinimalState,
    Failing,
}

impl StuckReason {
    pub fn description(self) -> &'static str {
        match self {
            StuckReason::Unresponsive => {
                "Container exec commands failing - container may be unresponsive"
            }
            StuckReason::HighLoad => "Consistently high system load - container may be stuck",
            StuckReason::MinimalState => {
                "Very low process count - container may be in minimal state"
            }
            StuckReason::Failing => {
                "Process count decreasing rapidly - application may be failing"
            }
        }
    }

    pub fn fix_tags(self) -> Vec<ActionTag> {
        match self {
            StuckReason::Unresponsive => vec![ActionTag::RestartPod, ActionTag::CheckLogs],
            StuckReason::HighLoad => vec![ActionTag::RestartPod, ActionTag::CheckResources],
            StuckReason::MinimalState => vec![
                ActionTag::RestartPod,
                ActionTag::InvestigateApp,
                ActionTag::CheckHealth,
                ActionTag::MonitorClosely,
            ],
            StuckReason::Failing => vec![ActionTag::RestartPod, ActionTag::CheckLogs],
        }
    }
}

/// Emitted when the stuckness heuristic triggers for a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StuckReport {
    pub key: PodKey,
    pub container: String,
    pub reason: StuckReason,
    pub severity: Severity,
    pub fix_tags: Vec<ActionTag>,
}

/// Restart behaviour classification derived from pod status alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestartPatternKind {
    Stable,
    CrashLoop,
    RapidRestart,
    StartupFailure,
    PeriodicRestart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestartFrequency {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartPattern {
    pub key: PodKey,
    pub restart_count: i32,
    pub pattern: RestartPatternKind,
    pub frequency: RestartFrequency,
    pub severity: Severity,
    pub root_cause: String,
    pub fix_tags: Vec<ActionTag>,
}

/// Outcome state of a healing action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    DryRun,
    Executing,
    Completed,
    Failed,
}

/// Audit entry for a dispatched remediation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingAction {
    pub action_type: ActionTag,
    pub key: PodKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    pub description: String,
    pub status: ActionStatus,
    pub timestamp: DateTime<Utc>,
    pub result: String,
}
