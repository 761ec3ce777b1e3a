//! Remediation dispatch, per-target caps and the audit log
//!
//! The engine consumes predictions and check reports, executes bounded
//! remediations through the gateway, and records every attempt. A hard cap
//! of three actions per pod key (process lifetime, no decay) is the only
//! brake against oscillation.

use crate::cluster::ClusterGateway;
use crate::models::{
    ActionStatus, ActionTag, CheckKind, CheckReport, CheckStatus, HealingAction, PodKey,
    Prediction,
};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Hard cap on actions against one pod key per process lifetime
pub const MAX_ACTIONS_PER_TARGET: u32 = 3;

/// Audit entries retained, FIFO eviction
pub const AUDIT_CAPACITY: usize = 100;

/// Bounded cleanup pipelines; each subcommand is best-effort.
const TMP_CLEANUP_COMMANDS: &[&str] = &[
    "find /tmp -type f -atime +1 -delete 2>/dev/null || true",
    "find /tmp -type f -size +10M -delete 2>/dev/null || true",
    "find /tmp -name '*.log' -mtime +1 -delete 2>/dev/null || true",
    "find /tmp -name 'core.*' -delete 2>/dev/null || true",
    "find /tmp -name '*.tmp' -mtime +1 -delete 2>/dev/null || true",
];

const DISK_CLEANUP_COMMANDS: &[&str] = &[
    "find /var/log -name '*.log' -size +50M -exec truncate -s 10M {} + 2>/dev/null || true",
    "find /var/log -name '*.log.*' -mtime +7 -delete 2>/dev/null || true",
    "find / -name '*.core' -delete 2>/dev/null || true",
    "find /var/tmp -type f -mtime +3 -delete 2>/dev/null || true",
];

const ROUTE_FLUSH_COMMAND: &str = "ip route flush cache 2>/dev/null || true";
const NETWORK_PING_PROBE: &str = "ping -c 1 kubernetes.default.svc.cluster.local 2>/dev/null \
     && echo 'Network OK' || echo 'Network FAIL'";
const DNS_FIX_PROBE: &str = "nslookup kubernetes.default.svc.cluster.local 2>/dev/null \
     && echo 'DNS OK' || echo 'DNS FAIL'";

/// Shared, bounded, append-only action history.
///
/// Single writer (the engine), read concurrently by the HTTP surface;
/// readers always get a copied snapshot.
#[derive(Clone)]
pub struct AuditLog {
    entries: Arc<RwLock<VecDeque<HealingAction>>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub async fn push(&self, action: HealingAction) {
        let mut entries = self.entries.write().await;
        entries.push_back(action);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// The most recent `n` entries, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<HealingAction> {
        let entries = self.entries.read().await;
        let start = entries.len().saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }

    pub async fn all(&self) -> Vec<HealingAction> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn total(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Executes remediations and owns the audit log and action counters
pub struct ActionEngine {
    gateway: Arc<dyn ClusterGateway>,
    audit: AuditLog,
    counters: HashMap<PodKey, u32>,
    dry_run: bool,
}

impl ActionEngine {
    pub fn new(gateway: Arc<dyn ClusterGateway>, audit: AuditLog, dry_run: bool) -> Self {
        Self {
            gateway,
            audit,
            counters: HashMap::new(),
            dry_run,
        }
    }

    pub fn action_count(&self, key: &PodKey) -> u32 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    /// Dispatch one remediation per prediction, subject to the per-target cap.
    /// Returns the number of actions dispatched.
    pub async fn apply_predictions(&mut self, predictions: &[Prediction]) -> usize {
        let mut dispatched = 0;
        for pred in predictions {
            if self.capped(&pred.key) {
                continue;
            }
            let action = self.dispatch_prediction(pred).await;
            self.record(action).await;
            dispatched += 1;
        }
        dispatched
    }

    /// Heal failing checks. Each failing check dispatches independently and
    /// counts against the same per-target cap. Returns the number dispatched.
    pub async fn apply_check_reports(&mut self, reports: &[CheckReport]) -> usize {
        let mut dispatched = 0;
        for report in reports {
            if !report.needs_action {
                continue;
            }
            for check in &report.checks {
                if check.status == CheckStatus::Ok {
                    continue;
                }

                let applicable = match check.kind {
                    CheckKind::TmpDir => check.fix_tags.contains(&ActionTag::CleanupTmp),
                    CheckKind::RootDisk => check.fix_tags.contains(&ActionTag::CleanupDisk),
                    CheckKind::Network => check.fix_tags.contains(&ActionTag::CheckNetwork),
                    CheckKind::Dns => check.fix_tags.contains(&ActionTag::RestartDns),
                };
                if !applicable {
                    continue;
                }
                if self.capped(&report.key) {
                    continue;
                }

                let action = match check.kind {
                    CheckKind::TmpDir => self.cleanup_tmp(report).await,
                    CheckKind::RootDisk => self.cleanup_disk(report).await,
                    CheckKind::Network => self.fix_network(report).await,
                    CheckKind::Dns => self.fix_dns(report).await,
                };
                self.record(action).await;
                dispatched += 1;
            }
        }
        dispatched
    }

    fn capped(&self, key: &PodKey) -> bool {
        if self.action_count(key) >= MAX_ACTIONS_PER_TARGET {
            info!(pod = %key, limit = MAX_ACTIONS_PER_TARGET, "skipped: max actions reached");
            return true;
        }
        false
    }

    /// Append to the audit log and advance the counter, success or failure.
    async fn record(&mut self, action: HealingAction) {
        if action.status == ActionStatus::Failed {
            warn!(pod = %action.key, action = %action.action_type, result = %action.result,
                "healing action failed");
        } else {
            info!(pod = %action.key, action = %action.action_type, status = ?action.status,
                "healing action");
        }
        *self.counters.entry(action.key.clone()).or_insert(0) += 1;
        self.audit.push(action).await;
    }

    async fn dispatch_prediction(&self, pred: &Prediction) -> HealingAction {
        if pred.action.is_scale_up() {
            self.scale_up(pred).await
        } else if pred.action.is_restart_pod() {
            self.restart_pod(pred).await
        } else if pred.action == ActionTag::InvestigateRestarts {
            self.investigate(pred).await
        } else {
            // MONITOR-family tags log only; the counter still advances.
            HealingAction {
                action_type: pred.action,
                key: pred.key.clone(),
                container: None,
                description: format!("Monitoring pod (risk {})", pred.risk),
                status: ActionStatus::Completed,
                timestamp: Utc::now(),
                result: "observation only".into(),
            }
        }
    }

    async fn scale_up(&self, pred: &Prediction) -> HealingAction {
        let mut action = HealingAction {
            action_type: pred.action,
            key: pred.key.clone(),
            container: None,
            description: "Scaling up owning deployment".into(),
            status: ActionStatus::Executing,
            timestamp: Utc::now(),
            result: String::new(),
        };

        if self.dry_run {
            action.status = ActionStatus::DryRun;
            action.result = "Would scale up the owning deployment by one replica".into();
            return action;
        }

        match self.find_deployment(&pred.key).await {
            Ok(Some(deployment)) => {
                match self
                    .gateway
                    .scale_deployment(&pred.key.namespace, &deployment, 1)
                    .await
                {
                    Ok(replicas) => {
                        action.status = ActionStatus::Completed;
                        action.result =
                            format!("scaled deployment {} to {} replicas", deployment, replicas);
                    }
                    Err(e) => {
                        action.status = ActionStatus::Failed;
                        action.result = format!("scale failed: {}", e);
                    }
                }
            }
            Ok(None) => {
                action.status = ActionStatus::Failed;
                action.result = "no deployment matches the pod name prefix".into();
            }
            Err(e) => {
                action.status = ActionStatus::Failed;
                action.result = format!("deployment lookup failed: {}", e);
            }
        }

        action
    }

    /// The deployment owning a pod is located by name-prefix match in the
    /// same namespace; the longest matching name wins.
    async fn find_deployment(&self, key: &PodKey) -> anyhow::Result<Option<String>> {
        let deployments = self.gateway.list_deployments(&key.namespace).await?;
        Ok(deployments
            .into_iter()
            .filter(|d| key.name.len() > d.len() && key.name.starts_with(d.as_str()))
            .max_by_key(|d| d.len()))
    }

    async fn restart_pod(&self, pred: &Prediction) -> HealingAction {
        let mut action = HealingAction {
            action_type: pred.action,
            key: pred.key.clone(),
            container: None,
            description: "Deleting pod for recreation by its workload".into(),
            status: ActionStatus::Executing,
            timestamp: Utc::now(),
            result: String::new(),
        };

        if self.dry_run {
            action.status = ActionStatus::DryRun;
            action.result = "Would delete the pod".into();
            return action;
        }

        match self.gateway.delete_pod(&pred.key).await {
            Ok(()) => {
                action.status = ActionStatus::Completed;
                action.result = "pod deleted; workload will recreate it".into();
            }
            Err(e) => {
                action.status = ActionStatus::Failed;
                action.result = format!("delete failed: {}", e);
            }
        }

        action
    }

    /// Read-only: pull the latest events for context. Runs in dry-run too.
    async fn investigate(&self, pred: &Prediction) -> HealingAction {
        let mut action = HealingAction {
            action_type: ActionTag::InvestigateRestarts,
            key: pred.key.clone(),
            container: None,
            description: "Collecting recent events for restart investigation".into(),
            status: ActionStatus::Executing,
            timestamp: Utc::now(),
            result: String::new(),
        };

        match self
            .gateway
            .list_events(&pred.key.namespace, &pred.key.name)
            .await
        {
            Ok(events) => {
                let summary: Vec<String> = events
                    .iter()
                    .take(3)
                    .map(|e| format!("{}: {}", e.reason, e.message))
                    .collect();
                action.status = ActionStatus::Completed;
                action.result = if summary.is_empty() {
                    "no recent events".into()
                } else {
                    summary.join("; ")
                };
            }
            Err(e) => {
                action.status = ActionStatus::Failed;
                action.result = format!("event lookup failed: {}", e);
            }
        }

        action
    }

    async fn cleanup_tmp(&self, report: &CheckReport) -> HealingAction {
        self.run_cleanup(
            report,
            ActionTag::CleanupTmp,
            "Cleaning up /tmp directory",
            "Would clean up /tmp directory",
            TMP_CLEANUP_COMMANDS,
        )
        .await
    }

    async fn cleanup_disk(&self, report: &CheckReport) -> HealingAction {
        self.run_cleanup(
            report,
            ActionTag::CleanupDisk,
            "Cleaning up disk space",
            "Would clean up disk space",
            DISK_CLEANUP_COMMANDS,
        )
        .await
    }

    async fn run_cleanup(
        &self,
        report: &CheckReport,
        tag: ActionTag,
        description: &str,
        dry_run_result: &str,
        commands: &[&str],
    ) -> HealingAction {
        let mut action = HealingAction {
            action_type: tag,
            key: report.key.clone(),
            container: Some(report.container.clone()),
            description: description.into(),
            status: ActionStatus::Executing,
            timestamp: Utc::now(),
            result: String::new(),
        };

        if self.dry_run {
            action.status = ActionStatus::DryRun;
            action.result = dry_run_result.into();
            return action;
        }

        let mut results = Vec::new();
        for command in commands {
            match self
                .gateway
                .exec(&report.key, &report.container, command)
                .await
            {
                Ok(_) => results.push("cleanup executed".to_string()),
                Err(e) => results.push(format!("failed: {}", e)),
            }
        }

        action.status = ActionStatus::Completed;
        action.result = results.join("; ");
        action
    }

    /// Run the network diagnostic pipeline; if the probe still fails,
    /// escalate to a pod delete and relabel the action.
    async fn fix_network(&self, report: &CheckReport) -> HealingAction {
        let mut action = HealingAction {
            action_type: ActionTag::FixNetwork,
            key: report.key.clone(),
            container: Some(report.container.clone()),
            description: "Running network diagnostics".into(),
            status: ActionStatus::Executing,
            timestamp: Utc::now(),
            result: String::new(),
        };

        if self.dry_run {
            action.status = ActionStatus::DryRun;
            action.result = "Would run network diagnostics and restart the pod if they fail".into();
            return action;
        }

        let mut results = Vec::new();

        if let Err(e) = self
            .gateway
            .exec(&report.key, &report.container, ROUTE_FLUSH_COMMAND)
            .await
        {
            results.push(format!("route flush failed: {}", e));
        }

        let still_failing = match self
            .gateway
            .exec(&report.key, &report.container, NETWORK_PING_PROBE)
            .await
        {
            Ok(output) => {
                let combined = output.combined();
                results.push(combined.trim().to_string());
                combined.contains("Network FAIL")
            }
            Err(e) => {
                results.push(format!("probe failed: {}", e));
                true
            }
        };

        if still_failing {
            results.push("network still failing - restarting pod".into());
            match self.gateway.delete_pod(&report.key).await {
                Ok(()) => {
                    action.action_type = ActionTag::RestartPodNetwork;
                    action.description = "Restarted pod after failed network diagnostics".into();
                    action.status = ActionStatus::Completed;
                }
                Err(e) => {
                    results.push(format!("pod restart failed: {}", e));
                    action.status = ActionStatus::Failed;
                }
            }
        } else {
            action.status = ActionStatus::Completed;
        }

        action.result = results.join("; ");
        action
    }

    /// Diagnostic-only DNS probe; the tag is retained for the audit trail.
    async fn fix_dns(&self, report: &CheckReport) -> HealingAction {
        let mut action = HealingAction {
            action_type: ActionTag::FixDns,
            key: report.key.clone(),
            container: Some(report.container.clone()),
            description: "Probing DNS resolution".into(),
            status: ActionStatus::Executing,
            timestamp: Utc::now(),
            result: String::new(),
        };

        if self.dry_run {
            action.status = ActionStatus::DryRun;
            action.result = "Would probe DNS resolution".into();
            return action;
        }

        match self
            .gateway
            .exec(&report.key, &report.container, DNS_FIX_PROBE)
            .await
        {
            Ok(output) => {
                action.status = ActionStatus::Completed;
                action.result = output.combined().trim().to_string();
            }
            Err(e) => {
                action.status = ActionStatus::Failed;
                action.result = format!("DNS probe failed: {}", e);
            }
        }

        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{async_trait, NodeSnapshot};
    use crate::models::*;
    use anyhow::{anyhow, Result};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        deleted: Mutex<Vec<PodKey>>,
        scaled: Mutex<Vec<(String, String, i32)>>,
        execs: Mutex<Vec<String>>,
        deployments: Vec<String>,
        events: Vec<EventRecord>,
        network_fails: bool,
        fail_delete: bool,
    }

    #[async_trait]
    impl ClusterGateway for RecordingGateway {
        async fn list_pods(&self) -> Result<Vec<PodSnapshot>> {
            Ok(vec![])
        }
        async fn list_pod_usage(&self) -> Result<HashMap<PodKey, ResourceUsage>> {
            Ok(HashMap::new())
        }
        async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>> {
            Ok(vec![])
        }
        async fn list_node_usage(&self) -> Result<HashMap<String, ResourceUsage>> {
            Ok(HashMap::new())
        }

        async fn list_events(&self, _: &str, _: &str) -> Result<Vec<EventRecord>> {
            Ok(self.events.clone())
        }

        async fn list_deployments(&self, _: &str) -> Result<Vec<String>> {
            Ok(self.deployments.clone())
        }

        async fn delete_pod(&self, key: &PodKey) -> Result<()> {
            if self.fail_delete {
                return Err(anyhow!("forbidden"));
            }
            self.deleted.lock().unwrap().push(key.clone());
            Ok(())
        }

        async fn scale_deployment(&self, namespace: &str, name: &str, delta: i32) -> Result<i32> {
            self.scaled
                .lock()
                .unwrap()
                .push((namespace.to_string(), name.to_string(), delta));
            Ok(2)
        }

        async fn exec(&self, _: &PodKey, _: &str, command: &str) -> Result<ExecOutput> {
            self.execs.lock().unwrap().push(command.to_string());
            let stdout = if command.contains("ping") {
                if self.network_fails {
                    "Network FAIL\n".to_string()
                } else {
                    "Network OK\n".to_string()
                }
            } else {
                String::new()
            };
            Ok(ExecOutput {
                stdout,
                stderr: String::new(),
            })
        }
    }

    fn prediction(action: ActionTag) -> Prediction {
        Prediction {
            key: PodKey::new("default", "web-7f9c-abc"),
            risk: RiskLevel::Critical,
            score: 90.0,
            confidence: 95,
            issues: vec![],
            action,
            time_to_failure: None,
            cpu_slope: 0.0,
            mem_slope: 0.0,
            trend: TrendLabel::Stable,
        }
    }

    fn report(kind: CheckKind, fix_tags: Vec<ActionTag>) -> CheckReport {
        let check = ContainerCheck {
            kind,
            status: CheckStatus::Critical,
            details: "failing".into(),
            severity: Severity::High,
            fix_tags,
        };
        CheckReport {
            key: PodKey::new("default", "web-7f9c-abc"),
            container: "app".into(),
            overall: CheckStatus::Critical,
            needs_action: true,
            checks: vec![check],
        }
    }

    #[tokio::test]
    async fn restart_pod_deletes_and_audits() {
        let gateway = Arc::new(RecordingGateway::default());
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        engine
            .apply_predictions(&[prediction(ActionTag::RestartPodUrgent)])
            .await;

        assert_eq!(gateway.deleted.lock().unwrap().len(), 1);
        let entries = audit.all().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, ActionTag::RestartPodUrgent);
        assert_eq!(entries[0].status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn per_target_cap_stops_at_three() {
        let gateway = Arc::new(RecordingGateway::default());
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        let pred = prediction(ActionTag::RestartPod);
        for _ in 0..4 {
            engine.apply_predictions(&[pred.clone()]).await;
        }

        assert_eq!(gateway.deleted.lock().unwrap().len(), 3);
        assert_eq!(audit.total().await, 3);
        assert_eq!(engine.action_count(&pred.key), 3);
    }

    #[tokio::test]
    async fn scale_up_finds_deployment_by_name_prefix() {
        let gateway = Arc::new(RecordingGateway {
            deployments: vec!["web".into(), "web-7f9c".into(), "other".into()],
            ..Default::default()
        });
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        engine
            .apply_predictions(&[prediction(ActionTag::ScaleUpUrgent)])
            .await;

        {
            let scaled = gateway.scaled.lock().unwrap();
            assert_eq!(scaled.len(), 1);
            // longest matching prefix wins
            assert_eq!(scaled[0], ("default".into(), "web-7f9c".into(), 1));
        }

        let entries = audit.all().await;
        assert_eq!(entries[0].status, ActionStatus::Completed);
        assert!(entries[0].result.contains("2 replicas"));
    }

    #[tokio::test]
    async fn scale_up_without_deployment_fails() {
        let gateway = Arc::new(RecordingGateway::default());
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        engine
            .apply_predictions(&[prediction(ActionTag::ScaleUp)])
            .await;

        let entries = audit.all().await;
        assert_eq!(entries[0].status, ActionStatus::Failed);
        // failures still count toward the cap
        assert_eq!(engine.action_count(&entries[0].key), 1);
    }

    #[tokio::test]
    async fn investigate_collects_last_three_events() {
        let events = (0..5)
            .map(|i| EventRecord {
                reason: format!("BackOff{}", i),
                message: format!("restarting container ({})", i),
                timestamp: None,
            })
            .collect();
        let gateway = Arc::new(RecordingGateway {
            events,
            ..Default::default()
        });
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway, audit.clone(), false);

        engine
            .apply_predictions(&[prediction(ActionTag::InvestigateRestarts)])
            .await;

        let entries = audit.all().await;
        assert_eq!(entries[0].action_type, ActionTag::InvestigateRestarts);
        assert!(entries[0].result.contains("BackOff0"));
        assert!(entries[0].result.contains("BackOff2"));
        assert!(!entries[0].result.contains("BackOff3"));
    }

    #[tokio::test]
    async fn monitor_tags_log_only_but_count() {
        let gateway = Arc::new(RecordingGateway::default());
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        let pred = prediction(ActionTag::MonitorMemoryLeak);
        engine.apply_predictions(&[pred.clone()]).await;

        assert!(gateway.deleted.lock().unwrap().is_empty());
        assert!(gateway.execs.lock().unwrap().is_empty());
        assert_eq!(audit.total().await, 1);
        assert_eq!(engine.action_count(&pred.key), 1);
    }

    #[tokio::test]
    async fn tmp_cleanup_runs_pipeline() {
        let gateway = Arc::new(RecordingGateway::default());
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        let report = report(CheckKind::TmpDir, vec![ActionTag::CleanupTmp]);
        engine.apply_check_reports(&[report.clone()]).await;

        {
            let execs = gateway.execs.lock().unwrap();
            assert_eq!(execs.len(), TMP_CLEANUP_COMMANDS.len());
            assert!(execs.iter().all(|c| c.contains("find")));
        }

        let entries = audit.all().await;
        assert_eq!(entries[0].action_type, ActionTag::CleanupTmp);
        assert_eq!(entries[0].status, ActionStatus::Completed);
        assert_eq!(engine.action_count(&report.key), 1);
    }

    #[tokio::test]
    async fn network_fix_without_escalation() {
        let gateway = Arc::new(RecordingGateway::default());
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        let report = report(CheckKind::Network, vec![ActionTag::CheckNetwork]);
        engine.apply_check_reports(&[report]).await;

        assert!(gateway.deleted.lock().unwrap().is_empty());
        let entries = audit.all().await;
        assert_eq!(entries[0].action_type, ActionTag::FixNetwork);
        assert_eq!(entries[0].status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn network_fix_escalates_to_pod_restart() {
        let gateway = Arc::new(RecordingGateway {
            network_fails: true,
            ..Default::default()
        });
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        let report = report(CheckKind::Network, vec![ActionTag::CheckNetwork]);
        engine.apply_check_reports(&[report.clone()]).await;

        assert_eq!(gateway.deleted.lock().unwrap().len(), 1);
        let entries = audit.all().await;
        assert_eq!(entries[0].action_type, ActionTag::RestartPodNetwork);
        assert_eq!(entries[0].status, ActionStatus::Completed);
        assert!(entries[0].result.contains("still failing"));
    }

    #[tokio::test]
    async fn failed_delete_is_recorded_and_counted() {
        let gateway = Arc::new(RecordingGateway {
            fail_delete: true,
            ..Default::default()
        });
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway, audit.clone(), false);

        let pred = prediction(ActionTag::RestartPod);
        engine.apply_predictions(&[pred.clone()]).await;

        let entries = audit.all().await;
        assert_eq!(entries[0].status, ActionStatus::Failed);
        assert!(entries[0].result.contains("forbidden"));
        assert_eq!(engine.action_count(&pred.key), 1);
    }

    #[tokio::test]
    async fn dry_run_makes_no_cluster_mutations() {
        let gateway = Arc::new(RecordingGateway {
            deployments: vec!["web".into()],
            network_fails: true,
            ..Default::default()
        });
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), true);

        engine
            .apply_predictions(&[
                prediction(ActionTag::RestartPodUrgent),
                prediction(ActionTag::ScaleUpUrgent),
            ])
            .await;
        engine
            .apply_check_reports(&[
                report(CheckKind::TmpDir, vec![ActionTag::CleanupTmp]),
            ])
            .await;

        assert!(gateway.deleted.lock().unwrap().is_empty());
        assert!(gateway.scaled.lock().unwrap().is_empty());
        assert!(gateway.execs.lock().unwrap().is_empty());

        let entries = audit.all().await;
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.status == ActionStatus::DryRun));
        // counters still advance in dry-run
        assert_eq!(engine.action_count(&entries[0].key), 3);
    }

    #[tokio::test]
    async fn audit_log_evicts_oldest_beyond_capacity() {
        let audit = AuditLog::with_capacity(5);
        for i in 0..8 {
            audit
                .push(HealingAction {
                    action_type: ActionTag::Monitor,
                    key: PodKey::new("default", format!("pod-{}", i)),
                    container: None,
                    description: String::new(),
                    status: ActionStatus::Completed,
                    timestamp: Utc::now(),
                    result: String::new(),
                })
                .await;
        }

        let entries = audit.all().await;
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].key.name, "pod-3");
        assert_eq!(entries[4].key.name, "pod-7");
    }

    #[tokio::test]
    async fn recent_returns_last_n_in_order() {
        let audit = AuditLog::new();
        for i in 0..15 {
            audit
                .push(HealingAction {
                    action_type: ActionTag::Monitor,
                    key: PodKey::new("default", format!("pod-{}", i)),
                    container: None,
                    description: String::new(),
                    status: ActionStatus::Completed,
                    timestamp: Utc::now(),
                    result: String::new(),
                })
                .await;
        }

        let recent = audit.recent(10).await;
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].key.name, "pod-5");
        assert_eq!(recent[9].key.name, "pod-14");
    }

    #[tokio::test]
    async fn dns_check_with_restart_tag_probes_only() {
        let gateway = Arc::new(RecordingGateway::default());
        let audit = AuditLog::new();
        let mut engine = ActionEngine::new(gateway.clone(), audit.clone(), false);

        let report = report(
            CheckKind::Dns,
            vec![
                ActionTag::RestartPod,
                ActionTag::CheckDnsConfig,
                ActionTag::RestartDns,
            ],
        );
        engine.apply_check_reports(&[report]).await;

        // the probe ran but nothing was mutated
        assert_eq!(gateway.execs.lock().unwrap().len(), 1);
        assert!(gateway.deleted.lock().unwrap().is_empty());
        let entries = audit.all().await;
        assert_eq!(entries[0].action_type, ActionTag::FixDns);
    }
}
