//! Probe battery run inside each container
//!
//! All probes assume a POSIX shell. An exec failure is itself a signal and
//! classifies the check rather than propagating.

use super::DiagnosticsEngine;
use crate::models::{
    ActionTag, CheckKind, CheckReport, CheckStatus, ContainerCheck, PodKey, PodPhase, PodSnapshot,
    Severity,
};

const DNS_INTERNAL_PROBE: &str =
    "nslookup kubernetes.default.svc.cluster.local 2>/dev/null | grep 'Name:' || echo 'DNS_FAIL'";
const DNS_EXTERNAL_PROBE: &str =
    "nslookup google.com 2>/dev/null | grep 'Name:' || echo 'EXTERNAL_DNS_FAIL'";
const ROOT_DISK_PROBE: &str = "df / 2>/dev/null | tail -1 | awk '{print $5}' | sed 's/%//'";
const TMP_USAGE_PROBE: &str =
    "df /tmp 2>/dev/null | tail -1 | awk '{print $5}' | sed 's/%//' || echo '0'";
const TMP_LARGE_FILES_PROBE: &str = "find /tmp -type f -size +10M 2>/dev/null | wc -l";
const NET_INTERNAL_PROBE: &str = "wget -q --timeout=5 --tries=1 -O /dev/null \
     http://kubernetes.default.svc.cluster.local:443 2>/dev/null && echo 'OK' || echo 'FAIL'";
const NET_EXTERNAL_PROBE: &str =
    "wget -q --timeout=5 --tries=1 -O /dev/null http://google.com 2>/dev/null \
     && echo 'OK' || echo 'FAIL'";

impl DiagnosticsEngine {
    /// Run the full battery for every running, non-system pod. Only reports
    /// needing action are returned.
    pub async fn run_container_checks(&self, pods: &[PodSnapshot]) -> Vec<CheckReport> {
        let mut reports = Vec::new();

        for pod in pods {
            if pod.phase != PodPhase::Running || pod.key.is_system() {
                continue;
            }
            for container in &pod.containers {
                let report = self.check_container(&pod.key, &container.name).await;
                if report.needs_action {
                    reports.push(report);
                }
            }
        }

        reports
    }

    async fn check_container(&self, key: &PodKey, container: &str) -> CheckReport {
        let checks = vec![
            self.check_dns(key, container).await,
            self.check_root_disk(key, container).await,
            self.check_tmp(key, container).await,
            self.check_network(key, container).await,
        ];

        let overall = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(CheckStatus::Ok);

        CheckReport {
            key: key.clone(),
            container: container.to_string(),
            needs_action: overall != CheckStatus::Ok,
            overall,
            checks,
        }
    }

    async fn check_dns(&self, key: &PodKey, container: &str) -> ContainerCheck {
        let internal = self.probe(key, container, DNS_INTERNAL_PROBE).await;
        let internal_failed = match &internal {
            Ok(out) => out.contains("DNS_FAIL"),
            Err(_) => true,
        };
        if internal_failed {
            return ContainerCheck {
                kind: CheckKind::Dns,
                status: CheckStatus::Critical,
                details: "Internal Kubernetes DNS resolution failed".into(),
                severity: Severity::High,
                fix_tags: vec![
                    ActionTag::RestartPod,
                    ActionTag::CheckDnsConfig,
                    ActionTag::RestartDns,
                ],
            };
        }

        let external = self.probe(key, container, DNS_EXTERNAL_PROBE).await;
        let external_failed = match &external {
            Ok(out) => out.contains("DNS_FAIL"),
            Err(_) => true,
        };
        if external_failed {
            return ContainerCheck {
                kind: CheckKind::Dns,
                status: CheckStatus::Warning,
                details: "External DNS resolution failed".into(),
                severity: Severity::Medium,
                fix_tags: vec![ActionTag::CheckNetwork, ActionTag::CheckDnsServers],
            };
        }

        ContainerCheck {
            kind: CheckKind::Dns,
            status: CheckStatus::Ok,
            details: "DNS working normally".into(),
            severity: Severity::Low,
            fix_tags: vec![],
        }
    }

    async fn check_root_disk(&self, key: &PodKey, container: &str) -> ContainerCheck {
        let mut check = ContainerCheck {
            kind: CheckKind::RootDisk,
            status: CheckStatus::Ok,
            details: "Disk space normal".into(),
            severity: Severity::Low,
            fix_tags: vec![],
        };

        let output = match self.probe(key, container, ROOT_DISK_PROBE).await {
            Ok(out) => out,
            Err(_) => {
                check.status = CheckStatus::Warning;
                check.details = "Could not check disk space".into();
                return check;
            }
        };

        let usage: i64 = match output.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                check.status = CheckStatus::Warning;
                check.details = "Invalid disk usage data".into();
                return check;
            }
        };

        if usage > 90 {
            check.status = CheckStatus::Critical;
            check.details = format!("Root filesystem {}% full", usage);
            check.severity = Severity::High;
            check.fix_tags = vec![
                ActionTag::CleanupDisk,
                ActionTag::RestartPod,
                ActionTag::ScaleStorage,
            ];
        } else if usage > 80 {
            check.status = CheckStatus::Warning;
            check.details = format!("Root filesystem {}% full", usage);
            check.severity = Severity::Medium;
            check.fix_tags = vec![ActionTag::CleanupDisk, ActionTag::MonitorDisk];
        } else {
            check.details = format!("Root filesystem {}% used", usage);
        }

        check
    }

    async fn check_tmp(&self, key: &PodKey, container: &str) -> ContainerCheck {
        let mut check = ContainerCheck {
            kind: CheckKind::TmpDir,
            status: CheckStatus::Ok,
            details: "/tmp directory normal".into(),
            severity: Severity::Low,
            fix_tags: vec![],
        };

        // /tmp may not be a separate mount; failures here are not a finding
        let output = match self.probe(key, container, TMP_USAGE_PROBE).await {
            Ok(out) => out,
            Err(_) => return check,
        };

        if let Ok(usage) = output.trim().parse::<i64>() {
            if usage > 95 {
                check.status = CheckStatus::Critical;
                check.details = format!("/tmp directory {}% full", usage);
                check.severity = Severity::High;
                check.fix_tags = vec![ActionTag::CleanupTmp, ActionTag::RestartPod];
            } else if usage > 85 {
                check.status = CheckStatus::Warning;
                check.details = format!("/tmp directory {}% full", usage);
                check.severity = Severity::Medium;
                check.fix_tags = vec![ActionTag::CleanupTmp];
            }
        }

        if let Ok(output) = self.probe(key, container, TMP_LARGE_FILES_PROBE).await {
            if let Ok(large_files) = output.trim().parse::<i64>() {
                if large_files > 0 {
                    check.details = format!("{}, {} large files found", check.details, large_files);
                    if check.status == CheckStatus::Ok {
                        check.status = CheckStatus::Warning;
                        check.fix_tags = vec![ActionTag::CleanupTmp];
                    }
                }
            }
        }

        check
    }

    async fn check_network(&self, key: &PodKey, container: &str) -> ContainerCheck {
        let mut check = ContainerCheck {
            kind: CheckKind::Network,
            status: CheckStatus::Ok,
            details: "Network connectivity normal".into(),
            severity: Severity::Low,
            fix_tags: vec![],
        };

        let internal = self.probe(key, container, NET_INTERNAL_PROBE).await;
        let internal_failed = match &internal {
            Ok(out) => out.contains("FAIL"),
            Err(_) => true,
        };
        if internal_failed {
            check.status = CheckStatus::Warning;
            check.details = "Internal cluster connectivity issues".into();
            check.severity = Severity::Medium;
            check.fix_tags = vec![ActionTag::CheckNetwork, ActionTag::RestartPod];
        }

        let external = self.probe(key, container, NET_EXTERNAL_PROBE).await;
        let external_failed = match &external {
            Ok(out) => out.contains("FAIL"),
            Err(_) => true,
        };
        if external_failed && check.status == CheckStatus::Ok {
            check.status = CheckStatus::Warning;
            check.details = "External connectivity issues".into();
            check.severity = Severity::Low;
            check.fix_tags = vec![ActionTag::CheckExternalNetwork];
        }

        check
    }
}
