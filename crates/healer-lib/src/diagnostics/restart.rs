//! Restart pattern analysis
//!
//! Works from pod status alone, no exec. Classifies restart frequency and
//! shape, then refines the root cause from the last termination state.

use crate::models::{
    ActionTag, PodSnapshot, RestartFrequency, RestartPattern, RestartPatternKind, Severity,
};
use chrono::{DateTime, Utc};

/// Guard against division by a near-zero pod age (one minute floor).
const MIN_AGE_HOURS: f64 = 1.0 / 60.0;

/// Analyze every non-system pod; pods without restarts produce nothing.
pub fn analyze_restart_patterns(pods: &[PodSnapshot], now: DateTime<Utc>) -> Vec<RestartPattern> {
    pods.iter()
        .filter(|p| !p.key.is_system())
        .filter_map(|p| analyze_pod_restarts(p, now))
        .collect()
}

/// Classify a single pod's restart behaviour.
pub fn analyze_pod_restarts(pod: &PodSnapshot, now: DateTime<Utc>) -> Option<RestartPattern> {
    let total = pod.restart_total();
    if total == 0 {
        return None;
    }

    let age_hours = pod.age_hours(now).max(MIN_AGE_HOURS);
    let restarts_per_hour = total as f64 / age_hours;

    let (frequency, severity) = if restarts_per_hour > 2.0 {
        (RestartFrequency::VeryHigh, Severity::Critical)
    } else if restarts_per_hour > 1.0 {
        (RestartFrequency::High, Severity::High)
    } else if restarts_per_hour > 0.5 {
        (RestartFrequency::Medium, Severity::Medium)
    } else {
        (RestartFrequency::Low, Severity::Low)
    };

    let (pattern, root_cause, fix_tags) = if total >= 10 {
        (
            RestartPatternKind::CrashLoop,
            "Persistent application crashes".to_string(),
            vec![
                ActionTag::CheckLogs,
                ActionTag::RollbackDeployment,
                ActionTag::CheckResources,
            ],
        )
    } else if total >= 5 && age_hours < 1.0 {
        (
            RestartPatternKind::RapidRestart,
            "Fast restart cycle - likely config issue".to_string(),
            vec![
                ActionTag::CheckConfig,
                ActionTag::CheckLogs,
                ActionTag::RestartPod,
            ],
        )
    } else if total >= 3 && age_hours < 0.5 {
        (
            RestartPatternKind::StartupFailure,
            "Application failing to start properly".to_string(),
            vec![
                ActionTag::CheckStartupProbe,
                ActionTag::CheckDependencies,
                ActionTag::CheckLogs,
            ],
        )
    } else if restarts_per_hour > 0.1 {
        (
            RestartPatternKind::PeriodicRestart,
            "Regular restart pattern - possible memory leak".to_string(),
            vec![
                ActionTag::CheckMemoryLeak,
                ActionTag::MonitorResources,
                ActionTag::CheckLogs,
            ],
        )
    } else {
        (
            RestartPatternKind::Stable,
            "Infrequent restarts - no clear pattern".to_string(),
            vec![],
        )
    };

    let mut result = RestartPattern {
        key: pod.key.clone(),
        restart_count: total,
        pattern,
        frequency,
        severity,
        root_cause,
        fix_tags,
    };

    refine_from_terminations(pod, &mut result);
    Some(result)
}

/// Fold the last termination state of each container into the root cause.
/// An OOM kill (reason or exit 137) overrides everything.
fn refine_from_terminations(pod: &PodSnapshot, result: &mut RestartPattern) {
    for container in &pod.containers {
        let oom_reason = container.last_termination_reason.as_deref() == Some("OOMKilled");
        let oom_exit = container.last_exit_code == Some(137);

        if oom_reason || oom_exit {
            result.root_cause = "Out of memory killed".to_string();
            result.severity = Severity::Critical;
            result.fix_tags = vec![
                ActionTag::IncreaseMemoryLimits,
                ActionTag::CheckMemoryLeak,
                ActionTag::OptimizeMemory,
            ];
            return;
        }

        match container.last_exit_code {
            Some(143) => {
                result.root_cause = "Container gracefully terminated".to_string();
                result.fix_tags.push(ActionTag::CheckShutdownHooks);
            }
            Some(1) => {
                result.root_cause = "Application error exit".to_string();
                result.fix_tags.push(ActionTag::CheckApplicationLogs);
                result.fix_tags.push(ActionTag::DebugApplication);
            }
            _ => {}
        }
    }
}
