//! Risk scoring and time-to-failure forecasting
//!
//! Combines instantaneous thresholds with a deliberately simple two-point
//! slope over the observation history. The slope assumes the fixed tick
//! period; the thresholds are the contract, the estimator is not.

use crate::history::HistoryStore;
use crate::models::{
    ActionTag, FailureCause, PodObservation, PodPhase, Prediction, RiskLevel, TimeToFailure,
    TrendLabel,
};

/// Samples required before trend rules apply
pub const MIN_TREND_SAMPLES: usize = 5;

/// Assumed seconds between samples when converting slopes to per-hour rates
const ASSUMED_TICK_SECS: f64 = 30.0;

/// CPU growth considered meaningful, percent per hour
const CPU_SLOPE_THRESHOLD: f64 = 2.0;

/// Memory growth considered a leak, percent per hour
const MEM_SLOPE_THRESHOLD: f64 = 1.0;

/// Forecasts beyond this horizon are ignored
const FORECAST_HORIZON_HOURS: f64 = 72.0;

/// Fraction of adjacent increases that flags degradation
const DEGRADATION_RATIO: f64 = 0.7;

/// Threshold-and-slope predictor over current observations plus history
#[derive(Debug, Default)]
pub struct Predictor;

impl Predictor {
    pub fn new() -> Self {
        Self
    }

    /// Analyze every observation against its history. Only pods with
    /// score > 30 or an active forecast are reported.
    pub fn predict(
        &self,
        observations: &[PodObservation],
        history: &HistoryStore,
    ) -> Vec<Prediction> {
        observations
            .iter()
            .map(|obs| self.analyze(obs, &history.samples(&obs.key)))
            .filter(|p| p.score > 30.0 || p.time_to_failure.is_some())
            .collect()
    }

    /// Score a single pod. `samples` is its history ring, oldest first, with
    /// the current observation already appended by the loop.
    pub fn analyze(&self, current: &PodObservation, samples: &[PodObservation]) -> Prediction {
        let mut score: f64 = 0.0;
        let mut rule_risk = RiskLevel::Low;
        let mut action = ActionTag::Monitor;
        let mut issues = Vec::new();
        let mut time_to_failure = None;
        let mut cpu_slope = 0.0;
        let mut mem_slope = 0.0;
        let mut trend = TrendLabel::Stable;

        // Instantaneous resource thresholds
        if current.cpu_percent > 15.0 {
            issues.push(format!("CRITICAL CPU: {:.1}%", current.cpu_percent));
            rule_risk = rule_risk.max(RiskLevel::Critical);
            action = ActionTag::ScaleUpUrgent;
            score += 40.0;
        } else if current.cpu_percent > 10.0 {
            issues.push(format!("HIGH CPU: {:.1}%", current.cpu_percent));
            rule_risk = rule_risk.max(RiskLevel::High);
            action = ActionTag::ScaleUp;
            score += 25.0;
        }

        if current.mem_percent > 15.0 {
            issues.push(format!("CRITICAL Memory: {:.1}%", current.mem_percent));
            rule_risk = rule_risk.max(RiskLevel::Critical);
            action = ActionTag::RestartPodUrgent;
            score += 40.0;
        } else if current.mem_percent > 10.0 {
            issues.push(format!("HIGH Memory: {:.1}%", current.mem_percent));
            rule_risk = rule_risk.max(RiskLevel::High);
            action = ActionTag::RestartPod;
            score += 25.0;
        }

        // Trend rules need enough history to mean anything
        if samples.len() >= MIN_TREND_SAMPLES {
            cpu_slope = slope_per_hour(samples, |o| o.cpu_percent);
            mem_slope = slope_per_hour(samples, |o| o.mem_percent);

            if cpu_slope > CPU_SLOPE_THRESHOLD {
                let hours = (100.0 - current.cpu_percent) / cpu_slope;
                if hours > 0.0 && hours <= FORECAST_HORIZON_HOURS {
                    issues.push(format!(
                        "CPU growing {:.1}%/hour, reaching 100% in {:.1} hours",
                        cpu_slope, hours
                    ));
                    time_to_failure = Some(TimeToFailure {
                        hours,
                        cause: FailureCause::CpuExhaustion,
                    });
                    score += 30.0;

                    if hours < 24.0 {
                        rule_risk = rule_risk.max(RiskLevel::Critical);
                        action = ActionTag::ScaleUpUrgent;
                        score += 20.0;
                    } else {
                        rule_risk = rule_risk.max(RiskLevel::High);
                        action = ActionTag::ScaleUpPlanned;
                    }
                }
            }

            if mem_slope > MEM_SLOPE_THRESHOLD {
                let hours = (100.0 - current.mem_percent) / mem_slope;
                if hours > 0.0 && hours <= FORECAST_HORIZON_HOURS {
                    issues.push(format!(
                        "Memory leak: growing {:.1}%/hour, OOM in {:.1} hours",
                        mem_slope, hours
                    ));
                    time_to_failure = Some(TimeToFailure {
                        hours,
                        cause: FailureCause::MemoryLeak,
                    });
                    score += 35.0;

                    if hours < 12.0 {
                        rule_risk = rule_risk.max(RiskLevel::Critical);
                        action = ActionTag::RestartPodUrgent;
                        issues.push("IMMEDIATE ACTION REQUIRED".to_string());
                        score += 25.0;
                    } else if hours < 24.0 {
                        rule_risk = rule_risk.max(RiskLevel::High);
                        action = ActionTag::RestartPodPlanned;
                    } else {
                        rule_risk = rule_risk.max(RiskLevel::Medium);
                        action = ActionTag::MonitorMemoryLeak;
                    }
                }
            }

            if detect_degradation(samples) {
                issues.push("Performance degradation detected over time".to_string());
                score += 20.0;
                if rule_risk == RiskLevel::Low {
                    rule_risk = RiskLevel::Medium;
                    action = ActionTag::InvestigatePerformance;
                }
            }

            trend = if cpu_slope > CPU_SLOPE_THRESHOLD && mem_slope > MEM_SLOPE_THRESHOLD {
                TrendLabel::CriticalGrowth
            } else if cpu_slope > 1.0 || mem_slope > 0.5 {
                TrendLabel::Growing
            } else if cpu_slope < -1.0 || mem_slope < -0.5 {
                TrendLabel::Declining
            } else {
                TrendLabel::Stable
            };
        }

        // Restart and phase rules
        if current.restart_count >= 3 {
            issues.push(format!("High restart count: {}", current.restart_count));
            score += 30.0;
            action = ActionTag::InvestigateRestarts;
        }

        if current.phase != PodPhase::Running {
            issues.push(format!("Pod not running: {}", current.phase));
            rule_risk = rule_risk.max(RiskLevel::Critical);
            action = ActionTag::RestartPod;
            score += 50.0;
        }

        // Finalize: the score band sets risk and confidence, but a rule that
        // assigned CRITICAL (not-running, urgent memory forecast) is a floor
        // the band cannot lower.
        let score = score.min(100.0);
        let (band_risk, confidence) = if score >= 80.0 {
            (RiskLevel::Critical, 95)
        } else if score >= 60.0 {
            (RiskLevel::High, 90)
        } else if score >= 40.0 {
            (RiskLevel::Medium, 85)
        } else if score >= 20.0 {
            (RiskLevel::LowMedium, 80)
        } else {
            (RiskLevel::Low, 100)
        };

        Prediction {
            key: current.key.clone(),
            risk: band_risk.max(rule_risk),
            score,
            confidence,
            issues,
            action,
            time_to_failure,
            cpu_slope,
            mem_slope,
            trend,
        }
    }
}

/// Two-point secant slope in percent per hour, assuming the fixed tick.
fn slope_per_hour(samples: &[PodObservation], value: impl Fn(&PodObservation) -> f64) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let elapsed_hours = samples.len() as f64 * ASSUMED_TICK_SECS / 3600.0;
    let first = value(&samples[0]);
    let last = value(&samples[samples.len() - 1]);
    (last - first) / elapsed_hours
}

/// True when more than 70% of adjacent pairs show an increase in either
/// CPU or memory.
fn detect_degradation(samples: &[PodObservation]) -> bool {
    if samples.len() < MIN_TREND_SAMPLES {
        return false;
    }

    let pairs = (samples.len() - 1) as f64;
    let mut cpu_increases = 0usize;
    let mut mem_increases = 0usize;

    for pair in samples.windows(2) {
        if pair[1].cpu_percent > pair[0].cpu_percent {
            cpu_increases += 1;
        }
        if pair[1].mem_percent > pair[0].mem_percent {
            mem_increases += 1;
        }
    }

    cpu_increases as f64 > pairs * DEGRADATION_RATIO
        || mem_increases as f64 > pairs * DEGRADATION_RATIO
}
