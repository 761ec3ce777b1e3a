//! HTTP surface: liveness, aggregate status, audit log and Prometheus metrics

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use healer_lib::{ActionStatus, ActionTag, AuditLog, HealingAction};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const SERVICE_NAME: &str = "k8s-healer";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Audit entries considered "recent" by /status
const RECENT_WINDOW: usize = 10;

/// Recent failures above this flip system health to CRITICAL
const CRITICAL_FAILURES: usize = 5;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub audit: AuditLog,
}

impl AppState {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemHealth {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    total_actions: usize,
    recent_actions: Vec<HealingAction>,
    system_health: SystemHealth,
}

/// Derive system health from the recent audit window: failed actions and
/// network-escalated restarts are the distress signals.
pub fn system_health(recent: &[HealingAction]) -> SystemHealth {
    let distress = recent
        .iter()
        .filter(|a| {
            a.status == ActionStatus::Failed || a.action_type == ActionTag::RestartPodNetwork
        })
        .count();

    if distress > CRITICAL_FAILURES {
        SystemHealth::Critical
    } else if distress > 0 {
        SystemHealth::Warning
    } else {
        SystemHealth::Healthy
    }
}

fn cors_json<T: Serialize>(value: T) -> impl IntoResponse {
    ([(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(value))
}

async fn health() -> impl IntoResponse {
    cors_json(HealthResponse {
        status: "UP",
        timestamp: Utc::now(),
        service: SERVICE_NAME,
        version: VERSION,
    })
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let total_actions = state.audit.total().await;
    let recent_actions = state.audit.recent(RECENT_WINDOW).await;
    let system_health = system_health(&recent_actions);

    cors_json(StatusResponse {
        status: "ACTIVE",
        timestamp: Utc::now(),
        total_actions,
        recent_actions,
        system_health,
    })
}

async fn actions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let actions = state.audit.all().await;
    cors_json(serde_json::json!({
        "total_actions": actions.len(),
        "actions": actions,
    }))
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/actions", get(actions))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>K8s Healer Dashboard</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; background: #f5f5f5; }
        .container { max-width: 1200px; margin: 0 auto; }
        .header { background: #2196F3; color: white; padding: 20px; border-radius: 8px; text-align: center; }
        .card { background: white; margin: 20px 0; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .nav { margin: 20px 0; }
        .nav a { margin-right: 20px; padding: 10px 20px; background: #2196F3; color: white; text-decoration: none; border-radius: 4px; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>K8s Healer Dashboard</h1>
            <p>Autonomous Kubernetes infrastructure healing</p>
        </div>
        <div class="nav">
            <a href="/status">System Status</a>
            <a href="/actions">Healing Actions</a>
            <a href="/health">Health Check</a>
            <a href="/metrics">Metrics</a>
        </div>
        <div class="card">
            <h2>System Overview</h2>
            <p>The healer detects and fixes infrastructure issues that Kubernetes might miss:</p>
            <ul>
                <li>Stuck container detection</li>
                <li>Network connectivity issues</li>
                <li>Disk space management</li>
                <li>Restart pattern analysis</li>
                <li>Resource exhaustion forecasting</li>
            </ul>
        </div>
    </div>
</body>
</html>"#;
