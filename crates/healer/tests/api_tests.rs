//! Integration tests for the healer API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use healer_lib::{ActionStatus, ActionTag, AuditLog, HealingAction, PodKey};
use std::sync::Arc;
use tower::ServiceExt;

#[path = "../src/api.rs"]
mod api;

use api::{system_health, AppState, SystemHealth};

fn action(name: &str, tag: ActionTag, status: ActionStatus) -> HealingAction {
    HealingAction {
        action_type: tag,
        key: PodKey::new("default", name),
        container: None,
        description: "test action".into(),
        status,
        timestamp: Utc::now(),
        result: String::new(),
    }
}

async fn setup(actions: Vec<HealingAction>) -> axum::Router {
    let audit = AuditLog::new();
    for a in actions {
        audit.push(a).await;
    }
    api::create_router(Arc::new(AppState::new(audit)))
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let cors = response
        .headers()
        .get("access-control-allow-origin")
        .map(|v| v.to_str().unwrap().to_string());
    assert_eq!(cors.as_deref(), Some("*"), "JSON responses must allow CORS");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_reports_up() {
    let app = setup(vec![]).await;
    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
    assert_eq!(body["service"], "k8s-healer");
    assert!(body["version"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn status_on_empty_log_is_healthy() {
    let app = setup(vec![]).await;
    let (status, body) = get_json(app, "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVE");
    assert_eq!(body["total_actions"], 0);
    assert_eq!(body["system_health"], "HEALTHY");
    assert!(body["recent_actions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn status_caps_recent_actions_at_ten() {
    let actions = (0..25)
        .map(|i| {
            action(
                &format!("pod-{}", i),
                ActionTag::Monitor,
                ActionStatus::Completed,
            )
        })
        .collect();
    let app = setup(actions).await;
    let (_, body) = get_json(app, "/status").await;

    assert_eq!(body["total_actions"], 25);
    let recent = body["recent_actions"].as_array().unwrap();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[9]["key"]["name"], "pod-24");
}

#[tokio::test]
async fn one_recent_failure_means_warning() {
    let mut actions: Vec<HealingAction> = (0..5)
        .map(|i| {
            action(
                &format!("pod-{}", i),
                ActionTag::CleanupTmp,
                ActionStatus::Completed,
            )
        })
        .collect();
    actions.push(action("pod-x", ActionTag::RestartPod, ActionStatus::Failed));

    let app = setup(actions).await;
    let (_, body) = get_json(app, "/status").await;
    assert_eq!(body["system_health"], "WARNING");
}

#[tokio::test]
async fn many_recent_failures_mean_critical() {
    let mut actions: Vec<HealingAction> = (0..4)
        .map(|i| {
            action(
                &format!("pod-{}", i),
                ActionTag::Monitor,
                ActionStatus::Completed,
            )
        })
        .collect();
    for i in 0..6 {
        actions.push(action(
            &format!("net-{}", i),
            ActionTag::RestartPodNetwork,
            ActionStatus::Completed,
        ));
    }

    let app = setup(actions).await;
    let (_, body) = get_json(app, "/status").await;
    assert_eq!(body["system_health"], "CRITICAL");
}

#[tokio::test]
async fn old_failures_fall_out_of_the_window() {
    let mut actions: Vec<HealingAction> = (0..6)
        .map(|i| {
            action(
                &format!("old-{}", i),
                ActionTag::RestartPod,
                ActionStatus::Failed,
            )
        })
        .collect();
    for i in 0..10 {
        actions.push(action(
            &format!("new-{}", i),
            ActionTag::CleanupTmp,
            ActionStatus::Completed,
        ));
    }

    let app = setup(actions).await;
    let (_, body) = get_json(app, "/status").await;
    assert_eq!(body["system_health"], "HEALTHY");
}

#[tokio::test]
async fn actions_returns_the_full_log() {
    let actions = vec![
        action("a", ActionTag::CleanupTmp, ActionStatus::Completed),
        action("b", ActionTag::RestartPod, ActionStatus::DryRun),
    ];
    let app = setup(actions).await;
    let (status, body) = get_json(app, "/actions").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_actions"], 2);
    let listed = body["actions"].as_array().unwrap();
    assert_eq!(listed[0]["action_type"], "CLEANUP_TMP");
    assert_eq!(listed[1]["status"], "DRY_RUN");
}

#[tokio::test]
async fn dashboard_serves_html() {
    let app = setup(vec![]).await;
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("<html>"));
    assert!(html.contains("Healer"));
}

#[tokio::test]
async fn system_health_derivation_counts_both_signals() {
    let mut recent = vec![
        action("a", ActionTag::CleanupTmp, ActionStatus::Completed),
        action("b", ActionTag::RestartPod, ActionStatus::Failed),
        action("c", ActionTag::RestartPodNetwork, ActionStatus::Completed),
    ];
    assert_eq!(system_health(&recent), SystemHealth::Warning);

    for i in 0..4 {
        recent.push(action(
            &format!("d-{}", i),
            ActionTag::RestartPod,
            ActionStatus::Failed,
        ));
    }
    // six distress entries now
    assert_eq!(system_health(&recent), SystemHealth::Critical);

    assert_eq!(
        system_health(&[action("e", ActionTag::Monitor, ActionStatus::Completed)]),
        SystemHealth::Healthy
    );
}
