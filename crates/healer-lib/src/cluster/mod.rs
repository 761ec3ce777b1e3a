//! Cluster gateway: the seam between the healer core and the Kubernetes API
//!
//! Everything the control loop needs from the cluster goes through the
//! [`ClusterGateway`] trait so the core stays testable with a mock. The real
//! implementation wraps a `kube::Client`; usage metrics come from the
//! `metrics.k8s.io` API via dynamic objects since kube ships no typed client
//! for it.

pub mod quantity;

use crate::models::{
    ContainerState, EventRecord, ExecOutput, PodKey, PodPhase, PodSnapshot, ResourceUsage,
};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Node, Pod};
use kube::{
    api::{Api, AttachParams, DeleteParams, ListParams, Patch, PatchParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client,
};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub use async_trait::async_trait;

/// Node state with capacity, as read from the cluster
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub name: String,
    pub capacity: ResourceUsage,
}

/// Read and write operations the healer performs against the cluster
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// List all pods across namespaces.
    async fn list_pods(&self) -> Result<Vec<PodSnapshot>>;

    /// Current usage per pod from the metrics API. Best-effort; callers
    /// degrade gracefully when this fails.
    async fn list_pod_usage(&self) -> Result<HashMap<PodKey, ResourceUsage>>;

    /// List all nodes with their capacity.
    async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>>;

    /// Current usage per node from the metrics API.
    async fn list_node_usage(&self) -> Result<HashMap<String, ResourceUsage>>;

    /// Events attached to a named object in a namespace.
    async fn list_events(&self, namespace: &str, object_name: &str) -> Result<Vec<EventRecord>>;

    /// Deployment names in a namespace.
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<String>>;

    /// Delete a pod; the owning workload recreates it.
    async fn delete_pod(&self, key: &PodKey) -> Result<()>;

    /// Read-modify-write on deployment replicas. Returns the new count.
    async fn scale_deployment(&self, namespace: &str, name: &str, delta: i32) -> Result<i32>;

    /// Run a shell pipeline inside a container, capturing combined output.
    /// An error here is itself a diagnostic signal for the caller.
    async fn exec(&self, key: &PodKey, container: &str, command: &str) -> Result<ExecOutput>;
}

/// A tick issues many gateway calls sequentially (list joins, a probe
/// battery per container, cleanup pipelines), so each call gets only a
/// slice of the tick period.
const CALLS_PER_TICK_BUDGET: u32 = 10;

/// Floor for the derived per-call deadline
const MIN_CALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Gateway backed by a live `kube::Client`
pub struct KubeGateway {
    client: Client,
    call_timeout: Duration,
}

impl KubeGateway {
    /// Wrap a client with an explicit per-call deadline.
    pub fn new(client: Client, call_timeout: Duration) -> Self {
        Self {
            client,
            call_timeout,
        }
    }

    /// Wrap a client with a per-call deadline derived from the tick period,
    /// keeping a full tick's worth of sequential calls inside one period.
    pub fn for_tick_interval(client: Client, tick_interval: Duration) -> Self {
        let call_timeout = (tick_interval / CALLS_PER_TICK_BUDGET).max(MIN_CALL_TIMEOUT);
        Self::new(client, call_timeout)
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        timeout(self.call_timeout, fut)
            .await
            .map_err(|_| anyhow!("{what} timed out after {:?}", self.call_timeout))?
    }

    fn pod_metrics_api(&self) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let ar = ApiResource::from_gvk_with_plural(&gvk, "pods");
        Api::all_with(self.client.clone(), &ar)
    }

    fn node_metrics_api(&self) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "NodeMetrics");
        let ar = ApiResource::from_gvk_with_plural(&gvk, "nodes");
        Api::all_with(self.client.clone(), &ar)
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_pods(&self) -> Result<Vec<PodSnapshot>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        self.bounded("pod list", async move {
            let pods = api
                .list(&ListParams::default())
                .await
                .context("failed to list pods")?;
            Ok(pods.items.into_iter().filter_map(snapshot_from).collect())
        })
        .await
    }

    async fn list_pod_usage(&self) -> Result<HashMap<PodKey, ResourceUsage>> {
        let api = self.pod_metrics_api();
        self.bounded("pod metrics list", async move {
            let items = api
                .list(&ListParams::default())
                .await
                .context("metrics API not available")?;

            let mut usage_map = HashMap::new();
            for item in items.items {
                let namespace = match item.metadata.namespace.clone() {
                    Some(ns) => ns,
                    None => continue,
                };
                let name = match item.metadata.name.clone() {
                    Some(n) => n,
                    None => continue,
                };

                let mut usage = ResourceUsage::default();
                if let Some(containers) = item.data.get("containers").and_then(|c| c.as_array()) {
                    for container in containers {
                        if let Some(cpu) =
                            container.pointer("/usage/cpu").and_then(|v| v.as_str())
                        {
                            usage.cpu_millis += quantity::cpu_millis(cpu);
                        }
                        if let Some(mem) =
                            container.pointer("/usage/memory").and_then(|v| v.as_str())
                        {
                            usage.memory_bytes += quantity::memory_bytes(mem);
                        }
                    }
                }
                usage_map.insert(PodKey::new(namespace, name), usage);
            }
            Ok(usage_map)
        })
        .await
    }

    async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>> {
        let api: Api<Node> = Api::all(self.client.clone());
        self.bounded("node list", async move {
            let nodes = api
                .list(&ListParams::default())
                .await
                .context("failed to list nodes")?;

            let mut snapshots = Vec::new();
            for node in nodes.items {
                let name = match node.metadata.name {
                    Some(n) => n,
                    None => continue,
                };
                let mut capacity = ResourceUsage::default();
                if let Some(cap) = node.status.and_then(|s| s.capacity) {
                    if let Some(cpu) = cap.get("cpu") {
                        capacity.cpu_millis = quantity::cpu_millis(&cpu.0);
                    }
                    if let Some(mem) = cap.get("memory") {
                        capacity.memory_bytes = quantity::memory_bytes(&mem.0);
                    }
                }
                snapshots.push(NodeSnapshot { name, capacity });
            }
            Ok(snapshots)
        })
        .await
    }

    async fn list_node_usage(&self) -> Result<HashMap<String, ResourceUsage>> {
        let api = self.node_metrics_api();
        self.bounded("node metrics list", async move {
            let items = api
                .list(&ListParams::default())
                .await
                .context("node metrics not available")?;

            let mut usage_map = HashMap::new();
            for item in items.items {
                let name = match item.metadata.name.clone() {
                    Some(n) => n,
                    None => continue,
                };
                let cpu = item
                    .data
                    .pointer("/usage/cpu")
                    .and_then(|v| v.as_str())
                    .map(quantity::cpu_millis)
                    .unwrap_or(0.0);
                let memory = item
                    .data
                    .pointer("/usage/memory")
                    .and_then(|v| v.as_str())
                    .map(quantity::memory_bytes)
                    .unwrap_or(0.0);
                usage_map.insert(
                    name,
                    ResourceUsage {
                        cpu_millis: cpu,
                        memory_bytes: memory,
                    },
                );
            }
            Ok(usage_map)
        })
        .await
    }

    async fn list_events(&self, namespace: &str, object_name: &str) -> Result<Vec<EventRecord>> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let selector = format!("involvedObject.name={}", object_name);
        self.bounded("event list", async move {
            let events = api
                .list(&ListParams::default().fields(&selector))
                .await
                .context("failed to list events")?;
            Ok(events
                .items
                .into_iter()
                .map(|e| EventRecord {
                    reason: e.reason.unwrap_or_default(),
                    message: e.message.unwrap_or_default(),
                    timestamp: e.last_timestamp.map(|t| t.0),
                })
                .collect())
        })
        .await
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<String>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        self.bounded("deployment list", async move {
            let deployments = api
                .list(&ListParams::default())
                .await
                .context("failed to list deployments")?;
            Ok(deployments
                .items
                .into_iter()
                .filter_map(|d| d.metadata.name)
                .collect())
        })
        .await
    }

    async fn delete_pod(&self, key: &PodKey) -> Result<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &key.namespace);
        let name = key.name.clone();
        self.bounded("pod delete", async move {
            api.delete(&name, &DeleteParams::default())
                .await
                .context("failed to delete pod")?;
            Ok(())
        })
        .await
    }

    async fn scale_deployment(&self, namespace: &str, name: &str, delta: i32) -> Result<i32> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let name = name.to_string();
        self.bounded("deployment scale", async move {
            let deployment = api.get(&name).await.context("failed to read deployment")?;
            let current = deployment
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or(1);
            let target = current + delta;

            let patch = serde_json::json!({"spec": {"replicas": target}});
            api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .context("failed to patch deployment replicas")?;

            debug!(deployment = %name, from = current, to = target, "scaled deployment");
            Ok(target)
        })
        .await
    }

    async fn exec(&self, key: &PodKey, container: &str, command: &str) -> Result<ExecOutput> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &key.namespace);
        let pod_name = key.name.clone();
        let ap = AttachParams::default()
            .container(container)
            .stdout(true)
            .stderr(true);
        let argv = vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()];

        self.bounded("pod exec", async move {
            let mut attached = api
                .exec(&pod_name, argv, &ap)
                .await
                .context("exec request failed")?;

            let stdout_reader = attached.stdout();
            let stderr_reader = attached.stderr();
            let status = attached.take_status();

            let stdout = match stdout_reader {
                Some(reader) => read_stream(reader).await,
                None => String::new(),
            };
            let stderr = match stderr_reader {
                Some(reader) => read_stream(reader).await,
                None => String::new(),
            };

            if let Some(status) = status {
                if let Some(status) = status.await {
                    if status.status.as_deref() == Some("Failure") {
                        return Err(anyhow!(
                            "exec failed: {}",
                            status.message.unwrap_or_else(|| "unknown error".into())
                        ));
                    }
                }
            }

            attached.join().await.context("exec stream closed abnormally")?;
            Ok(ExecOutput { stdout, stderr })
        })
        .await
    }
}

/// Drain an exec output stream into a string.
async fn read_stream(reader: impl tokio::io::AsyncRead + Unpin) -> String {
    let mut stream = tokio_util::io::ReaderStream::new(reader);
    let mut out = String::new();
    while let Some(Ok(chunk)) = stream.next().await {
        out.push_str(&String::from_utf8_lossy(&chunk));
    }
    out
}

/// Flatten a typed pod object into the healer's snapshot shape.
fn snapshot_from(pod: Pod) -> Option<PodSnapshot> {
    let namespace = pod.metadata.namespace?;
    let name = pod.metadata.name?;
    let created_at = pod
        .metadata
        .creation_timestamp
        .map(|t| t.0)
        .unwrap_or_else(Utc::now);

    let node = pod
        .spec
        .as_ref()
        .and_then(|s| s.node_name.clone())
        .unwrap_or_default();

    let status = pod.status.unwrap_or_default();
    let phase = status
        .phase
        .as_deref()
        .map(PodPhase::parse)
        .unwrap_or(PodPhase::Unknown);

    let containers = status
        .container_statuses
        .unwrap_or_default()
        .into_iter()
        .map(|cs| {
            let terminated = cs.last_state.and_then(|s| s.terminated);
            ContainerState {
                name: cs.name,
                restart_count: cs.restart_count,
                last_exit_code: terminated.as_ref().map(|t| t.exit_code),
                last_termination_reason: terminated.and_then(|t| t.reason),
            }
        })
        .collect();

    Some(PodSnapshot {
        key: PodKey::new(namespace, name),
        node,
        phase,
        containers,
        created_at,
    })
}
