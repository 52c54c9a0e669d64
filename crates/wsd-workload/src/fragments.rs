//! Reusable workload fragments
//!
//! Small pure builders for label sets, environment, scheduling constraints,
//! image references, and sidecar containers. None of them depend on each
//! other or on call order.

use std::collections::BTreeMap;

use wsd_common::{
    Error, InstallationConfig, VersionLookup, APP_NAME, LABEL_APP, LABEL_COMPONENT,
};

use crate::k8s::{
    Affinity, Container, ContainerPort, EnvVar, K8sSecurityContext, NodeAffinity, NodeSelector,
    NodeSelectorRequirement, NodeSelectorTerm, ResourceRequirements, Toleration,
};

// =============================================================================
// Images
// =============================================================================

/// Compose `{repository}/{component}:{version}` from the version lookup.
///
/// A trailing `/` on the repository is dropped.
pub fn resolve_image<V: VersionLookup + ?Sized>(
    component: &str,
    repository: &str,
    versions: &V,
) -> wsd_common::Result<String> {
    let repository = repository.trim_end_matches('/');
    if repository.is_empty() {
        return Err(Error::invalid_config(format!(
            "repository is empty while resolving image for '{}'",
            component
        )));
    }

    let version = versions.lookup_version(component)?;
    if version.is_empty() {
        return Err(Error::invalid_config(format!(
            "version of component '{}' is empty",
            component
        )));
    }

    Ok(format!("{}/{}:{}", repository, component, version))
}

// =============================================================================
// Labels
// =============================================================================

/// Label set shared by workload metadata, selector, and pod template
pub fn default_labels(component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_APP.to_string(), APP_NAME.to_string()),
        (LABEL_COMPONENT.to_string(), component.to_string()),
    ])
}

// =============================================================================
// Environment
// =============================================================================

/// Environment every component receives
pub fn default_env(config: &InstallationConfig) -> Vec<EnvVar> {
    vec![
        EnvVar::literal("GITPOD_DOMAIN", &config.domain),
        EnvVar::literal("LOG_LEVEL", config.observability.log_level.as_str()),
    ]
}

/// Jaeger client environment; empty when tracing is not configured
pub fn tracing_env(config: &InstallationConfig) -> Vec<EnvVar> {
    let Some(tracing) = &config.observability.tracing else {
        return Vec::new();
    };

    let mut env = Vec::with_capacity(3);
    if let Some(endpoint) = &tracing.endpoint {
        env.push(EnvVar::literal("JAEGER_ENDPOINT", endpoint));
    } else if let Some(agent_host) = &tracing.agent_host {
        env.push(EnvVar::literal("JAEGER_AGENT_HOST", agent_host));
    }
    env.push(EnvVar::literal("JAEGER_SAMPLER_TYPE", "const"));
    env.push(EnvVar::literal("JAEGER_SAMPLER_PARAM", "0"));
    env
}

/// Merge env sources; later sources override earlier ones by name.
///
/// A variable keeps the position where its name was first seen and takes the
/// last value assigned to it.
pub fn merge_env(sources: &[Vec<EnvVar>]) -> Vec<EnvVar> {
    let mut merged: Vec<EnvVar> = Vec::new();
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();

    for var in sources.iter().flatten() {
        match positions.get(&var.name) {
            Some(&idx) => merged[idx] = var.clone(),
            None => {
                positions.insert(var.name.clone(), merged.len());
                merged.push(var.clone());
            }
        }
    }

    merged
}

// =============================================================================
// Scheduling
// =============================================================================

/// Require nodes carrying any one of `labels`.
///
/// Each label becomes its own selector term so the terms are OR'ed.
pub fn node_affinity(labels: &[&str]) -> Affinity {
    let terms = labels
        .iter()
        .map(|label| NodeSelectorTerm {
            match_expressions: vec![NodeSelectorRequirement {
                key: (*label).to_string(),
                operator: "Exists".to_string(),
                values: Vec::new(),
            }],
        })
        .collect();

    Affinity {
        node_affinity: Some(NodeAffinity {
            required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                node_selector_terms: terms,
            }),
        }),
    }
}

/// Taints tolerated so a node agent is not evicted under node pressure
const NODE_PRESSURE_TAINTS: &[&str] = &[
    "node.kubernetes.io/disk-pressure",
    "node.kubernetes.io/memory-pressure",
    "node.kubernetes.io/out-of-disk",
];

/// Tolerations for disk and memory pressure taints
pub fn node_pressure_tolerations() -> Vec<Toleration> {
    NODE_PRESSURE_TAINTS
        .iter()
        .map(|key| Toleration {
            key: Some((*key).to_string()),
            operator: Some("Exists".to_string()),
            value: None,
            effect: Some("NoExecute".to_string()),
        })
        .collect()
}

// =============================================================================
// Sidecars
// =============================================================================

/// Pre-configured auxiliary containers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SidecarKind {
    /// Authenticating proxy in front of the metrics endpoint
    KubeRbacProxy,
}

const KUBE_RBAC_PROXY_IMAGE: &str = "quay.io/brancz/kube-rbac-proxy:v0.11.0";
const KUBE_RBAC_PROXY_PORT: u16 = 9500;
const NONROOT_UID: i64 = 65532;

/// Build a sidecar container from its fixed template
pub fn build_sidecar(kind: SidecarKind) -> Container {
    match kind {
        SidecarKind::KubeRbacProxy => Container {
            name: "kube-rbac-proxy".to_string(),
            image: KUBE_RBAC_PROXY_IMAGE.to_string(),
            args: Some(vec![
                "--v=10".to_string(),
                "--logtostderr".to_string(),
                format!("--insecure-listen-address=[$(IP)]:{}", KUBE_RBAC_PROXY_PORT),
                format!("--upstream=http://127.0.0.1:{}/", KUBE_RBAC_PROXY_PORT),
            ]),
            ports: vec![ContainerPort::named("metrics", KUBE_RBAC_PROXY_PORT)],
            env: vec![EnvVar::from_field("IP", "status.podIP")],
            resources: Some(ResourceRequirements::requests("1m", "30Mi")),
            security_context: Some(K8sSecurityContext {
                run_as_non_root: Some(true),
                run_as_user: Some(NONROOT_UID),
                run_as_group: Some(NONROOT_UID),
                ..Default::default()
            }),
            termination_message_policy: Some("FallbackToLogsOnError".to_string()),
            ..Default::default()
        },
    }
}
