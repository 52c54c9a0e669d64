//! Properties every ws-daemon render must hold, checked across the
//! configurations the renderer supports.

use std::collections::BTreeMap;

use wsd_common::{
    Error, FsShiftMethod, InstallationConfig, LogLevel, RenderContext, TracingConfig,
    VersionManifest,
};
use wsd_workload::fragments::merge_env;
use wsd_workload::k8s::EnvVar;
use wsd_workload::{render, render_daemonset, CompilationError, DaemonSet};

// =============================================================================
// Fixtures
// =============================================================================

fn versions() -> VersionManifest {
    VersionManifest::new()
        .with_component("ws-daemon", "commit-1")
        .with_component("seccomp-profile-installer", "commit-2")
        .with_component("shiftfs-module-loader", "commit-3")
}

fn config(method: FsShiftMethod) -> InstallationConfig {
    let mut config = InstallationConfig {
        domain: "gitpod.example.com".to_string(),
        repository: "eu.gcr.io/gitpod-core-dev/build".to_string(),
        ..Default::default()
    };
    config.workspace.runtime.fs_shift_method = method;
    config
}

fn context(method: FsShiftMethod) -> RenderContext {
    RenderContext::new(config(method), "gitpod", versions())
}

/// Every configuration shape the renderer accepts
fn all_contexts() -> Vec<RenderContext> {
    let mut contexts = Vec::new();
    for method in [FsShiftMethod::Fuse, FsShiftMethod::ShiftFs] {
        contexts.push(context(method.clone()));

        let mut traced = config(method);
        traced.observability.log_level = LogLevel::Debug;
        traced.observability.tracing = Some(TracingConfig {
            endpoint: Some("http://jaeger-collector:14268/api/traces".to_string()),
            agent_host: None,
        });
        contexts.push(RenderContext::new(traced, "workspaces", versions()));
    }
    contexts
}

fn init_names(ds: &DaemonSet) -> Vec<String> {
    ds.pod_spec()
        .init_containers
        .iter()
        .map(|c| c.name.clone())
        .collect()
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn identical_contexts_render_byte_identical_output() {
    for ctx in all_contexts() {
        let first = serde_json::to_string(&render(&ctx).expect("first render")).expect("json");
        let second = serde_json::to_string(&render(&ctx).expect("second render")).expect("json");
        assert_eq!(first, second);
    }
}

// =============================================================================
// Referential integrity and uniqueness
// =============================================================================

#[test]
fn every_mount_resolves_to_exactly_one_volume() {
    for ctx in all_contexts() {
        let ds = render_daemonset(&ctx).expect("should render");
        let volumes = &ds.pod_spec().volumes;
        for container in ds.all_containers() {
            for mount in &container.volume_mounts {
                let matches = volumes.iter().filter(|v| v.name == mount.name).count();
                assert_eq!(
                    matches, 1,
                    "mount '{}' of '{}' resolves to {} volumes",
                    mount.name, container.name, matches
                );
            }
        }
    }
}

#[test]
fn container_names_are_unique_across_init_and_main() {
    for ctx in all_contexts() {
        let ds = render_daemonset(&ctx).expect("should render");
        let mut seen = std::collections::BTreeSet::new();
        for container in ds.all_containers() {
            assert!(seen.insert(container.name.clone()), "duplicate {}", container.name);
        }
    }
}

// =============================================================================
// Labels
// =============================================================================

#[test]
fn selector_labels_equal_template_labels() {
    for ctx in all_contexts() {
        let ds = render_daemonset(&ctx).expect("should render");
        assert_eq!(ds.spec.selector.match_labels, ds.spec.template.metadata.labels);
        assert_eq!(
            ds.spec.selector.match_labels,
            BTreeMap::from([
                ("app".to_string(), "gitpod".to_string()),
                ("component".to_string(), "ws-daemon".to_string()),
            ])
        );
    }
}

// =============================================================================
// Conditional inclusion
// =============================================================================

#[test]
fn shiftfs_adds_exactly_the_module_loader() {
    let fuse = render_daemonset(&context(FsShiftMethod::Fuse)).expect("fuse render");
    let shiftfs = render_daemonset(&context(FsShiftMethod::ShiftFs)).expect("shiftfs render");

    let fuse_steps = init_names(&fuse);
    let shiftfs_steps = init_names(&shiftfs);
    assert_eq!(shiftfs_steps.len(), fuse_steps.len() + 1);
    assert_eq!(&shiftfs_steps[..fuse_steps.len()], fuse_steps.as_slice());
    assert_eq!(shiftfs_steps.last().map(String::as_str), Some("shiftfs-module-loader"));

    // unchanged steps render identically
    assert_eq!(
        &shiftfs.pod_spec().init_containers[..fuse_steps.len()],
        fuse.pod_spec().init_containers.as_slice()
    );
}

#[test]
fn kernel_source_volume_exists_only_with_shiftfs() {
    let has_linux_src = |ds: &DaemonSet| {
        ds.pod_spec()
            .volumes
            .iter()
            .any(|v| v.name == "node-linux-src")
    };
    let fuse = render_daemonset(&context(FsShiftMethod::Fuse)).expect("fuse render");
    let shiftfs = render_daemonset(&context(FsShiftMethod::ShiftFs)).expect("shiftfs render");
    assert!(!has_linux_src(&fuse));
    assert!(has_linux_src(&shiftfs));
    assert!(fuse.spec.template.metadata.annotations.is_empty());
    assert!(shiftfs
        .spec
        .template
        .metadata
        .annotations
        .contains_key("seccomp.security.alpha.kubernetes.io/shiftfs-module-loader"));
}

#[test]
fn unknown_fs_shift_method_is_unsupported() {
    let ctx = context(FsShiftMethod::Unrecognized("zfs".to_string()));
    let err = render(&ctx).unwrap_err();
    assert!(matches!(
        err,
        CompilationError::Context(Error::UnsupportedConfiguration { ref field, ref value })
            if field == "workspace.runtime.fsShiftMethod" && value == "zfs"
    ));
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn env_merge_overrides_in_place() {
    let base = vec![EnvVar::literal("A", "1"), EnvVar::literal("B", "2")];
    let overlay = vec![EnvVar::literal("B", "3"), EnvVar::literal("C", "4")];
    assert_eq!(
        merge_env(&[base, overlay]),
        vec![
            EnvVar::literal("A", "1"),
            EnvVar::literal("B", "3"),
            EnvVar::literal("C", "4"),
        ]
    );
}

#[test]
fn main_container_env_includes_tracing_when_configured() {
    let traced = all_contexts()
        .into_iter()
        .find(|ctx| ctx.config.observability.tracing.is_some())
        .expect("traced context");
    let ds = render_daemonset(&traced).expect("should render");
    let names: Vec<_> = ds.pod_spec().containers[0]
        .env
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "GITPOD_DOMAIN",
            "LOG_LEVEL",
            "JAEGER_ENDPOINT",
            "JAEGER_SAMPLER_TYPE",
            "JAEGER_SAMPLER_PARAM"
        ]
    );
}

// =============================================================================
// Missing versions
// =============================================================================

#[test]
fn missing_version_produces_no_output() {
    for component in ["ws-daemon", "seccomp-profile-installer", "shiftfs-module-loader"] {
        let mut versions = versions();
        versions.components.remove(component);
        let ctx = RenderContext::new(config(FsShiftMethod::ShiftFs), "gitpod", versions);

        let err = render(&ctx).unwrap_err();
        assert!(
            matches!(
                err,
                CompilationError::Context(Error::MissingVersion { component: ref c }) if c == component
            ),
            "unexpected error for {}: {}",
            component,
            err
        );
    }
}

// =============================================================================
// Probes
// =============================================================================

#[test]
fn probe_ports_match_the_declared_health_port() {
    for ctx in all_contexts() {
        let ds = render_daemonset(&ctx).expect("should render");
        let main = &ds.pod_spec().containers[0];
        let health = main
            .ports
            .iter()
            .find(|p| p.name.as_deref() == Some("health"))
            .expect("health port");
        assert_eq!(health.container_port, 9999);

        let probe_ports: Vec<_> = main.probe_ports().map(|(_, port)| port).collect();
        assert_eq!(probe_ports, vec![health.container_port, health.container_port]);
    }
}

// =============================================================================
// Emission
// =============================================================================

#[test]
fn emitted_object_parses_as_a_kubernetes_daemonset() {
    for ctx in all_contexts() {
        let objects = render(&ctx).expect("should render");
        assert_eq!(objects.len(), 1);

        let value = serde_json::to_value(&objects[0]).expect("serialize");
        let ds: k8s_openapi::api::apps::v1::DaemonSet =
            serde_json::from_value(value).expect("valid apps/v1 DaemonSet");

        assert_eq!(ds.metadata.name.as_deref(), Some("ws-daemon"));
        assert_eq!(ds.metadata.namespace.as_deref(), Some(ctx.namespace.as_str()));
        let pod = ds.spec.and_then(|s| s.template.spec).expect("pod spec");
        assert_eq!(pod.host_pid, Some(true));
        assert_eq!(pod.containers.len(), 2);
    }
}
