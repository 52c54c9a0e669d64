//! Pod template compiler for the ws-daemon DaemonSet
//!
//! Wires the node volumes, the init sequence, the main container, and the
//! metrics sidecar into one pod template, then checks the cross-references
//! (mounts against volumes, probes against ports, unique names) before
//! handing it back.

use std::collections::BTreeMap;

use tracing::debug;
use wsd_common::RenderContext;

use crate::constants::{
    AFFINITY_LABEL_HEADLESS, AFFINITY_LABEL_WORKSPACES, COMPONENT, HEALTH_PATH, HEALTH_PORT,
    HEALTH_PORT_NAME, RPC_PORT,
};
use crate::error::CompilationError;
use crate::fragments::{
    build_sidecar, default_env, default_labels, merge_env, node_affinity,
    node_pressure_tolerations, resolve_image, tracing_env, SidecarKind,
};
use crate::init::InitStep;
use crate::k8s::{
    Affinity, Container, ContainerPort, HttpGetAction, K8sSecurityContext, ProbeSpec,
    ResourceRequirements, Toleration, Volume,
};
use crate::volumes::{check_mounts, check_unique, main_mounts, node_volumes};

/// Compiled pod template: everything needed to build the DaemonSet's
/// PodTemplateSpec.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledPodTemplate {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub init_containers: Vec<Container>,
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
    pub affinity: Affinity,
    pub tolerations: Vec<Toleration>,
}

/// Assembles and validates the ws-daemon pod template.
pub struct PodTemplateCompiler;

impl PodTemplateCompiler {
    /// Compile the pod template around an already-built init sequence.
    ///
    /// Step-supplied volumes are appended after the node volumes in step
    /// order; step annotations are merged into the pod annotations.
    pub fn compile(
        ctx: &RenderContext,
        init_steps: Vec<InitStep>,
    ) -> Result<CompiledPodTemplate, CompilationError> {
        let image = resolve_image(COMPONENT, ctx.repository(), ctx)?;
        let containers = vec![
            Self::main_container(ctx, image),
            build_sidecar(SidecarKind::KubeRbacProxy),
        ];

        let mut volumes = node_volumes();
        let mut annotations = BTreeMap::new();
        let mut init_containers = Vec::with_capacity(init_steps.len());
        for step in init_steps {
            volumes.extend(step.volumes);
            annotations.extend(step.pod_annotations);
            init_containers.push(step.container);
        }

        let template = CompiledPodTemplate {
            labels: default_labels(COMPONENT),
            annotations,
            init_containers,
            containers,
            volumes,
            affinity: node_affinity(&[AFFINITY_LABEL_WORKSPACES, AFFINITY_LABEL_HEADLESS]),
            tolerations: node_pressure_tolerations(),
        };
        template.validate()?;

        debug!(
            init_containers = template.init_containers.len(),
            containers = template.containers.len(),
            volumes = template.volumes.len(),
            "compiled pod template"
        );
        Ok(template)
    }

    fn main_container(ctx: &RenderContext, image: String) -> Container {
        Container {
            name: COMPONENT.to_string(),
            image,
            image_pull_policy: Some("Always".to_string()),
            args: Some(
                ["run", "-v", "--config", "/config/config.json"]
                    .map(String::from)
                    .to_vec(),
            ),
            ports: vec![
                ContainerPort::named("rpc", RPC_PORT).with_host_port(),
                ContainerPort::named(HEALTH_PORT_NAME, HEALTH_PORT),
            ],
            env: merge_env(&[default_env(&ctx.config), tracing_env(&ctx.config)]),
            resources: Some(ResourceRequirements::requests("1m", "1Mi")),
            volume_mounts: main_mounts(),
            liveness_probe: Some(ProbeSpec {
                failure_threshold: Some(10),
                ..health_probe()
            }),
            readiness_probe: Some(health_probe()),
            security_context: Some(K8sSecurityContext::privileged()),
            ..Default::default()
        }
    }
}

fn health_probe() -> ProbeSpec {
    ProbeSpec {
        http_get: Some(HttpGetAction {
            path: HEALTH_PATH.to_string(),
            port: HEALTH_PORT,
            scheme: None,
        }),
        initial_delay_seconds: Some(5),
        period_seconds: Some(10),
        ..Default::default()
    }
}

impl CompiledPodTemplate {
    /// Init and regular containers, init containers first
    pub fn all_containers(&self) -> impl Iterator<Item = &Container> {
        self.init_containers.iter().chain(self.containers.iter())
    }

    /// Check names, mounts, and probes.
    ///
    /// Every probe must target the container's `health` port; a probe on any
    /// other port, declared or not, is rejected.
    pub fn validate(&self) -> Result<(), CompilationError> {
        check_unique("volume", self.volumes.iter().map(|v| v.name.as_str()))?;
        check_unique("container", self.all_containers().map(|c| c.name.as_str()))?;
        check_mounts(self.all_containers(), &self.volumes)?;

        for container in &self.containers {
            for (probe, port) in container.probe_ports() {
                if container.port_named(HEALTH_PORT_NAME) != Some(port) {
                    return Err(CompilationError::probe_port_mismatch(
                        &container.name,
                        probe,
                        port,
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::InitSequenceBuilder;
    use crate::k8s::VolumeMount;
    use wsd_common::{FsShiftMethod, InstallationConfig, VersionManifest};

    fn context(method: FsShiftMethod) -> RenderContext {
        let mut config = InstallationConfig {
            domain: "gitpod.example.com".to_string(),
            repository: "registry.io/build".to_string(),
            ..Default::default()
        };
        config.workspace.runtime.fs_shift_method = method;
        RenderContext::new(
            config,
            "gitpod",
            VersionManifest::new()
                .with_component("ws-daemon", "v1")
                .with_component("seccomp-profile-installer", "v2")
                .with_component("shiftfs-module-loader", "v3"),
        )
    }

    fn compile(method: FsShiftMethod) -> CompiledPodTemplate {
        let ctx = context(method);
        let steps = InitSequenceBuilder::new(&ctx).build().expect("init steps");
        PodTemplateCompiler::compile(&ctx, steps).expect("pod template")
    }

    fn volume_names(template: &CompiledPodTemplate) -> Vec<&str> {
        template.volumes.iter().map(|v| v.name.as_str()).collect()
    }

    // =========================================================================
    // Story: the fuse baseline
    // =========================================================================

    #[test]
    fn main_container_comes_first_then_sidecar() {
        let template = compile(FsShiftMethod::Fuse);
        let names: Vec<_> = template.containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ws-daemon", "kube-rbac-proxy"]);
        assert_eq!(template.containers[0].image, "registry.io/build/ws-daemon:v1");
    }

    #[test]
    fn step_volumes_follow_node_volumes() {
        let template = compile(FsShiftMethod::Fuse);
        let names = volume_names(&template);
        assert_eq!(names.first(), Some(&"hostfs"));
        assert_eq!(names.last(), Some(&"hostseccomp"));
        assert!(!names.contains(&"node-linux-src"));
        assert!(template.annotations.is_empty());
    }

    #[test]
    fn main_container_is_privileged_with_host_rpc_port() {
        let template = compile(FsShiftMethod::Fuse);
        let main = &template.containers[0];
        assert!(main
            .security_context
            .as_ref()
            .is_some_and(K8sSecurityContext::is_privileged));
        let rpc = main
            .ports
            .iter()
            .find(|p| p.name.as_deref() == Some("rpc"))
            .expect("rpc port");
        assert_eq!(rpc.host_port, Some(8080));
        assert_eq!(main.image_pull_policy.as_deref(), Some("Always"));
    }

    #[test]
    fn liveness_tolerates_more_failures_than_readiness() {
        let template = compile(FsShiftMethod::Fuse);
        let main = &template.containers[0];
        let liveness = main.liveness_probe.as_ref().expect("liveness");
        let readiness = main.readiness_probe.as_ref().expect("readiness");
        assert_eq!(liveness.failure_threshold, Some(10));
        assert_eq!(readiness.failure_threshold, None);
        assert_eq!(liveness.initial_delay_seconds, Some(5));
        assert_eq!(readiness.period_seconds, Some(10));
    }

    // =========================================================================
    // Story: shiftfs brings its own volume and annotation
    // =========================================================================

    #[test]
    fn shiftfs_adds_kernel_source_volume_last() {
        let template = compile(FsShiftMethod::ShiftFs);
        let names = volume_names(&template);
        assert_eq!(&names[names.len() - 2..], &["hostseccomp", "node-linux-src"]);
        assert_eq!(template.annotations.len(), 1);
    }

    // =========================================================================
    // Story: broken cross-references are caught before emission
    // =========================================================================

    #[test]
    fn dangling_mount_is_rejected() {
        let mut template = compile(FsShiftMethod::Fuse);
        template.containers[0]
            .volume_mounts
            .push(VolumeMount::new("missing", "/mnt/missing"));
        assert!(matches!(
            template.validate(),
            Err(CompilationError::DanglingMount { ref volume, .. }) if volume == "missing"
        ));
    }

    #[test]
    fn duplicate_volume_is_rejected() {
        let mut template = compile(FsShiftMethod::Fuse);
        let first = template.volumes[0].clone();
        template.volumes.push(first);
        assert!(matches!(
            template.validate(),
            Err(CompilationError::DuplicateName { kind: "volume", .. })
        ));
    }

    #[test]
    fn init_and_main_container_names_share_one_namespace() {
        let mut template = compile(FsShiftMethod::Fuse);
        template.init_containers[0].name = "ws-daemon".to_string();
        assert!(matches!(
            template.validate(),
            Err(CompilationError::DuplicateName { kind: "container", ref name }) if name == "ws-daemon"
        ));
    }

    #[test]
    fn probe_on_rpc_port_is_rejected() {
        let mut template = compile(FsShiftMethod::Fuse);
        if let Some(http_get) = template.containers[0]
            .liveness_probe
            .as_mut()
            .and_then(|p| p.http_get.as_mut())
        {
            http_get.port = RPC_PORT;
        }
        assert!(matches!(
            template.validate(),
            Err(CompilationError::ProbePortMismatch { probe: "liveness", port: 8080, .. })
        ));
    }

    #[test]
    fn probe_on_undeclared_port_is_rejected() {
        let mut template = compile(FsShiftMethod::Fuse);
        template.containers[0].ports.retain(|p| p.container_port != HEALTH_PORT);
        assert!(matches!(
            template.validate(),
            Err(CompilationError::ProbePortMismatch { port: 9999, .. })
        ));
    }
}
