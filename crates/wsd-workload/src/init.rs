//! Init-sequence builder
//!
//! The init sequence is a fixed baseline of unconditional steps followed by
//! optional steps, each gated by a pure predicate over the render context.
//! Both lists are evaluated in declaration order, so identical contexts always
//! yield identical sequences.

use std::collections::BTreeMap;

use tracing::debug;
use wsd_common::{Error, FsShiftMethod, RenderContext, VersionLookup};

use crate::constants::{
    COMPONENT, SECCOMP_ANNOTATION_PREFIX, SECCOMP_PROFILE_INSTALLER, SHIFTFS_MODULE_LOADER,
    VOLUME_HOST_SECCOMP, VOLUME_NODE_LINUX_SRC,
};
use crate::error::CompilationError;
use crate::fragments::resolve_image;
use crate::k8s::{Container, HostPathType, K8sSecurityContext, ProcMountType, Volume, VolumeMount};

/// Configuration field holding the filesystem-isolation method
const FS_SHIFT_METHOD_FIELD: &str = "workspace.runtime.fsShiftMethod";

/// A container run to completion before the main containers start
#[derive(Clone, Debug, PartialEq)]
pub struct InitStep {
    /// The init container
    pub container: Container,
    /// Volumes only this step mounts; added to the pod by the assembler
    pub volumes: Vec<Volume>,
    /// Pod annotations this step needs
    pub pod_annotations: BTreeMap<String, String>,
    /// Whether the step touches the host and therefore must run privileged
    pub requires_host_privilege: bool,
}

impl InitStep {
    fn new(container: Container) -> Self {
        Self {
            container,
            volumes: Vec::new(),
            pod_annotations: BTreeMap::new(),
            requires_host_privilege: true,
        }
    }

    fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }

    fn with_pod_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pod_annotations.insert(key.into(), value.into());
        self
    }

    /// Init container name
    pub fn name(&self) -> &str {
        &self.container.name
    }

    /// Fail if the step needs host privilege but does not declare it
    pub fn check_privilege(&self) -> Result<(), CompilationError> {
        let declared = self
            .container
            .security_context
            .as_ref()
            .is_some_and(K8sSecurityContext::is_privileged);
        if self.requires_host_privilege && !declared {
            return Err(CompilationError::privilege_not_declared(self.name()));
        }
        Ok(())
    }
}

type BuildStep = fn(&RenderContext) -> Result<InitStep, CompilationError>;

/// An init step included only when its predicate holds
struct OptionalStep {
    name: &'static str,
    is_active: fn(&RenderContext) -> bool,
    build: BuildStep,
}

/// Unconditional steps, in execution order
const BASELINE_STEPS: &[BuildStep] = &[
    disable_kube_health_monitor,
    seccomp_profile_installer,
    sysctl,
];

/// Optional steps, in priority order
const OPTIONAL_STEPS: &[OptionalStep] = &[OptionalStep {
    name: SHIFTFS_MODULE_LOADER,
    is_active: uses_shiftfs,
    build: shiftfs_module_loader,
}];

/// Builds the ordered init sequence for a render context
pub struct InitSequenceBuilder<'a> {
    ctx: &'a RenderContext,
}

impl<'a> InitSequenceBuilder<'a> {
    /// Create a builder over `ctx`
    pub fn new(ctx: &'a RenderContext) -> Self {
        Self { ctx }
    }

    /// Build the init sequence.
    ///
    /// Fails with `UnsupportedConfiguration` when the filesystem-isolation
    /// method has no rendering branch, before any step is built.
    pub fn build(self) -> Result<Vec<InitStep>, CompilationError> {
        check_fs_shift_method(self.ctx.fs_shift_method())?;

        let mut steps = Vec::with_capacity(BASELINE_STEPS.len() + OPTIONAL_STEPS.len());
        for build in BASELINE_STEPS {
            steps.push(build(self.ctx)?);
        }

        for optional in OPTIONAL_STEPS {
            if (optional.is_active)(self.ctx) {
                debug!(step = optional.name, "including optional init step");
                steps.push((optional.build)(self.ctx)?);
            } else {
                debug!(step = optional.name, "skipping optional init step");
            }
        }

        for step in &steps {
            step.check_privilege()?;
        }

        Ok(steps)
    }
}

fn check_fs_shift_method(method: &FsShiftMethod) -> Result<(), Error> {
    match method {
        FsShiftMethod::Fuse | FsShiftMethod::ShiftFs => Ok(()),
        FsShiftMethod::Unrecognized(value) => {
            Err(Error::unsupported_configuration(FS_SHIFT_METHOD_FIELD, value))
        }
    }
}

fn uses_shiftfs(ctx: &RenderContext) -> bool {
    matches!(ctx.fs_shift_method(), FsShiftMethod::ShiftFs)
}

// =============================================================================
// Steps
// =============================================================================

const DISABLE_HEALTH_MONITOR_SCRIPT: &str = r#"exec {BASH_XTRACEFD}>&1
set -euExo pipefail
systemctl status kube-container-runtime-monitor.service || true
if [ "$(systemctl is-active kube-container-runtime-monitor.service)" == "active" ]
then
echo "kube-container-runtime-monitor.service is active"
systemctl stop kube-container-runtime-monitor.service
systemctl disable kube-container-runtime-monitor.service
systemctl status kube-container-runtime-monitor.service || true
else
echo "kube-container-runtime-monitor.service is not active, not doing anything"
fi
"#;

/// Stops and disables the node's container runtime monitor if it is active.
fn disable_kube_health_monitor(_ctx: &RenderContext) -> Result<InitStep, CompilationError> {
    Ok(InitStep::new(Container {
        name: "disable-kube-health-monitor".to_string(),
        image: "ubuntu:20.04".to_string(),
        command: Some(
            ["/usr/bin/nsenter", "-t", "1", "-a", "/bin/bash", "-c"]
                .map(String::from)
                .to_vec(),
        ),
        args: Some(vec![DISABLE_HEALTH_MONITOR_SCRIPT.to_string()]),
        security_context: Some(K8sSecurityContext {
            proc_mount: Some(ProcMountType::Default),
            ..K8sSecurityContext::privileged()
        }),
        ..Default::default()
    }))
}

fn seccomp_profile_installer(ctx: &RenderContext) -> Result<InitStep, CompilationError> {
    let image = resolve_image(SECCOMP_PROFILE_INSTALLER, ctx.repository(), ctx)?;
    let version = ctx.lookup_version(SECCOMP_PROFILE_INSTALLER)?;

    let container = Container {
        name: SECCOMP_PROFILE_INSTALLER.to_string(),
        image,
        command: Some(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            format!(
                "cp -f /installer/workspace_default.json /mnt/dst/workspace_default_{}.json",
                version
            ),
        ]),
        volume_mounts: vec![VolumeMount::new(VOLUME_HOST_SECCOMP, "/mnt/dst")],
        security_context: Some(K8sSecurityContext::privileged()),
        ..Default::default()
    };

    Ok(InitStep::new(container).with_volume(Volume::from_host_path(
        VOLUME_HOST_SECCOMP,
        "/var/lib/kubelet/seccomp",
        None,
    )))
}

/// Kernel tunables applied on every workspace node
const SYSCTLS: &[&str] = &[
    "net.core.somaxconn=4096",
    "\"net.ipv4.ip_local_port_range=5000 65000\"",
    "\"net.ipv4.tcp_tw_reuse=1\"",
    "fs.inotify.max_user_watches=1000000",
    "\"kernel.dmesg_restrict=1\"",
    "vm.unprivileged_userfaultfd=0",
];

fn sysctl_script() -> String {
    let mut script = String::from("(\necho \"running sysctls\"");
    for setting in SYSCTLS {
        script.push_str(" &&\nsysctl -w ");
        script.push_str(setting);
    }
    script.push_str("\n) && echo \"done!\" || echo \"failed!\"\n");
    script
}

fn sysctl(ctx: &RenderContext) -> Result<InitStep, CompilationError> {
    let image = resolve_image(COMPONENT, ctx.repository(), ctx)?;
    Ok(InitStep::new(Container {
        name: "sysctl".to_string(),
        image,
        command: Some(vec!["sh".to_string(), "-c".to_string(), sysctl_script()]),
        security_context: Some(K8sSecurityContext::privileged()),
        ..Default::default()
    }))
}

fn shiftfs_module_loader(ctx: &RenderContext) -> Result<InitStep, CompilationError> {
    let image = resolve_image(SHIFTFS_MODULE_LOADER, ctx.repository(), ctx)?;
    let container = Container {
        name: SHIFTFS_MODULE_LOADER.to_string(),
        image,
        volume_mounts: vec![VolumeMount::new(VOLUME_NODE_LINUX_SRC, "/usr/src_node").read_only()],
        security_context: Some(K8sSecurityContext::privileged()),
        ..Default::default()
    };

    Ok(InitStep::new(container)
        .with_volume(Volume::from_host_path(
            VOLUME_NODE_LINUX_SRC,
            "/usr/src",
            Some(HostPathType::Directory),
        ))
        .with_pod_annotation(
            format!("{}{}", SECCOMP_ANNOTATION_PREFIX, SHIFTFS_MODULE_LOADER),
            "unconfined",
        ))
}
