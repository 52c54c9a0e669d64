//! WorkloadCompiler: the single entry point for rendering ws-daemon
//!
//! Runs init sequence -> pod template -> DaemonSet envelope -> emission. Every
//! error aborts the render before any object is returned.

use kube::core::DynamicObject;
use tracing::{debug, info};
use wsd_common::kube_utils::ObjectMeta;
use wsd_common::RenderContext;

use crate::constants::{
    COMPONENT, PRIORITY_CLASS_SYSTEM_NODE_CRITICAL, TERMINATION_GRACE_PERIOD_SECONDS,
};
use crate::daemonset::{DaemonSet, DaemonSetSpec, PodMeta, PodSpec, PodTemplateSpec};
use crate::emit::emit;
use crate::error::CompilationError;
use crate::init::InitSequenceBuilder;
use crate::k8s::LabelSelector;
use crate::pod_template::PodTemplateCompiler;

/// Renders the ws-daemon DaemonSet for one render context.
///
/// ```rust,ignore
/// let objects = WorkloadCompiler::new(&ctx).compile()?;
/// ```
pub struct WorkloadCompiler<'a> {
    ctx: &'a RenderContext,
}

impl<'a> WorkloadCompiler<'a> {
    /// Create a compiler over `ctx`
    pub fn new(ctx: &'a RenderContext) -> Self {
        Self { ctx }
    }

    /// Compile the typed DaemonSet.
    pub fn compile_daemonset(&self) -> Result<DaemonSet, CompilationError> {
        let init_steps = InitSequenceBuilder::new(self.ctx).build()?;
        debug!(steps = init_steps.len(), "built init sequence");

        let template = PodTemplateCompiler::compile(self.ctx, init_steps)?;

        let metadata =
            ObjectMeta::new(COMPONENT, &self.ctx.namespace).with_labels(template.labels.clone());
        let selector = LabelSelector {
            match_labels: template.labels.clone(),
        };

        let spec = DaemonSetSpec {
            selector,
            template: PodTemplateSpec {
                metadata: PodMeta {
                    labels: template.labels,
                    annotations: template.annotations,
                },
                spec: PodSpec {
                    service_account_name: COMPONENT.to_string(),
                    init_containers: template.init_containers,
                    containers: template.containers,
                    volumes: template.volumes,
                    affinity: Some(template.affinity),
                    tolerations: template.tolerations,
                    restart_policy: Some("Always".to_string()),
                    termination_grace_period_seconds: Some(TERMINATION_GRACE_PERIOD_SECONDS),
                    dns_policy: Some("ClusterFirst".to_string()),
                    host_pid: Some(true),
                    priority_class_name: Some(PRIORITY_CLASS_SYSTEM_NODE_CRITICAL.to_string()),
                    enable_service_links: Some(false),
                },
            },
        };

        Ok(DaemonSet::new(metadata, spec))
    }

    /// Compile and emit the DaemonSet as dynamic objects.
    pub fn compile(&self) -> Result<Vec<DynamicObject>, CompilationError> {
        let daemonset = self.compile_daemonset()?;
        let objects = emit(&daemonset)?;
        info!(
            namespace = %self.ctx.namespace,
            fs_shift_method = %self.ctx.fs_shift_method(),
            objects = objects.len(),
            "rendered ws-daemon"
        );
        Ok(objects)
    }
}

/// Render the ws-daemon objects for `ctx`
pub fn render(ctx: &RenderContext) -> Result<Vec<DynamicObject>, CompilationError> {
    WorkloadCompiler::new(ctx).compile()
}

/// Render the typed ws-daemon DaemonSet for `ctx`
pub fn render_daemonset(ctx: &RenderContext) -> Result<DaemonSet, CompilationError> {
    WorkloadCompiler::new(ctx).compile_daemonset()
}
