//! Workspace daemon (ws-daemon) DaemonSet rendering
//!
//! Composes the privileged per-node agent from a `RenderContext`: a fixed
//! init baseline plus flag-gated steps, node volumes and mounts, the main
//! container with its metrics sidecar, and node-agent scheduling. The render
//! is a pure function; the output is a list of `DynamicObject`s for an
//! external applier.
//!
//! # Usage
//!
//! ```rust,ignore
//! let ctx = RenderContext::new(config, "gitpod", versions);
//! let objects = wsd_workload::render(&ctx)?;
//! ```

pub mod constants;
pub mod daemonset;
pub mod emit;
pub mod error;
pub mod fragments;
pub mod init;
pub mod k8s;
pub mod pod_template;
pub mod volumes;

mod compiler;

pub use compiler::{render, render_daemonset, WorkloadCompiler};
pub use daemonset::DaemonSet;
pub use emit::emit;
pub use error::CompilationError;
pub use fragments::SidecarKind;
pub use init::{InitSequenceBuilder, InitStep};
pub use pod_template::{CompiledPodTemplate, PodTemplateCompiler};
