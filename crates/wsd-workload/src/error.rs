//! Workload compilation error types
//!
//! Structured errors for DaemonSet rendering that name the container, volume,
//! or step that broke an invariant.

use thiserror::Error;

/// Errors that can occur while rendering the ws-daemon DaemonSet
#[derive(Debug, Error)]
pub enum CompilationError {
    /// A container mounts a volume the pod spec never declares
    #[error("container '{container}' mounts undeclared volume '{volume}'")]
    DanglingMount {
        /// Container holding the mount
        container: String,
        /// Volume name that has no declaration
        volume: String,
    },

    /// Two entries of the same kind share a name
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// Entry kind ("volume", "container")
        kind: &'static str,
        /// The repeated name
        name: String,
    },

    /// A step needs host privilege but its container does not declare it
    #[error("init step '{step}' requires host privilege but is not privileged")]
    PrivilegeNotDeclared {
        /// Init step name
        step: String,
    },

    /// A probe targets a port the container does not expose
    #[error("{probe} probe of container '{container}' targets undeclared port {port}")]
    ProbePortMismatch {
        /// Container holding the probe
        container: String,
        /// Probe kind ("liveness", "readiness")
        probe: &'static str,
        /// Target port
        port: u16,
    },

    /// Resource is missing a field required for submission
    #[error("{kind} is incomplete: {message}")]
    IncompleteResource {
        /// Resource kind
        kind: &'static str,
        /// What is missing
        message: String,
    },

    /// Typed resource could not be converted to a dynamic object
    #[error("failed to serialize resource: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Render context error (missing version, unsupported configuration)
    #[error(transparent)]
    Context(#[from] wsd_common::Error),
}

impl CompilationError {
    /// Create a dangling mount error
    pub fn dangling_mount(container: impl Into<String>, volume: impl Into<String>) -> Self {
        Self::DanglingMount {
            container: container.into(),
            volume: volume.into(),
        }
    }

    /// Create a duplicate name error
    pub fn duplicate_name(kind: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    /// Create a privilege-not-declared error
    pub fn privilege_not_declared(step: impl Into<String>) -> Self {
        Self::PrivilegeNotDeclared { step: step.into() }
    }

    /// Create a probe port mismatch error
    pub fn probe_port_mismatch(
        container: impl Into<String>,
        probe: &'static str,
        port: u16,
    ) -> Self {
        Self::ProbePortMismatch {
            container: container.into(),
            probe,
            port,
        }
    }

    /// Create an incomplete resource error
    pub fn incomplete(kind: &'static str, message: impl Into<String>) -> Self {
        Self::IncompleteResource {
            kind,
            message: message.into(),
        }
    }

    /// Whether the error originates from the render context rather than assembly
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Context(_))
    }
}
