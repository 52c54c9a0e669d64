//! Render context: the read-only input of a single render call
//!
//! A `RenderContext` bundles the installation configuration, the target
//! namespace, and the component version manifest. It is built once by the
//! configuration loader and only ever borrowed by the renderer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// =============================================================================
// Installation Config
// =============================================================================

/// Cluster-wide installation configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstallationConfig {
    /// Public domain of the installation (e.g., "gitpod.example.com")
    #[serde(default)]
    pub domain: String,
    /// Image repository prefix (e.g., "eu.gcr.io/gitpod-core-dev/build")
    #[serde(default)]
    pub repository: String,
    /// Logging and tracing settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Workspace settings
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

impl InstallationConfig {
    /// Parse an installation config from YAML
    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).map_err(|e| Error::parse("installation config", e))
    }

    /// Check the fields every render depends on
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(Error::invalid_config("domain must not be empty"));
        }
        if self.repository.trim().trim_end_matches('/').is_empty() {
            return Err(Error::invalid_config("repository must not be empty"));
        }
        Ok(())
    }
}

/// Observability settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Log level passed to components
    #[serde(default)]
    pub log_level: LogLevel,
    /// Jaeger tracing settings; tracing env is omitted when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TracingConfig>,
}

/// Component log level
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace
    Trace,
    /// Debug
    Debug,
    /// Info
    #[default]
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Fatal
    Fatal,
    /// Panic
    Panic,
}

impl LogLevel {
    /// Lowercase name as passed to components via `LOG_LEVEL`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jaeger tracing settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TracingConfig {
    /// Collector endpoint; takes precedence over `agent_host`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Agent host, used only when no endpoint is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_host: Option<String>,
}

/// Workspace settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Node runtime settings
    #[serde(default)]
    pub runtime: WorkspaceRuntimeConfig,
}

/// Node runtime settings for workspaces
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRuntimeConfig {
    /// Filesystem-isolation method used for user-namespaced workspaces
    #[serde(default)]
    pub fs_shift_method: FsShiftMethod,
}

/// Kernel mechanism giving workspace filesystems per-user identity mapping.
///
/// Values outside the closed set are kept as `Unrecognized` so the renderer
/// can reject them with the offending value instead of failing at parse time.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FsShiftMethod {
    /// FUSE-based overlay
    #[default]
    #[serde(rename = "fuse")]
    Fuse,
    /// shiftfs kernel module
    #[serde(rename = "shiftfs")]
    ShiftFs,
    /// Any other value
    #[serde(untagged)]
    Unrecognized(String),
}

impl FsShiftMethod {
    /// Configuration value of this method
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fuse => "fuse",
            Self::ShiftFs => "shiftfs",
            Self::Unrecognized(value) => value,
        }
    }
}

impl fmt::Display for FsShiftMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Version Manifest
// =============================================================================

/// Resolves component names to the version tags used in image references.
pub trait VersionLookup {
    /// Version of `component`, or `Error::MissingVersion` if it has no entry.
    fn lookup_version(&self, component: &str) -> Result<&str>;
}

/// Component name -> version tag
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    /// Versions keyed by component name
    #[serde(default)]
    pub components: BTreeMap<String, String>,
}

impl VersionManifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component version
    pub fn with_component(mut self, component: impl Into<String>, version: impl Into<String>) -> Self {
        self.components.insert(component.into(), version.into());
        self
    }

    /// Parse a version manifest from YAML
    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).map_err(|e| Error::parse("version manifest", e))
    }
}

impl VersionLookup for VersionManifest {
    fn lookup_version(&self, component: &str) -> Result<&str> {
        self.components
            .get(component)
            .map(String::as_str)
            .ok_or_else(|| Error::missing_version(component))
    }
}

// =============================================================================
// Render Context
// =============================================================================

/// Immutable snapshot consumed by one render call
#[derive(Clone, Debug, PartialEq)]
pub struct RenderContext {
    /// Installation configuration
    pub config: InstallationConfig,
    /// Namespace the rendered resources are placed in
    pub namespace: String,
    /// Component versions for image resolution
    pub versions: VersionManifest,
}

impl RenderContext {
    /// Create a new render context
    pub fn new(
        config: InstallationConfig,
        namespace: impl Into<String>,
        versions: VersionManifest,
    ) -> Self {
        Self {
            config,
            namespace: namespace.into(),
            versions,
        }
    }

    /// Configured filesystem-isolation method
    pub fn fs_shift_method(&self) -> &FsShiftMethod {
        &self.config.workspace.runtime.fs_shift_method
    }

    /// Image repository prefix
    pub fn repository(&self) -> &str {
        &self.config.repository
    }
}

impl VersionLookup for RenderContext {
    fn lookup_version(&self, component: &str) -> Result<&str> {
        self.versions.lookup_version(component)
    }
}
