//! Common types for the workspace daemon renderer: render context, errors, and utilities

#![deny(missing_docs)]

pub mod context;
pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use context::{
    FsShiftMethod, InstallationConfig, LogLevel, ObservabilityConfig, RenderContext,
    TracingConfig, VersionLookup, VersionManifest, WorkspaceConfig, WorkspaceRuntimeConfig,
};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label key naming the application every rendered resource belongs to
pub const LABEL_APP: &str = "app";

/// Label key naming the component a resource is rendered for
pub const LABEL_COMPONENT: &str = "component";

/// Value of the `app` label on every rendered resource
pub const APP_NAME: &str = "gitpod";

/// Namespace used when the caller does not supply one
pub const DEFAULT_NAMESPACE: &str = "default";
