//! Fixed names, paths, and ports for the ws-daemon workload
//!
//! Volume names live here so that declarations and mounts refer to the same
//! string.

// =============================================================================
// Components
// =============================================================================

/// Main component; also the DaemonSet, container, and service account name
pub const COMPONENT: &str = "ws-daemon";

/// Component that ships the workspace seccomp profile
pub const SECCOMP_PROFILE_INSTALLER: &str = "seccomp-profile-installer";

/// Component that loads the shiftfs kernel module
pub const SHIFTFS_MODULE_LOADER: &str = "shiftfs-module-loader";

// =============================================================================
// Ports
// =============================================================================

/// RPC port, also bound on the node
pub const RPC_PORT: u16 = 8080;

/// HTTP health endpoint targeted by liveness and readiness probes
pub const HEALTH_PORT: u16 = 9999;

/// Name of the health port; probes must target this port
pub const HEALTH_PORT_NAME: &str = "health";

/// Path served by the health endpoint
pub const HEALTH_PATH: &str = "/";

// =============================================================================
// Volumes
// =============================================================================

pub const VOLUME_HOSTFS: &str = "hostfs";
pub const VOLUME_WORKING_AREA: &str = "working-area";
pub const VOLUME_TLS_CERTS: &str = "tls-certs";
pub const VOLUME_CONFIG: &str = "config";
pub const VOLUME_CONTAINERD_SOCKET: &str = "containerd-socket";
pub const VOLUME_NODE_FS0: &str = "node-fs0";
pub const VOLUME_NODE_FS1: &str = "node-fs1";
pub const VOLUME_NODE_MOUNTS: &str = "node-mounts";
pub const VOLUME_NODE_CGROUPS: &str = "node-cgroups";
pub const VOLUME_NODE_HOSTS: &str = "node-hosts";
pub const VOLUME_GCLOUD_TMP: &str = "gcloud-tmp";
/// Supplied by the seccomp-profile-installer step
pub const VOLUME_HOST_SECCOMP: &str = "hostseccomp";
/// Supplied by the shiftfs-module-loader step
pub const VOLUME_NODE_LINUX_SRC: &str = "node-linux-src";

/// Secret holding the daemon's TLS certificates
pub const TLS_SECRET_NAME: &str = "ws-daemon-tls";

/// ConfigMap holding `config.json`
pub const CONFIG_MAP_NAME: &str = "ws-daemon-config";

// =============================================================================
// Scheduling
// =============================================================================

/// Node label for regular workspace nodes
pub const AFFINITY_LABEL_WORKSPACES: &str = "gitpod.io/workload_workspace";

/// Node label for headless (prebuild) workspace nodes
pub const AFFINITY_LABEL_HEADLESS: &str = "gitpod.io/workload_workspace_headless";

pub const PRIORITY_CLASS_SYSTEM_NODE_CRITICAL: &str = "system-node-critical";

pub const TERMINATION_GRACE_PERIOD_SECONDS: i64 = 30;

/// Pod annotation prefix for per-container seccomp profiles
pub const SECCOMP_ANNOTATION_PREFIX: &str = "seccomp.security.alpha.kubernetes.io/";
