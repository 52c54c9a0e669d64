//! Node volumes and mounts of the main container
//!
//! The daemon reaches into the node through host paths; every mount is matched
//! against the declared volume set before the pod template is returned.

use std::collections::BTreeSet;

use crate::constants::{
    CONFIG_MAP_NAME, TLS_SECRET_NAME, VOLUME_CONFIG, VOLUME_CONTAINERD_SOCKET, VOLUME_GCLOUD_TMP,
    VOLUME_HOSTFS, VOLUME_NODE_CGROUPS, VOLUME_NODE_FS0, VOLUME_NODE_FS1, VOLUME_NODE_HOSTS,
    VOLUME_NODE_MOUNTS, VOLUME_TLS_CERTS, VOLUME_WORKING_AREA,
};
use crate::error::CompilationError;
use crate::k8s::{Container, HostPathType, MountPropagationMode, Volume, VolumeMount};

/// Volumes the main container needs, in declaration order
pub fn node_volumes() -> Vec<Volume> {
    use HostPathType::{Directory, DirectoryOrCreate, File, Socket};

    vec![
        Volume::from_host_path(VOLUME_HOSTFS, "/", None),
        Volume::from_host_path(
            VOLUME_WORKING_AREA,
            "/mnt/disks/ssd0/workspaces",
            Some(DirectoryOrCreate),
        ),
        Volume::from_secret(VOLUME_TLS_CERTS, TLS_SECRET_NAME),
        Volume::from_config_map(VOLUME_CONFIG, CONFIG_MAP_NAME),
        Volume::from_host_path(
            VOLUME_CONTAINERD_SOCKET,
            "/run/containerd/containerd.sock",
            Some(Socket),
        ),
        Volume::from_host_path(VOLUME_NODE_FS0, "/var/lib", Some(Directory)),
        Volume::from_host_path(
            VOLUME_NODE_FS1,
            "/run/containerd/io.containerd.runtime.v2.task/k8s.io",
            Some(Directory),
        ),
        Volume::from_host_path(VOLUME_NODE_MOUNTS, "/proc/mounts", Some(File)),
        Volume::from_host_path(VOLUME_NODE_CGROUPS, "/sys/fs/cgroup", Some(Directory)),
        Volume::from_host_path(VOLUME_NODE_HOSTS, "/etc/hosts", Some(File)),
        Volume::from_host_path(
            VOLUME_GCLOUD_TMP,
            "/mnt/disks/ssd0/sync-tmp",
            Some(DirectoryOrCreate),
        ),
    ]
}

/// Mounts of the main container
pub fn main_mounts() -> Vec<VolumeMount> {
    use MountPropagationMode::{Bidirectional, HostToContainer};

    vec![
        VolumeMount::new(VOLUME_WORKING_AREA, "/mnt/workingarea").with_propagation(Bidirectional),
        VolumeMount::new(VOLUME_CONFIG, "/config"),
        VolumeMount::new(VOLUME_CONTAINERD_SOCKET, "/mnt/containerd.sock"),
        VolumeMount::new(VOLUME_NODE_FS0, "/mnt/node0"),
        VolumeMount::new(VOLUME_NODE_FS1, "/mnt/node1"),
        VolumeMount::new(VOLUME_NODE_MOUNTS, "/mnt/mounts")
            .read_only()
            .with_propagation(HostToContainer),
        VolumeMount::new(VOLUME_NODE_CGROUPS, "/mnt/node-cgroups")
            .with_propagation(HostToContainer),
        VolumeMount::new(VOLUME_NODE_HOSTS, "/mnt/hosts"),
        VolumeMount::new(VOLUME_TLS_CERTS, "/certs"),
        VolumeMount::new(VOLUME_GCLOUD_TMP, "/mnt/sync-tmp"),
    ]
}

/// Fail on the first name that appears twice
pub(crate) fn check_unique<'a>(
    kind: &'static str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), CompilationError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CompilationError::duplicate_name(kind, name));
        }
    }
    Ok(())
}

/// Fail on the first mount whose volume is not declared
pub(crate) fn check_mounts<'a>(
    containers: impl IntoIterator<Item = &'a Container>,
    volumes: &[Volume],
) -> Result<(), CompilationError> {
    let declared: BTreeSet<&str> = volumes.iter().map(|v| v.name.as_str()).collect();
    for container in containers {
        for mount in &container.volume_mounts {
            if !declared.contains(mount.name.as_str()) {
                return Err(CompilationError::dangling_mount(&container.name, &mount.name));
            }
        }
    }
    Ok(())
}
