//! Loads the render context from files on disk

use std::path::Path;

use tracing::debug;
use wsd_common::{InstallationConfig, RenderContext, VersionManifest};

use crate::{Error, Result};

/// Read and validate the installation config
pub fn load_installation_config(path: &Path) -> Result<InstallationConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read_file(path, e))?;
    let config = InstallationConfig::from_yaml(&raw)?;
    config.validate()?;
    debug!(path = %path.display(), domain = %config.domain, "loaded installation config");
    Ok(config)
}

/// Read the component version manifest
pub fn load_versions(path: &Path) -> Result<VersionManifest> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read_file(path, e))?;
    let versions = VersionManifest::from_yaml(&raw)?;
    debug!(path = %path.display(), components = versions.components.len(), "loaded versions");
    Ok(versions)
}

/// Build the render context from the two input files
pub fn load_context(config: &Path, versions: &Path, namespace: &str) -> Result<RenderContext> {
    if namespace.trim().is_empty() {
        return Err(Error::validation("namespace must not be empty"));
    }
    Ok(RenderContext::new(
        load_installation_config(config)?,
        namespace,
        load_versions(versions)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wsd_common::{FsShiftMethod, VersionLookup};

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn loads_context_from_files() {
        let config = write_temp(
            "domain: gitpod.example.com\nrepository: registry.io/build\nworkspace:\n  runtime:\n    fsShiftMethod: shiftfs\n",
        );
        let versions = write_temp("components:\n  ws-daemon: v1\n");

        let ctx = load_context(config.path(), versions.path(), "gitpod").expect("should load");
        assert_eq!(ctx.namespace, "gitpod");
        assert_eq!(ctx.fs_shift_method(), &FsShiftMethod::ShiftFs);
        assert_eq!(ctx.lookup_version("ws-daemon").ok(), Some("v1"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let versions = write_temp("components: {}\n");
        let err = load_context(Path::new("/nonexistent/config.yaml"), versions.path(), "gitpod")
            .unwrap_err();
        assert!(matches!(err, Error::ReadFile { .. }));
        assert!(err.to_string().contains("/nonexistent/config.yaml"));
    }

    #[test]
    fn invalid_config_is_rejected_at_load() {
        let config = write_temp("domain: \"\"\nrepository: registry.io\n");
        let err = load_installation_config(config.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Context(wsd_common::Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let versions = write_temp("components: [not, a, map]\n");
        let err = load_versions(versions.path()).unwrap_err();
        assert!(matches!(err, Error::Context(wsd_common::Error::Parse { .. })));
    }

    #[test]
    fn empty_namespace_is_rejected() {
        let config = write_temp("domain: a\nrepository: b\n");
        let versions = write_temp("components: {}\n");
        assert!(matches!(
            load_context(config.path(), versions.path(), " "),
            Err(Error::Validation { .. })
        ));
    }
}
