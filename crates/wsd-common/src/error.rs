//! Error types for render context handling
//!
//! Errors are structured with fields so a failed render can be traced back to
//! the component or configuration field that caused it.

use thiserror::Error;

/// Errors raised while reading the render context
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced component has no entry in the version manifest
    #[error("no version found for component '{component}'")]
    MissingVersion {
        /// Component whose version was requested
        component: String,
    },

    /// A configuration value has no matching rendering branch
    #[error("unsupported configuration: {field} = '{value}'")]
    UnsupportedConfiguration {
        /// Configuration field path (e.g., "workspace.runtime.fsShiftMethod")
        field: String,
        /// The value that could not be handled
        value: String,
    },

    /// The configuration is structurally present but unusable
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's invalid
        message: String,
    },

    /// Configuration document could not be parsed
    #[error("failed to parse {document}: {source}")]
    Parse {
        /// Which document failed ("installation config", "version manifest")
        document: String,
        /// Underlying YAML error
        source: serde_yaml::Error,
    },
}

impl Error {
    /// Create a missing version error
    pub fn missing_version(component: impl Into<String>) -> Self {
        Self::MissingVersion {
            component: component.into(),
        }
    }

    /// Create an unsupported configuration error
    pub fn unsupported_configuration(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a parse error for the named document
    pub fn parse(document: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Parse {
            document: document.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_version_names_component() {
        let err = Error::missing_version("ws-daemon");
        assert_eq!(err.to_string(), "no version found for component 'ws-daemon'");
    }

    #[test]
    fn unsupported_configuration_names_field_and_value() {
        let err = Error::unsupported_configuration("workspace.runtime.fsShiftMethod", "zfs");
        let display = err.to_string();
        assert!(display.contains("workspace.runtime.fsShiftMethod"));
        assert!(display.contains("zfs"));
    }

    #[test]
    fn parse_error_keeps_source() {
        let yaml_err = serde_yaml::from_str::<u32>("not a number").unwrap_err();
        let err = Error::parse("version manifest", yaml_err);
        assert!(err.to_string().contains("version manifest"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
