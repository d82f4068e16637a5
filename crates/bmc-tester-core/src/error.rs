//! Error types for BMC test orchestration.

use std::path::PathBuf;

use thiserror::Error;

use crate::context::DeadlineExceeded;

/// Errors raised while loading or validating test and hardware configuration.
///
/// These are the only errors meant to stop the process; everything raised
/// after device testing starts is recorded in the report instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for the expected shape
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no bmclib provider defined in configuration")]
    MissingProvider,

    #[error("no bmclib protocol defined in configuration")]
    MissingProtocol,

    #[error("unsupported bmclib provider '{0}' defined in test")]
    UnsupportedProvider(String),

    #[error("unsupported bmclib protocol '{0}' defined in test")]
    UnsupportedProtocol(String),

    #[error("no bmclib features to test defined in configuration")]
    NoFeatures,

    #[error("no servers defined in configuration")]
    NoDevices,

    /// A configured feature has no test procedure
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors produced by the feature registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown bmclib feature defined in test: {0}")]
    UnknownFeature(String),

    #[error("feature '{0}' has more than one test procedure")]
    DuplicateProcedure(String),

    #[error("feature '{0}' has no test procedure")]
    MissingProcedure(String),

    #[error("feature name must not be empty")]
    EmptyName,
}

/// Errors reported by the connection/driver layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// BMC could not be reached
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// BMC rejected the credentials
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// BMC accepted the request but the operation failed
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// Operation did not finish in time
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// No opened provider implements the operation
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// No registered driver matches the requested protocol/provider
    #[error("no eligible providers for protocol '{0}'")]
    NoProviders(String),

    /// Connection parameters cannot be used
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every provider failed; one message per provider
    #[error("all providers failed: {}", .0.join("; "))]
    AllProvidersFailed(Vec<String>),
}

impl From<DeadlineExceeded> for DriverError {
    fn from(err: DeadlineExceeded) -> Self {
        DriverError::Timeout(err.to_string())
    }
}

/// Failure of a single test procedure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),

    /// The feature is registered but has no non-disruptive test yet
    #[error("feature not implemented: {0}")]
    NotImplemented(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DriverError::ConnectionFailed("host unreachable".to_string());
        assert_eq!(err.to_string(), "connection failed: host unreachable");

        let err = RegistryError::UnknownFeature("firmwareinstall".to_string());
        assert_eq!(
            err.to_string(),
            "unknown bmclib feature defined in test: firmwareinstall"
        );

        let err = TestError::NotImplemented("bmcreset".to_string());
        assert_eq!(err.to_string(), "feature not implemented: bmcreset");
    }

    #[test]
    fn test_all_providers_failed_joins_messages() {
        let err = DriverError::AllProvidersFailed(vec![
            "ipmitool: connection refused".to_string(),
            "gofish: 401".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "all providers failed: ipmitool: connection refused; gofish: 401"
        );
    }

    #[test]
    fn test_driver_error_passes_through_test_error() {
        let err: TestError = DriverError::Timeout("power status".to_string()).into();
        assert_eq!(err.to_string(), "operation timed out: power status");
    }
}
