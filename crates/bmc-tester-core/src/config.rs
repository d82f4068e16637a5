//! Loading and validating the tests and hardware files.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{HardwareConfig, TestSpec};
use crate::registry::FeatureRegistry;

/// Providers the driver layer knows how to build.
pub const SUPPORTED_PROVIDERS: [&str; 2] = ["ipmitool", "gofish"];

/// Protocols the driver layer can filter on.
pub const SUPPORTED_PROTOCOLS: [&str; 2] = ["ipmi", "redfish"];

/// Both configuration files, as printed by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedConfig {
    #[serde(rename = "Hardware")]
    pub hardware: HardwareConfig,
    #[serde(rename = "Tests")]
    pub tests: TestSpec,
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and validate the tests file.
pub fn load_tests(path: &Path, registry: &FeatureRegistry) -> ConfigResult<TestSpec> {
    let spec: TestSpec = read_yaml(path)?;
    validate_tests(&spec, registry)?;
    debug!(path = %path.display(), features = spec.features.len(), "loaded tests config");
    Ok(spec)
}

/// Read and validate the hardware file.
pub fn load_hardware(path: &Path) -> ConfigResult<HardwareConfig> {
    let hardware: HardwareConfig = read_yaml(path)?;
    validate_hardware(&hardware)?;
    debug!(path = %path.display(), devices = hardware.devices.len(), "loaded hardware config");
    Ok(hardware)
}

pub fn validate_tests(spec: &TestSpec, registry: &FeatureRegistry) -> ConfigResult<()> {
    if spec.provider.is_empty() {
        return Err(ConfigError::MissingProvider);
    }
    if spec.protocol.is_empty() {
        return Err(ConfigError::MissingProtocol);
    }
    if !SUPPORTED_PROVIDERS.contains(&spec.provider.as_str()) {
        return Err(ConfigError::UnsupportedProvider(spec.provider.clone()));
    }
    if !SUPPORTED_PROTOCOLS.contains(&spec.protocol.as_str()) {
        return Err(ConfigError::UnsupportedProtocol(spec.protocol.clone()));
    }
    if spec.features.is_empty() {
        return Err(ConfigError::NoFeatures);
    }
    registry.resolve(&spec.features)?;
    Ok(())
}

pub fn validate_hardware(hardware: &HardwareConfig) -> ConfigResult<()> {
    if hardware.devices.is_empty() {
        return Err(ConfigError::NoDevices);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use std::io::Write;

    fn registry() -> FeatureRegistry {
        FeatureRegistry::builtin().expect("builtin registry")
    }

    fn spec(provider: &str, protocol: &str, features: &[&str]) -> TestSpec {
        TestSpec {
            protocol: protocol.to_string(),
            provider: provider.to_string(),
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_validate_tests_accepts_supported_combination() {
        assert!(validate_tests(&spec("gofish", "redfish", &["powerstate"]), &registry()).is_ok());
    }

    #[test]
    fn test_validate_tests_rejections() {
        let r = registry();
        assert!(matches!(
            validate_tests(&spec("", "ipmi", &["powerstate"]), &r),
            Err(ConfigError::MissingProvider)
        ));
        assert!(matches!(
            validate_tests(&spec("ipmitool", "", &["powerstate"]), &r),
            Err(ConfigError::MissingProtocol)
        ));
        assert!(matches!(
            validate_tests(&spec("racadm", "ipmi", &["powerstate"]), &r),
            Err(ConfigError::UnsupportedProvider(p)) if p == "racadm"
        ));
        assert!(matches!(
            validate_tests(&spec("ipmitool", "snmp", &["powerstate"]), &r),
            Err(ConfigError::UnsupportedProtocol(p)) if p == "snmp"
        ));
        assert!(matches!(
            validate_tests(&spec("ipmitool", "ipmi", &[]), &r),
            Err(ConfigError::NoFeatures)
        ));
        assert!(matches!(
            validate_tests(&spec("ipmitool", "ipmi", &["powerstate", "virtualmedia"]), &r),
            Err(ConfigError::Registry(RegistryError::UnknownFeature(f))) if f == "virtualmedia"
        ));
    }

    #[test]
    fn test_load_tests_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "protocol: ipmi\nprovider: ipmitool\nfeatures:\n  - powerState\n  - userread"
        )
        .expect("write");

        let spec = load_tests(file.path(), &registry()).expect("load failed");
        assert_eq!(spec.protocol, "ipmi");
        assert_eq!(spec.features, vec!["powerState".to_string(), "userread".to_string()]);
    }

    #[test]
    fn test_load_hardware_requires_devices() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "devices: []").expect("write");
        assert!(matches!(load_hardware(file.path()), Err(ConfigError::NoDevices)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_hardware(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "features: [powerstate").expect("write");
        let err = load_tests(file.path(), &registry()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_merged_config_json_keys() {
        let merged = MergedConfig {
            hardware: HardwareConfig::default(),
            tests: spec("ipmitool", "ipmi", &["powerstate"]),
        };
        let json = serde_json::to_value(&merged).expect("serialize");
        assert!(json.get("Hardware").is_some());
        assert_eq!(json["Tests"]["provider"], "ipmitool");
    }
}
