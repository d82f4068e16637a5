//! Test configuration and result data model.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// What to test: one protocol/provider pair and an ordered feature list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub provider: String,
    /// Execution and reporting order.
    #[serde(default)]
    pub features: Vec<String>,
}

/// One physical device under test.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub model: String,
    #[serde(rename = "bmcHost")]
    pub host: String,
    #[serde(rename = "bmcUser", default)]
    pub user: String,
    #[serde(rename = "bmcPass", default)]
    pub pass: String,
    #[serde(rename = "ipmiPort", default, deserialize_with = "string_or_number")]
    pub port: String,
}

impl fmt::Debug for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSpec")
            .field("name", &self.name)
            .field("vendor", &self.vendor)
            .field("model", &self.model)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// Hardware inventory file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
}

/// Outcome of one feature on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestResult {
    pub feature: String,
    pub protocol: String,
    pub providers_attempted: Vec<String>,
    pub successful_provider: String,
    pub output: String,
    pub error: String,
    pub succeeded: bool,
    #[serde(with = "crate::duration")]
    pub runtime: Duration,
}

impl TestResult {
    /// A failed result that never reached the test procedure.
    pub fn failed(
        feature: impl Into<String>,
        protocol: impl Into<String>,
        providers_attempted: Vec<String>,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            feature: feature.into(),
            protocol: protocol.into(),
            providers_attempted,
            successful_provider: String::new(),
            output: String::new(),
            error: error.to_string(),
            succeeded: false,
            runtime: Duration::ZERO,
        }
    }
}

/// All results for a single device, in feature order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceResult {
    pub vendor: String,
    pub model: String,
    pub name: String,
    #[serde(rename = "BMCIP")]
    pub bmc_ip: String,
    pub results: Vec<TestResult>,
}

impl DeviceResult {
    pub fn new(device: &DeviceSpec, results: Vec<TestResult>) -> Self {
        Self {
            vendor: device.vendor.clone(),
            model: device.model.clone(),
            name: device.name.clone(),
            bmc_ip: device.host.clone(),
            results,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded).count()
    }
}

/// Accept `ipmiPort: 623` as well as `ipmiPort: "623"`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Option::<Port>::deserialize(deserializer)? {
        Some(Port::Text(s)) => s,
        Some(Port::Number(n)) => n.to_string(),
        None => String::new(),
    })
}
