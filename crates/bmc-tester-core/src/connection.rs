//! Seam between the orchestration core and the BMC driver layer.
//!
//! The core never speaks IPMI or Redfish itself. It asks a
//! [`ConnectionFactory`] for a [`Connection`] per device and drives it
//! through open, the feature operations and close.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::DriverResult;
use crate::model::DeviceSpec;

/// Which drivers were tried and which one answered last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    pub providers_attempted: Vec<String>,
    pub successful_provider: String,
}

/// How the driver layer should pick providers for a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSelector {
    /// Preferred provider, tried first.
    pub provider: String,
    /// Protocol requested by the test configuration.
    pub protocol: String,
    /// Restrict eligible drivers to those speaking `protocol`.
    pub filter_by_protocol: bool,
    /// Upper bound for opening each individual provider.
    pub per_provider_timeout: Duration,
}

/// An open-able session against one BMC.
///
/// Every operation receives the run's context; implementations are expected
/// to bound their network calls with [`RunContext::run`].
#[async_trait]
pub trait Connection: Send + Sync {
    /// Establish the session.
    async fn open(&mut self, ctx: &RunContext) -> DriverResult<()>;

    /// Tear down the session. Called once after every open attempt,
    /// including failed ones.
    async fn close(&mut self, ctx: &RunContext) -> DriverResult<()>;

    fn metadata(&self) -> ConnectionMetadata;

    /// Current chassis power state, lowercase (`on`, `off`, ...).
    async fn power_state(&mut self, ctx: &RunContext) -> DriverResult<String>;

    /// Request a chassis power state.
    async fn set_power_state(&mut self, ctx: &RunContext, state: &str) -> DriverResult<()>;

    /// Names of the BMC's user accounts.
    async fn read_users(&mut self, ctx: &RunContext) -> DriverResult<Vec<String>>;
}

/// Builds connections for devices.
pub trait ConnectionFactory: Send + Sync {
    fn connect(
        &self,
        device: &DeviceSpec,
        selector: &DriverSelector,
    ) -> DriverResult<Box<dyn Connection>>;
}
