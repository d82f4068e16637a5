//! Provider trait: one concrete way of talking to a BMC.

use async_trait::async_trait;
use bmc_tester_core::{DriverResult, RunContext};

/// A single driver (ipmitool, Redfish, ...) behind the multi-provider
/// [`Client`](crate::Client).
///
/// Implementations handle the protocol-specific details.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name as used in test configuration (`ipmitool`, `gofish`).
    fn name(&self) -> &str;

    /// Protocol spoken by this provider (`ipmi`, `redfish`).
    fn protocol(&self) -> &str;

    async fn open(&mut self, ctx: &RunContext) -> DriverResult<()>;

    async fn close(&mut self, ctx: &RunContext) -> DriverResult<()>;

    /// Current power state, lowercase.
    async fn power_state(&mut self, ctx: &RunContext) -> DriverResult<String>;

    async fn set_power_state(&mut self, ctx: &RunContext, state: &str) -> DriverResult<()>;

    async fn read_users(&mut self, ctx: &RunContext) -> DriverResult<Vec<String>>;
}
