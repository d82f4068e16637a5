//! BMC Tester Drivers: IPMI and Redfish access for bmc-tester
//!
//! Implements the core's connection seam over two providers:
//! - `ipmitool` speaks IPMI over LAN through the `ipmitool` binary
//! - `gofish` speaks Redfish over HTTPS
//!
//! A [`Client`] opens every eligible provider and routes each operation to
//! the first one that answers.

pub mod client;
pub(crate) mod error;
pub mod factory;
pub mod ipmitool;
pub mod provider;
pub mod redfish;

pub use client::Client;
pub use factory::DriverFactory;
pub use ipmitool::{IpmitoolProvider, DEFAULT_IPMI_PORT};
pub use provider::Provider;
pub use redfish::RedfishProvider;

/// Driver library version, reported as `bmclib_version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
