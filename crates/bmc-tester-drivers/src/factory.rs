//! [`ConnectionFactory`] backed by the real providers.

use bmc_tester_core::{
    Connection, ConnectionFactory, DeviceSpec, DriverError, DriverResult, DriverSelector,
};
use tracing::debug;

use crate::client::Client;
use crate::ipmitool::{IpmitoolProvider, DEFAULT_IPMI_PORT};
use crate::provider::Provider;
use crate::redfish::RedfishProvider;

/// Builds a [`Client`] over every known provider for each device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverFactory;

impl DriverFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build the client without boxing it.
    pub fn client(&self, device: &DeviceSpec, selector: &DriverSelector) -> DriverResult<Client> {
        let port = parse_port(&device.port)?;
        let providers: Vec<Box<dyn Provider>> = vec![
            Box::new(IpmitoolProvider::new(
                &device.host,
                port,
                &device.user,
                &device.pass,
            )),
            Box::new(RedfishProvider::new(&device.host, &device.user, &device.pass)),
        ];
        let client = Client::from_selector(providers, selector);
        debug!(
            host = %device.host,
            providers = ?client.provider_names(),
            "built bmc client"
        );
        Ok(client)
    }
}

impl ConnectionFactory for DriverFactory {
    fn connect(
        &self,
        device: &DeviceSpec,
        selector: &DriverSelector,
    ) -> DriverResult<Box<dyn Connection>> {
        Ok(Box::new(self.client(device, selector)?))
    }
}

/// An empty port falls back to the IPMI default.
fn parse_port(port: &str) -> DriverResult<u16> {
    let port = port.trim();
    if port.is_empty() {
        return Ok(DEFAULT_IPMI_PORT);
    }
    port.parse()
        .map_err(|_| DriverError::InvalidConfig(format!("invalid ipmi port '{port}'")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn device(port: &str) -> DeviceSpec {
        DeviceSpec {
            name: "node".to_string(),
            vendor: "supermicro".to_string(),
            model: "x11".to_string(),
            host: "10.0.0.9".to_string(),
            user: "ADMIN".to_string(),
            pass: "ADMIN".to_string(),
            port: port.to_string(),
        }
    }

    fn selector(provider: &str, protocol: &str, filter: bool) -> DriverSelector {
        DriverSelector {
            provider: provider.to_string(),
            protocol: protocol.to_string(),
            filter_by_protocol: filter,
            per_provider_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("623").unwrap(), 623);
        assert_eq!(parse_port(" 6230 ").unwrap(), 6230);
        assert_eq!(parse_port("").unwrap(), DEFAULT_IPMI_PORT);
        assert_eq!(
            parse_port("abc").unwrap_err(),
            DriverError::InvalidConfig("invalid ipmi port 'abc'".to_string())
        );
        assert!(parse_port("70000").is_err());
    }

    #[test]
    fn test_client_filters_by_protocol() {
        let client = DriverFactory::new()
            .client(&device("623"), &selector("gofish", "redfish", true))
            .unwrap();
        assert_eq!(client.provider_names(), vec!["gofish".to_string()]);
    }

    #[test]
    fn test_client_without_filtering_keeps_all_providers() {
        let client = DriverFactory::new()
            .client(&device("623"), &selector("gofish", "redfish", false))
            .unwrap();
        assert_eq!(
            client.provider_names(),
            vec!["gofish".to_string(), "ipmitool".to_string()]
        );
    }

    #[test]
    fn test_bad_port_is_a_connect_error() {
        let result =
            DriverFactory::new().connect(&device("x"), &selector("ipmitool", "ipmi", true));
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    }
}
