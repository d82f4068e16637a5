//! Redfish over HTTPS.
//!
//! Registered as the `gofish` provider. BMCs ship self-signed
//! certificates, so certificate verification is off.

use async_trait::async_trait;
use bmc_tester_core::{DriverError, DriverResult, RunContext};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::from_reqwest;
use crate::provider::Provider;

const SYSTEMS_PATH: &str = "/redfish/v1/Systems";
const ACCOUNTS_PATH: &str = "/redfish/v1/AccountService/Accounts";

pub struct RedfishProvider {
    base_url: String,
    user: String,
    pass: String,
    http: Option<Client>,
    system_path: Option<String>,
}

impl RedfishProvider {
    pub fn new(host: &str, user: &str, pass: &str) -> Self {
        Self::with_base_url(&format!("https://{host}"), user, pass)
    }

    pub fn with_base_url(base_url: &str, user: &str, pass: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            pass: pass.to_string(),
            http: None,
            system_path: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> DriverResult<&Client> {
        self.http
            .as_ref()
            .ok_or_else(|| DriverError::ConnectionFailed("redfish session is not open".to_string()))
    }

    fn system_path(&self) -> DriverResult<&str> {
        self.system_path
            .as_deref()
            .ok_or_else(|| DriverError::ConnectionFailed("redfish session is not open".to_string()))
    }

    /// Send one request and decode the JSON body, if any.
    async fn request(
        &self,
        ctx: &RunContext,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> DriverResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "redfish request");

        let mut request = self
            .client()?
            .request(method, &url)
            .basic_auth(&self.user, Some(&self.pass));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let exchange = async move {
            let response = request.send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>(bytes)
        };
        let bytes = ctx.run(exchange).await?.map_err(from_reqwest)?;

        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| DriverError::CommandFailed(format!("invalid JSON from {url}: {e}")))
    }
}

impl std::fmt::Debug for RedfishProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedfishProvider")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("system_path", &self.system_path)
            .finish()
    }
}

/// `@odata.id` of every member of a Redfish collection.
pub(crate) fn member_paths(collection: &Value) -> Vec<String> {
    collection["Members"]
        .as_array()
        .map(|members| {
            members
                .iter()
                .filter_map(|m| m["@odata.id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Map a chassis power request onto a `ComputerSystem.Reset` type.
pub(crate) fn reset_type(state: &str) -> DriverResult<&'static str> {
    match state.to_ascii_lowercase().as_str() {
        "on" => Ok("On"),
        "off" => Ok("ForceOff"),
        "soft" => Ok("GracefulShutdown"),
        "cycle" => Ok("PowerCycle"),
        "reset" => Ok("ForceRestart"),
        other => Err(DriverError::Unsupported(format!("power state '{other}'"))),
    }
}

pub(crate) fn power_state_of(system: &Value) -> DriverResult<String> {
    system["PowerState"]
        .as_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| DriverError::CommandFailed("system has no PowerState".to_string()))
}

#[async_trait]
impl Provider for RedfishProvider {
    fn name(&self) -> &str {
        "gofish"
    }

    fn protocol(&self) -> &str {
        "redfish"
    }

    async fn open(&mut self, ctx: &RunContext) -> DriverResult<()> {
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(from_reqwest)?;
        self.http = Some(http);

        let systems = self.request(ctx, Method::GET, SYSTEMS_PATH, None).await?;
        let system = member_paths(&systems).into_iter().next().ok_or_else(|| {
            DriverError::CommandFailed(format!("no systems listed at {SYSTEMS_PATH}"))
        })?;
        self.system_path = Some(system);
        Ok(())
    }

    async fn close(&mut self, _ctx: &RunContext) -> DriverResult<()> {
        self.http = None;
        self.system_path = None;
        Ok(())
    }

    async fn power_state(&mut self, ctx: &RunContext) -> DriverResult<String> {
        let path = self.system_path()?.to_string();
        let system = self.request(ctx, Method::GET, &path, None).await?;
        power_state_of(&system)
    }

    async fn set_power_state(&mut self, ctx: &RunContext, state: &str) -> DriverResult<()> {
        let reset = reset_type(state)?;
        let path = format!("{}/Actions/ComputerSystem.Reset", self.system_path()?);
        self.request(ctx, Method::POST, &path, Some(json!({ "ResetType": reset })))
            .await
            .map(|_| ())
    }

    async fn read_users(&mut self, ctx: &RunContext) -> DriverResult<Vec<String>> {
        let accounts = self.request(ctx, Method::GET, ACCOUNTS_PATH, None).await?;
        let mut users = Vec::new();
        for path in member_paths(&accounts) {
            let account = self.request(ctx, Method::GET, &path, None).await?;
            match account["UserName"].as_str() {
                Some(name) if !name.is_empty() => users.push(name.to_string()),
                _ => {}
            }
        }
        Ok(users)
    }
}
