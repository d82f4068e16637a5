//! In-memory fakes for the driver seam (testing only)
//!
//! Provides `FakeConnection` and `FakeConnectionFactory` that satisfy the
//! [`Connection`]/[`ConnectionFactory`] contracts without touching a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::connection::{Connection, ConnectionFactory, ConnectionMetadata, DriverSelector};
use crate::context::RunContext;
use crate::error::{DriverError, DriverResult};
use crate::model::DeviceSpec;

// ---------------------------------------------------------------------------
// FakeConnection
// ---------------------------------------------------------------------------

/// What a fake connection observed. Shared between clones.
#[derive(Debug, Default, Clone)]
pub struct FakeLog {
    pub opens: u32,
    pub closes: u32,
    /// Whether the close context still had time left when close ran.
    pub close_ctx_live: Option<bool>,
    pub power_requests: Vec<String>,
    pub operations: Vec<String>,
}

/// Scripted connection. Clones share the same [`FakeLog`].
#[derive(Debug, Clone)]
pub struct FakeConnection {
    provider: String,
    power_state: String,
    users: Vec<String>,
    open_error: Option<DriverError>,
    power_error: Option<DriverError>,
    users_error: Option<DriverError>,
    close_error: Option<DriverError>,
    op_delay: Duration,
    metadata: ConnectionMetadata,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeConnection {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            power_state: "on".to_string(),
            users: vec!["root".to_string()],
            open_error: None,
            power_error: None,
            users_error: None,
            close_error: None,
            op_delay: Duration::ZERO,
            metadata: ConnectionMetadata::default(),
            log: Arc::new(Mutex::new(FakeLog::default())),
        }
    }

    /// A connection whose open always fails with a connection error.
    pub fn unreachable(provider: &str, reason: &str) -> Self {
        Self::new(provider).failing_open(DriverError::ConnectionFailed(reason.to_string()))
    }

    pub fn with_power_state(mut self, state: &str) -> Self {
        self.power_state = state.to_string();
        self
    }

    pub fn with_users(mut self, users: Vec<String>) -> Self {
        self.users = users;
        self
    }

    /// Every operation sleeps this long, bounded by the caller's context.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    pub fn failing_open(mut self, err: DriverError) -> Self {
        self.open_error = Some(err);
        self
    }

    pub fn failing_power(mut self, err: DriverError) -> Self {
        self.power_error = Some(err);
        self
    }

    pub fn failing_users(mut self, err: DriverError) -> Self {
        self.users_error = Some(err);
        self
    }

    pub fn failing_close(mut self, err: DriverError) -> Self {
        self.close_error = Some(err);
        self
    }

    pub fn log(&self) -> FakeLog {
        self.log.lock().unwrap().clone()
    }

    pub fn power_requests(&self) -> Vec<String> {
        self.log().power_requests
    }

    async fn operate(&mut self, ctx: &RunContext, name: &str) -> DriverResult<()> {
        self.log.lock().unwrap().operations.push(name.to_string());
        if !self.op_delay.is_zero() {
            ctx.run(tokio::time::sleep(self.op_delay)).await?;
        }
        Ok(())
    }

    fn answered(&mut self) {
        self.metadata.successful_provider = self.provider.clone();
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn open(&mut self, ctx: &RunContext) -> DriverResult<()> {
        self.log.lock().unwrap().opens += 1;
        self.metadata.providers_attempted = vec![self.provider.clone()];
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        if !self.op_delay.is_zero() {
            ctx.run(tokio::time::sleep(self.op_delay)).await?;
        }
        Ok(())
    }

    async fn close(&mut self, ctx: &RunContext) -> DriverResult<()> {
        {
            let mut log = self.log.lock().unwrap();
            log.closes += 1;
            log.close_ctx_live = Some(!ctx.is_expired());
        }
        match &self.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn metadata(&self) -> ConnectionMetadata {
        self.metadata.clone()
    }

    async fn power_state(&mut self, ctx: &RunContext) -> DriverResult<String> {
        self.operate(ctx, "power_state").await?;
        if let Some(err) = &self.power_error {
            return Err(err.clone());
        }
        self.answered();
        Ok(self.power_state.clone())
    }

    async fn set_power_state(&mut self, ctx: &RunContext, state: &str) -> DriverResult<()> {
        self.operate(ctx, "set_power_state").await?;
        if let Some(err) = &self.power_error {
            return Err(err.clone());
        }
        self.log.lock().unwrap().power_requests.push(state.to_string());
        self.power_state = state.to_string();
        self.answered();
        Ok(())
    }

    async fn read_users(&mut self, ctx: &RunContext) -> DriverResult<Vec<String>> {
        self.operate(ctx, "read_users").await?;
        if let Some(err) = &self.users_error {
            return Err(err.clone());
        }
        self.answered();
        Ok(self.users.clone())
    }
}

// ---------------------------------------------------------------------------
// FakeConnectionFactory
// ---------------------------------------------------------------------------

/// Hands out scripted connections keyed by device host.
///
/// Hosts without a script get a connection that fails to open, the way an
/// unreachable BMC would.
#[derive(Debug, Default)]
pub struct FakeConnectionFactory {
    scripts: HashMap<String, FakeConnection>,
    refused: HashMap<String, DriverError>,
    selectors: Mutex<Vec<DriverSelector>>,
}

impl FakeConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, host: &str, conn: FakeConnection) -> Self {
        self.scripts.insert(host.to_string(), conn);
        self
    }

    /// Make `connect` itself fail for `host`.
    pub fn refusing(mut self, host: &str, err: DriverError) -> Self {
        self.refused.insert(host.to_string(), err);
        self
    }

    /// The script registered for `host`, sharing its log.
    pub fn script(&self, host: &str) -> Option<&FakeConnection> {
        self.scripts.get(host)
    }

    /// Selectors received by `connect`, in call order.
    pub fn selectors(&self) -> Vec<DriverSelector> {
        self.selectors.lock().unwrap().clone()
    }
}

impl ConnectionFactory for FakeConnectionFactory {
    fn connect(
        &self,
        device: &DeviceSpec,
        selector: &DriverSelector,
    ) -> DriverResult<Box<dyn Connection>> {
        self.selectors.lock().unwrap().push(selector.clone());
        if let Some(err) = self.refused.get(&device.host) {
            return Err(err.clone());
        }
        let conn = match self.scripts.get(&device.host) {
            Some(script) => script.clone(),
            None => FakeConnection::unreachable(
                &selector.provider,
                &format!("dial tcp {}: no route to host", device.host),
            ),
        };
        Ok(Box::new(conn))
    }
}
