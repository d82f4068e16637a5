//! Multi-provider BMC client.
//!
//! Opens every eligible provider, then routes each operation to the opened
//! providers in order until one succeeds. The provider that answered is
//! reported through [`ConnectionMetadata::successful_provider`].

use std::time::Duration;

use async_trait::async_trait;
use bmc_tester_core::{
    Connection, ConnectionMetadata, DriverError, DriverResult, DriverSelector, RunContext,
};
use tracing::{debug, warn};

use crate::provider::Provider;

pub struct Client {
    providers: Vec<Box<dyn Provider>>,
    opened: Vec<usize>,
    protocol: String,
    per_provider_timeout: Duration,
    metadata: ConnectionMetadata,
}

impl Client {
    /// Build a client from every registered provider, narrowed and ordered
    /// by `selector`.
    ///
    /// With protocol filtering on, only providers speaking the requested
    /// protocol stay eligible. The selected provider is always tried first.
    pub fn from_selector(providers: Vec<Box<dyn Provider>>, selector: &DriverSelector) -> Self {
        let mut providers: Vec<Box<dyn Provider>> = if selector.filter_by_protocol {
            providers
                .into_iter()
                .filter(|p| p.protocol() == selector.protocol)
                .collect()
        } else {
            providers
        };
        providers.sort_by_key(|p| p.name() != selector.provider);

        Self {
            providers,
            opened: Vec::new(),
            protocol: selector.protocol.clone(),
            per_provider_timeout: selector.per_provider_timeout,
            metadata: ConnectionMetadata::default(),
        }
    }

    /// Names of the eligible providers, in attempt order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    fn answered(&mut self, index: usize) {
        self.metadata.successful_provider = self.providers[index].name().to_string();
    }
}

/// Collapse per-provider failures into one error.
fn combine(mut errors: Vec<(String, DriverError)>) -> DriverError {
    match errors.len() {
        0 => DriverError::ConnectionFailed("connection is not open".to_string()),
        1 => errors.remove(0).1,
        _ => DriverError::AllProvidersFailed(
            errors
                .into_iter()
                .map(|(name, err)| format!("{name}: {err}"))
                .collect(),
        ),
    }
}

#[async_trait]
impl Connection for Client {
    async fn open(&mut self, ctx: &RunContext) -> DriverResult<()> {
        if self.providers.is_empty() {
            return Err(DriverError::NoProviders(self.protocol.clone()));
        }

        self.opened.clear();
        self.metadata.providers_attempted.clear();
        let mut errors = Vec::new();

        for (index, provider) in self.providers.iter_mut().enumerate() {
            let name = provider.name().to_string();
            self.metadata.providers_attempted.push(name.clone());

            let provider_ctx = ctx.with_timeout(self.per_provider_timeout);
            let outcome = match provider_ctx.run(provider.open(&provider_ctx)).await {
                Ok(outcome) => outcome,
                Err(deadline) => Err(deadline.into()),
            };

            match outcome {
                Ok(()) => {
                    debug!(provider = %name, "provider opened");
                    self.opened.push(index);
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "provider failed to open");
                    errors.push((name, e));
                }
            }
        }

        if self.opened.is_empty() {
            return Err(combine(errors));
        }
        Ok(())
    }

    async fn close(&mut self, ctx: &RunContext) -> DriverResult<()> {
        let mut first_error = None;
        for index in std::mem::take(&mut self.opened) {
            let provider = &mut self.providers[index];
            if let Err(e) = provider.close(ctx).await {
                debug!(provider = %provider.name(), error = %e, "provider close failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn metadata(&self) -> ConnectionMetadata {
        self.metadata.clone()
    }

    async fn power_state(&mut self, ctx: &RunContext) -> DriverResult<String> {
        let mut errors = Vec::new();
        for index in self.opened.clone() {
            let provider = &mut self.providers[index];
            match provider.power_state(ctx).await {
                Ok(state) => {
                    self.answered(index);
                    return Ok(state);
                }
                Err(e) => errors.push((provider.name().to_string(), e)),
            }
        }
        Err(combine(errors))
    }

    async fn set_power_state(&mut self, ctx: &RunContext, state: &str) -> DriverResult<()> {
        let mut errors = Vec::new();
        for index in self.opened.clone() {
            let provider = &mut self.providers[index];
            match provider.set_power_state(ctx, state).await {
                Ok(()) => {
                    self.answered(index);
                    return Ok(());
                }
                Err(e) => errors.push((provider.name().to_string(), e)),
            }
        }
        Err(combine(errors))
    }

    async fn read_users(&mut self, ctx: &RunContext) -> DriverResult<Vec<String>> {
        let mut errors = Vec::new();
        for index in self.opened.clone() {
            let provider = &mut self.providers[index];
            match provider.read_users(ctx).await {
                Ok(users) => {
                    self.answered(index);
                    return Ok(users);
                }
                Err(e) => errors.push((provider.name().to_string(), e)),
            }
        }
        Err(combine(errors))
    }
}
