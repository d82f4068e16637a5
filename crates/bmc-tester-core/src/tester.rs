//! Per-device test execution.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::connection::{Connection, ConnectionFactory, DriverSelector};
use crate::context::RunContext;
use crate::error::TestError;
use crate::model::{DeviceSpec, TestResult, TestSpec};
use crate::registry::{FeatureRegistry, ResolvedFeature};

/// Upper bound for opening each provider.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound for closing a connection, independent of the run deadline.
pub const LOGOUT_TIMEOUT: Duration = Duration::from_secs(60);

/// Knobs shared by every device tester in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesterOptions {
    pub login_timeout: Duration,
    pub logout_timeout: Duration,
    /// Let every registered driver try the device, not just those speaking
    /// the configured protocol.
    pub disable_filtering: bool,
}

impl Default for TesterOptions {
    fn default() -> Self {
        Self {
            login_timeout: LOGIN_TIMEOUT,
            logout_timeout: LOGOUT_TIMEOUT,
            disable_filtering: false,
        }
    }
}

/// Runs an ordered feature list against one device.
///
/// The tester owns its connection for the whole run. A failing test is
/// recorded and the next one runs; only configuration problems stop the
/// device early, and even then the tester returns normally.
pub struct DeviceTester {
    device: DeviceSpec,
    registry: Arc<FeatureRegistry>,
    factory: Arc<dyn ConnectionFactory>,
    options: TesterOptions,
    results: Vec<TestResult>,
}

impl DeviceTester {
    pub fn new(
        device: DeviceSpec,
        registry: Arc<FeatureRegistry>,
        factory: Arc<dyn ConnectionFactory>,
        options: TesterOptions,
    ) -> Self {
        Self {
            device,
            registry,
            factory,
            options,
            results: Vec::new(),
        }
    }

    pub fn device(&self) -> &DeviceSpec {
        &self.device
    }

    /// Results recorded by the last [`run`](Self::run), in feature order.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<TestResult> {
        self.results
    }

    /// Execute every feature in `spec` against the device.
    #[instrument(skip_all, fields(device = %self.device.name, host = %self.device.host))]
    pub async fn run(&mut self, ctx: &RunContext, spec: &TestSpec) {
        self.results.clear();

        let tests = match self.registry.resolve(&spec.features) {
            Ok(tests) => tests,
            Err(e) => {
                error!(error = %e, "tester init error");
                return;
            }
        };

        if spec.provider.is_empty() || spec.protocol.is_empty() {
            error!(
                provider = %spec.provider,
                protocol = %spec.protocol,
                "tester init error: provider and protocol are required"
            );
            return;
        }

        let selector = DriverSelector {
            provider: spec.provider.clone(),
            protocol: spec.protocol.clone(),
            filter_by_protocol: !self.options.disable_filtering,
            per_provider_timeout: self.options.login_timeout,
        };

        let mut conn = match self.factory.connect(&self.device, &selector) {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "failed to build connection");
                self.fail_all(&tests, &spec.protocol, Vec::new(), &e);
                return;
            }
        };

        let login_ctx = ctx.with_timeout(self.options.login_timeout);
        if let Err(e) = conn.open(&login_ctx).await {
            warn!(error = %e, "failed to open connection");
            let attempted = conn.metadata().providers_attempted;
            self.fail_all(&tests, &spec.protocol, attempted, &e);
            self.close(conn.as_mut()).await;
            return;
        }

        info!(tests = tests.len(), "connection open, running tests");

        for test in &tests {
            let result = self.run_one(ctx, conn.as_mut(), test, &spec.protocol).await;
            self.results.push(result);
        }

        self.close(conn.as_mut()).await;

        let passed = self.results.iter().filter(|r| r.succeeded).count();
        info!(passed, failed = self.results.len() - passed, "device tests finished");
    }

    async fn run_one(
        &self,
        ctx: &RunContext,
        conn: &mut dyn Connection,
        test: &ResolvedFeature,
        protocol: &str,
    ) -> TestResult {
        debug!(feature = %test.name, "running test");

        let start = Instant::now();
        let outcome = match ctx.check() {
            Ok(()) => (test.test.procedure)(ctx, conn).await,
            Err(e) => Err(TestError::from(e)),
        };
        let runtime = start.elapsed();
        let metadata = conn.metadata();

        let mut result = TestResult {
            feature: test.name.clone(),
            protocol: protocol.to_string(),
            providers_attempted: metadata.providers_attempted,
            successful_provider: metadata.successful_provider,
            output: String::new(),
            error: String::new(),
            succeeded: false,
            runtime,
        };

        match outcome {
            Ok(output) => {
                debug!(
                    feature = %test.name,
                    runtime_ms = runtime.as_millis() as u64,
                    "test successful"
                );
                result.succeeded = true;
                result.output = output;
            }
            Err(e) => {
                debug!(feature = %test.name, error = %e, "test failed");
                result.error = e.to_string();
            }
        }

        result
    }

    fn fail_all(
        &mut self,
        tests: &[ResolvedFeature],
        protocol: &str,
        providers_attempted: Vec<String>,
        err: &dyn std::fmt::Display,
    ) {
        self.results = tests
            .iter()
            .map(|test| TestResult::failed(&test.name, protocol, providers_attempted.clone(), err))
            .collect();
    }

    // Runs on its own deadline so an expired run context cannot skip it.
    async fn close(&self, conn: &mut dyn Connection) {
        let close_ctx = RunContext::background().with_timeout(self.options.logout_timeout);
        match close_ctx.run(conn.close(&close_ctx)).await {
            Ok(Ok(())) => debug!("connection closed"),
            Ok(Err(e)) => debug!(error = %e, "connection close failed"),
            Err(e) => debug!(error = %e, "connection close timed out"),
        }
    }
}
