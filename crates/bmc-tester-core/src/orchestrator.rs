//! Fleet-wide orchestration: one tester task per device.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::connection::ConnectionFactory;
use crate::context::RunContext;
use crate::model::{DeviceResult, DeviceSpec, TestResult, TestSpec};
use crate::registry::FeatureRegistry;
use crate::store::ResultStore;
use crate::tester::{DeviceTester, TesterOptions};

/// Runs the same [`TestSpec`] against many devices concurrently.
pub struct Orchestrator {
    registry: Arc<FeatureRegistry>,
    factory: Arc<dyn ConnectionFactory>,
    options: TesterOptions,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<FeatureRegistry>,
        factory: Arc<dyn ConnectionFactory>,
        options: TesterOptions,
    ) -> Self {
        Self {
            registry,
            factory,
            options,
        }
    }

    /// Test every device and return one [`DeviceResult`] per device.
    ///
    /// All devices share a single deadline derived from `ctx` and `timeout`.
    /// The returned order is completion order, not input order.
    #[instrument(skip_all, fields(devices = devices.len(), timeout = ?timeout))]
    pub async fn run_all(
        &self,
        ctx: &RunContext,
        spec: &TestSpec,
        devices: &[DeviceSpec],
        timeout: Duration,
    ) -> Vec<DeviceResult> {
        let ctx = ctx.with_timeout(timeout);
        let spec = Arc::new(spec.clone());
        let store = Arc::new(ResultStore::new());

        let mut tasks: Vec<(DeviceSpec, JoinHandle<()>)> = Vec::with_capacity(devices.len());

        for device in devices {
            let mut tester = DeviceTester::new(
                device.clone(),
                Arc::clone(&self.registry),
                Arc::clone(&self.factory),
                self.options.clone(),
            );
            let spec = Arc::clone(&spec);
            let store = Arc::clone(&store);

            let task = tokio::spawn(async move {
                tester.run(&ctx, &spec).await;
                let device = tester.device().clone();
                let result = DeviceResult::new(&device, tester.into_results());
                store.save(result).await;
            });

            tasks.push((device.clone(), task));
        }

        info!("waiting for tests to complete...");

        for (device, task) in tasks {
            if let Err(e) = task.await {
                error!(
                    device = %device.name,
                    host = %device.host,
                    error = %e,
                    "device tester task failed"
                );
                let results = spec
                    .features
                    .iter()
                    .map(|feature| {
                        TestResult::failed(
                            feature,
                            &spec.protocol,
                            Vec::new(),
                            "tester task panicked",
                        )
                    })
                    .collect();
                store.save(DeviceResult::new(&device, results)).await;
            }
        }

        store.read().await
    }
}
