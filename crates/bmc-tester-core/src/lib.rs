//! BMC Tester Core - per-device BMC test orchestration
//!
//! Provides the pieces that turn a feature list and a hardware inventory
//! into one report:
//! - Resolves feature names to test procedures (`registry`)
//! - Runs them against one device over a managed connection (`tester`)
//! - Fans out over the fleet under one deadline (`orchestrator`)
//! - Collects per-device results (`store`, `report`)
//!
//! The BMC wire protocols live behind the [`Connection`] and
//! [`ConnectionFactory`] traits and are provided by a driver crate.

pub mod config;
pub mod connection;
pub mod context;
pub mod duration;
pub mod error;
pub mod fakes;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod store;
pub mod telemetry;
pub mod tester;

// Re-export key types
pub use config::{
    load_hardware, load_tests, MergedConfig, SUPPORTED_PROTOCOLS, SUPPORTED_PROVIDERS,
};
pub use connection::{Connection, ConnectionFactory, ConnectionMetadata, DriverSelector};
pub use context::{DeadlineExceeded, RunContext};
pub use error::{ConfigError, DriverError, DriverResult, RegistryError, TestError};
pub use model::{DeviceResult, DeviceSpec, HardwareConfig, TestResult, TestSpec};
pub use orchestrator::Orchestrator;
pub use registry::{Feature, FeatureRegistry, ResolvedFeature, ResolvedTest, TestProcedure};
pub use report::RunReport;
pub use store::ResultStore;
pub use telemetry::{init_tracing, parse_log_level};
pub use tester::{DeviceTester, TesterOptions, LOGIN_TIMEOUT, LOGOUT_TIMEOUT};
