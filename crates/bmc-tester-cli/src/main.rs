//! bmc-tester - exercise BMC features across a fleet
//!
//! ## Commands
//!
//! - `list`: Print the loaded hardware and tests configuration
//! - `run`: Run every configured feature against every device and print a
//!   JSON report on stdout

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bmc_tester_core::{
    load_hardware, load_tests, ConnectionFactory, FeatureRegistry, HardwareConfig, MergedConfig,
    Orchestrator, RunContext, RunReport, TestSpec, TesterOptions,
};
use bmc_tester_drivers::DriverFactory;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "bmc-tester")]
#[command(author = "BMC Toolbox Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test BMC features across a fleet of servers", long_about = None)]
struct Cli {
    /// Log level: trace, debug or info
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the hardware and tests configuration
    List(ConfigArgs),

    /// Run the configured tests against every device
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Overall deadline shared by all devices
        #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
        timeout: Duration,

        /// Let every driver try each device regardless of protocol
        #[arg(long)]
        disable_filtering: bool,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Tests configuration file (YAML)
    #[arg(long, env = "BMC_TESTER_TESTS")]
    tests: PathBuf,

    /// Hardware configuration file (YAML)
    #[arg(long, env = "BMC_TESTER_HARDWARE")]
    hardware: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    bmc_tester_core::init_tracing(
        cli.json_logs,
        bmc_tester_core::parse_log_level(&cli.log_level),
    );

    match cli.command {
        Commands::List(config) => cmd_list(&config),
        Commands::Run {
            config,
            timeout,
            disable_filtering,
        } => {
            let factory: Arc<dyn ConnectionFactory> = Arc::new(DriverFactory::new());
            cmd_run(&config, timeout, disable_filtering, factory).await
        }
    }
}

fn builtin_registry() -> Result<FeatureRegistry> {
    FeatureRegistry::builtin().context("Failed to build feature registry")
}

fn load_config(
    config: &ConfigArgs,
    registry: &FeatureRegistry,
) -> Result<(TestSpec, HardwareConfig)> {
    let tests = load_tests(&config.tests, registry)
        .with_context(|| format!("Failed to load tests config {}", config.tests.display()))?;
    let hardware = load_hardware(&config.hardware).with_context(|| {
        format!("Failed to load hardware config {}", config.hardware.display())
    })?;
    Ok((tests, hardware))
}

fn cmd_list(config: &ConfigArgs) -> Result<()> {
    let registry = builtin_registry()?;
    let (tests, hardware) = load_config(config, &registry)?;
    let merged = MergedConfig { hardware, tests };
    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(())
}

async fn cmd_run(
    config: &ConfigArgs,
    timeout: Duration,
    disable_filtering: bool,
    factory: Arc<dyn ConnectionFactory>,
) -> Result<()> {
    let report = run_report(config, timeout, disable_filtering, factory).await?;
    println!("{}", report.to_json_pretty()?);
    Ok(())
}

/// Load both configs and test the whole fleet. Failed tests land in the
/// report; only configuration problems are errors.
async fn run_report(
    config: &ConfigArgs,
    timeout: Duration,
    disable_filtering: bool,
    factory: Arc<dyn ConnectionFactory>,
) -> Result<RunReport> {
    let registry = builtin_registry()?;
    let (tests, hardware) = load_config(config, &registry)?;

    let options = TesterOptions {
        disable_filtering,
        ..TesterOptions::default()
    };
    let orchestrator = Orchestrator::new(Arc::new(registry), factory, options);

    let started_at = Utc::now();
    info!(
        devices = hardware.devices.len(),
        features = tests.features.len(),
        protocol = %tests.protocol,
        provider = %tests.provider,
        "starting bmc tests"
    );
    let results = orchestrator
        .run_all(&RunContext::background(), &tests, &hardware.devices, timeout)
        .await;

    let report = RunReport::new(bmc_tester_drivers::VERSION, started_at, results);
    info!(
        run_id = %report.run_id,
        passed = report.passed_count(),
        failed = report.failed_count(),
        "bmc tests finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmc_tester_core::fakes::{FakeConnection, FakeConnectionFactory};
    use clap::CommandFactory;

    const TESTS_YAML: &str = "\
protocol: ipmi
provider: ipmitool
features:
  - powerState
  - userRead
";

    const HARDWARE_YAML: &str = "\
devices:
  - name: node-1
    vendor: dell
    model: r640
    bmcHost: 10.0.0.1
    bmcUser: root
    bmcPass: calvin
    ipmiPort: 623
  - name: node-2
    vendor: supermicro
    model: x11
    bmcHost: 10.0.0.2
    bmcUser: ADMIN
    bmcPass: ADMIN
    ipmiPort: \"623\"
";

    fn write_configs(dir: &tempfile::TempDir, tests: &str, hardware: &str) -> ConfigArgs {
        let tests_path = dir.path().join("tests.yaml");
        let hardware_path = dir.path().join("hardware.yaml");
        std::fs::write(&tests_path, tests).unwrap();
        std::fs::write(&hardware_path, hardware).unwrap();
        ConfigArgs {
            tests: tests_path,
            hardware: hardware_path,
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "bmc-tester",
            "--log-level",
            "debug",
            "run",
            "--tests",
            "t.yaml",
            "--hardware",
            "h.yaml",
            "--timeout",
            "90s",
            "--disable-filtering",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "debug");
        assert!(!cli.json_logs);
        match cli.command {
            Commands::Run {
                config,
                timeout,
                disable_filtering,
            } => {
                assert_eq!(config.tests, PathBuf::from("t.yaml"));
                assert_eq!(timeout, Duration::from_secs(90));
                assert!(disable_filtering);
            }
            Commands::List(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_timeout_defaults_to_one_minute() {
        let cli = Cli::try_parse_from([
            "bmc-tester",
            "run",
            "--tests",
            "t.yaml",
            "--hardware",
            "h.yaml",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { timeout, .. } => assert_eq!(timeout, Duration::from_secs(60)),
            Commands::List(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let result = Cli::try_parse_from([
            "bmc-tester",
            "run",
            "--tests",
            "t",
            "--hardware",
            "h",
            "--timeout",
            "soon",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_loads_both_configs() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_configs(&dir, TESTS_YAML, HARDWARE_YAML);
        assert!(cmd_list(&config).is_ok());
    }

    #[test]
    fn test_unknown_feature_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let tests = "protocol: ipmi\nprovider: ipmitool\nfeatures: [powerstate, firmwareupdate]\n";
        let config = write_configs(&dir, tests, HARDWARE_YAML);

        let err = cmd_list(&config).unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("unknown bmclib feature defined in test: firmwareupdate"));
    }

    #[tokio::test]
    async fn test_run_report_covers_every_device() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_configs(&dir, TESTS_YAML, HARDWARE_YAML);
        let factory = Arc::new(FakeConnectionFactory::new().with_device(
            "10.0.0.1",
            FakeConnection::new("ipmitool").with_users(vec!["root".into(), "admin".into()]),
        ));

        let report = run_report(&config, Duration::from_secs(30), false, factory)
            .await
            .unwrap();

        assert_eq!(report.bmclib_version, bmc_tester_drivers::VERSION);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.failed_count(), 2);

        let node1 = report
            .results
            .iter()
            .find(|r| r.name == "node-1")
            .unwrap();
        assert_eq!(node1.results[1].output, "root,admin");
    }

    #[tokio::test]
    async fn test_run_forwards_disable_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_configs(&dir, TESTS_YAML, HARDWARE_YAML);
        let factory = Arc::new(FakeConnectionFactory::new());

        run_report(&config, Duration::from_secs(30), true, factory.clone())
            .await
            .unwrap();

        let selectors = factory.selectors();
        assert_eq!(selectors.len(), 2);
        assert!(selectors.iter().all(|s| !s.filter_by_protocol));
    }

    #[tokio::test]
    async fn test_run_accepts_timeout_beyond_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_configs(&dir, TESTS_YAML, HARDWARE_YAML);
        let factory = Arc::new(
            FakeConnectionFactory::new()
                .with_device("10.0.0.1", FakeConnection::new("ipmitool"))
                .with_device("10.0.0.2", FakeConnection::new("ipmitool")),
        );
        let timeout = humantime::parse_duration("300000000000years").unwrap();

        let report = run_report(&config, timeout, false, factory).await.unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.failed_count(), 0);
    }
}
