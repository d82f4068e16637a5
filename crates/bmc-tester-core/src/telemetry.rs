//! Tracing initialisation for the tester binary.
//!
//! Logs go to stderr so stdout carries nothing but the JSON report.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Map a `--log-level` value to a tracing level. Unknown values mean info.
pub fn parse_log_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        _ => Level::INFO,
    }
}

/// Initialise the global tracing subscriber.
///
/// Events are written to stderr because stdout carries the JSON document
/// printed by `run` and `list`. `RUST_LOG` wins over `level` when set.
/// Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    // Exactly one of the two layers is installed.
    let (plain, structured) = if json {
        let layer = fmt::layer().json().with_writer(std::io::stderr);
        (None, Some(layer))
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(plain)
        .with(structured)
        .try_init()
        .ok();
}
