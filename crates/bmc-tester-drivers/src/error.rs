//! Mapping of transport errors onto [`DriverError`].

use bmc_tester_core::DriverError;

/// Classify a failed HTTP call.
pub(crate) fn from_reqwest(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        return DriverError::Timeout(err.to_string());
    }
    if err.is_connect() {
        return DriverError::ConnectionFailed(err.to_string());
    }
    match err.status() {
        Some(status) if status == reqwest::StatusCode::UNAUTHORIZED => {
            DriverError::AuthenticationFailed(err.to_string())
        }
        _ => DriverError::CommandFailed(err.to_string()),
    }
}

/// Classify a failed process spawn.
pub(crate) fn from_spawn(program: &str, err: std::io::Error) -> DriverError {
    if err.kind() == std::io::ErrorKind::NotFound {
        DriverError::Unsupported(format!("{program} not found in PATH"))
    } else {
        DriverError::CommandFailed(format!("failed to run {program}: {err}"))
    }
}

/// Classify ipmitool's stderr on a non-zero exit.
pub(crate) fn from_ipmitool_stderr(stderr: &str) -> DriverError {
    let message = stderr.trim().to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("rakp") || lower.contains("unauthorized name") || lower.contains("password") {
        DriverError::AuthenticationFailed(message)
    } else if lower.contains("unable to establish") || lower.contains("no response") {
        DriverError::ConnectionFailed(message)
    } else {
        DriverError::CommandFailed(message)
    }
}
