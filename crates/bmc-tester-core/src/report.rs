//! Final run report.
//!
//! The `run` subcommand prints exactly one [`RunReport`] as pretty JSON on
//! stdout. The document parses back into an identical value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::DeviceResult;

/// Aggregate results for one run across the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Version of the driver library that produced the results.
    pub bmclib_version: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Device results in completion order.
    pub results: Vec<DeviceResult>,
}

impl RunReport {
    pub fn new(
        bmclib_version: impl Into<String>,
        started_at: DateTime<Utc>,
        results: Vec<DeviceResult>,
    ) -> Self {
        Self {
            bmclib_version: bmclib_version.into(),
            run_id: Uuid::new_v4(),
            started_at,
            results,
        }
    }

    /// Number of feature results that passed, across all devices.
    pub fn passed_count(&self) -> usize {
        self.results.iter().map(DeviceResult::passed_count).sum()
    }

    /// Number of feature results that failed, across all devices.
    pub fn failed_count(&self) -> usize {
        self.results.iter().map(DeviceResult::failed_count).sum()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
