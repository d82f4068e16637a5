//! Feature registry: feature names to test procedures.

use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::context::RunContext;
use crate::error::{RegistryError, TestError};

/// A test procedure: runs one feature against an open connection and returns
/// its output.
pub type TestProcedure = for<'a> fn(
    &'a RunContext,
    &'a mut dyn Connection,
) -> BoxFuture<'a, Result<String, TestError>>;

/// Builtin BMC features.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Read chassis power state
    PowerState,

    /// Set chassis power state
    PowerSet,

    /// Set next boot device
    BootDeviceSet,

    /// Cold/warm reset of the BMC
    BmcReset,

    /// List BMC user accounts
    UserRead,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::PowerState,
        Feature::PowerSet,
        Feature::BootDeviceSet,
        Feature::BmcReset,
        Feature::UserRead,
    ];

    /// Get the feature name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::PowerState => "powerstate",
            Feature::PowerSet => "powerset",
            Feature::BootDeviceSet => "bootdeviceset",
            Feature::BmcReset => "bmcreset",
            Feature::UserRead => "userread",
        }
    }

    /// Get the feature's test procedure.
    fn procedure(&self) -> TestProcedure {
        match self {
            Feature::PowerState => power_state,
            Feature::PowerSet => power_set,
            Feature::BootDeviceSet => boot_device_set,
            Feature::BmcReset => bmc_reset,
            Feature::UserRead => user_read,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A feature paired with the procedure that tests it.
#[derive(Clone, Copy)]
pub struct ResolvedTest {
    /// Registered feature name.
    pub feature: &'static str,
    pub procedure: TestProcedure,
}

impl fmt::Debug for ResolvedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedTest")
            .field("feature", &self.feature)
            .finish_non_exhaustive()
    }
}

/// Resolution output: the configured spelling plus the procedure.
#[derive(Debug, Clone)]
pub struct ResolvedFeature {
    pub name: String,
    pub test: ResolvedTest,
}

/// Immutable name -> procedure table.
///
/// Lookups are case-insensitive so `powerState` and `powerstate` resolve to
/// the same procedure.
#[derive(Debug, Clone)]
pub struct FeatureRegistry {
    entries: Vec<ResolvedTest>,
}

impl FeatureRegistry {
    /// Build a registry from explicit entries, rejecting empty or duplicate
    /// names.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (&'static str, TestProcedure)>,
    ) -> Result<Self, RegistryError> {
        let mut table: Vec<ResolvedTest> = Vec::new();
        for (name, procedure) in entries {
            if name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if table.iter().any(|e| e.feature.eq_ignore_ascii_case(name)) {
                return Err(RegistryError::DuplicateProcedure(name.to_string()));
            }
            table.push(ResolvedTest {
                feature: name,
                procedure,
            });
        }
        Ok(Self { entries: table })
    }

    /// The builtin registry covering every [`Feature`].
    ///
    /// Fails if any builtin feature ends up without exactly one procedure.
    pub fn builtin() -> Result<Self, RegistryError> {
        let registry =
            Self::from_entries(Feature::ALL.iter().map(|f| (f.name(), f.procedure())))?;
        for feature in Feature::ALL {
            if registry.lookup(feature.name()).is_none() {
                return Err(RegistryError::MissingProcedure(feature.name().to_string()));
            }
        }
        Ok(registry)
    }

    fn lookup(&self, name: &str) -> Option<&ResolvedTest> {
        self.entries
            .iter()
            .find(|e| e.feature.eq_ignore_ascii_case(name.trim()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Registered feature names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.feature)
    }

    /// Resolve `names` in order. All-or-nothing: the first unknown name
    /// fails the whole resolution.
    pub fn resolve<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<ResolvedFeature>, RegistryError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.lookup(name)
                    .map(|test| ResolvedFeature {
                        name: name.to_string(),
                        test: *test,
                    })
                    .ok_or_else(|| RegistryError::UnknownFeature(name.to_string()))
            })
            .collect()
    }
}

fn power_state<'a>(
    ctx: &'a RunContext,
    conn: &'a mut dyn Connection,
) -> BoxFuture<'a, Result<String, TestError>> {
    Box::pin(async move { Ok(conn.power_state(ctx).await?) })
}

// Re-applies the current state so the host is never power cycled.
fn power_set<'a>(
    ctx: &'a RunContext,
    conn: &'a mut dyn Connection,
) -> BoxFuture<'a, Result<String, TestError>> {
    Box::pin(async move {
        let state = conn.power_state(ctx).await?;
        conn.set_power_state(ctx, &state).await?;
        Ok(state)
    })
}

fn user_read<'a>(
    ctx: &'a RunContext,
    conn: &'a mut dyn Connection,
) -> BoxFuture<'a, Result<String, TestError>> {
    Box::pin(async move { Ok(conn.read_users(ctx).await?.join(",")) })
}

// TODO: exercise boot device set once drivers can restore the previous
// boot override afterwards.
fn boot_device_set<'a>(
    _ctx: &'a RunContext,
    _conn: &'a mut dyn Connection,
) -> BoxFuture<'a, Result<String, TestError>> {
    Box::pin(async move {
        Err(TestError::NotImplemented(Feature::BootDeviceSet.name().to_string()))
    })
}

fn bmc_reset<'a>(
    _ctx: &'a RunContext,
    _conn: &'a mut dyn Connection,
) -> BoxFuture<'a, Result<String, TestError>> {
    Box::pin(async move { Err(TestError::NotImplemented(Feature::BmcReset.name().to_string())) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeConnection;

    fn noop<'a>(
        _ctx: &'a RunContext,
        _conn: &'a mut dyn Connection,
    ) -> BoxFuture<'a, Result<String, TestError>> {
        Box::pin(async move { Ok(String::new()) })
    }

    #[test]
    fn test_builtin_covers_every_feature() {
        let registry = FeatureRegistry::builtin().expect("builtin registry");
        for feature in Feature::ALL {
            assert!(registry.contains(feature.name()), "{feature} missing");
        }
        assert_eq!(registry.names().count(), Feature::ALL.len());
    }

    #[test]
    fn test_resolve_preserves_order_and_spelling() {
        let registry = FeatureRegistry::builtin().expect("builtin registry");
        let resolved = registry
            .resolve(&["userRead", "powerState", "powerstate"])
            .expect("resolve failed");

        let names: Vec<_> = resolved.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["userRead", "powerState", "powerstate"]);
        assert_eq!(resolved[1].test.feature, "powerstate");
    }

    #[test]
    fn test_resolve_unknown_feature_is_all_or_nothing() {
        let registry = FeatureRegistry::builtin().expect("builtin registry");
        let err = registry
            .resolve(&["powerstate", "firmwareinstall", "userread"])
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownFeature("firmwareinstall".to_string()));
    }

    #[test]
    fn test_from_entries_rejects_duplicates_and_empty_names() {
        let err = FeatureRegistry::from_entries([
            ("a", noop as TestProcedure),
            ("A", noop as TestProcedure),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateProcedure("A".to_string()));

        let err = FeatureRegistry::from_entries([(" ", noop as TestProcedure)]).unwrap_err();
        assert_eq!(err, RegistryError::EmptyName);
    }

    #[test]
    fn test_feature_serde_names() {
        let json = serde_json::to_string(&Feature::BootDeviceSet).expect("serialize");
        assert_eq!(json, "\"bootdeviceset\"");
    }

    #[tokio::test]
    async fn test_power_set_reapplies_current_state() {
        let mut conn = FakeConnection::new("ipmitool").with_power_state("off");
        let ctx = RunContext::background();
        let output = power_set(&ctx, &mut conn).await.expect("power_set failed");
        assert_eq!(output, "off");
        assert_eq!(conn.power_requests(), vec!["off".to_string()]);
    }

    #[tokio::test]
    async fn test_disruptive_features_report_not_implemented() {
        let mut conn = FakeConnection::new("ipmitool");
        let ctx = RunContext::background();
        let err = bmc_reset(&ctx, &mut conn).await.unwrap_err();
        assert_eq!(err, TestError::NotImplemented("bmcreset".to_string()));

        let err = boot_device_set(&ctx, &mut conn).await.unwrap_err();
        assert_eq!(err, TestError::NotImplemented("bootdeviceset".to_string()));
    }

    #[tokio::test]
    async fn test_user_read_joins_names() {
        let mut conn =
            FakeConnection::new("gofish").with_users(vec!["root".to_string(), "ops".to_string()]);
        let ctx = RunContext::background();
        let output = user_read(&ctx, &mut conn).await.expect("user_read failed");
        assert_eq!(output, "root,ops");
    }
}
