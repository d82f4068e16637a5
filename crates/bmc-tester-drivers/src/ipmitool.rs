//! IPMI over LAN via the `ipmitool` binary.
//!
//! Every operation shells out to `ipmitool -I lanplus`. The password is
//! handed over through `IPMI_PASSWORD` and `-E` so it never shows up in the
//! process list.

use async_trait::async_trait;
use bmc_tester_core::{DriverError, DriverResult, RunContext};
use tokio::process::Command;
use tracing::debug;

use crate::error::{from_ipmitool_stderr, from_spawn};
use crate::provider::Provider;

/// Default RMCP+ port.
pub const DEFAULT_IPMI_PORT: u16 = 623;

const PROGRAM: &str = "ipmitool";

/// Power states `chassis power` accepts.
const POWER_STATES: [&str; 5] = ["on", "off", "cycle", "reset", "soft"];

#[derive(Clone)]
pub struct IpmitoolProvider {
    host: String,
    port: u16,
    user: String,
    pass: String,
}

impl IpmitoolProvider {
    pub fn new(host: &str, port: u16, user: &str, pass: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "-I".to_string(),
            "lanplus".to_string(),
            "-H".to_string(),
            self.host.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "-U".to_string(),
            self.user.clone(),
            "-E".to_string(),
        ]
    }

    /// Run one ipmitool command and return its stdout.
    async fn execute(&self, ctx: &RunContext, command: &[&str]) -> DriverResult<String> {
        let mut cmd = Command::new(PROGRAM);
        cmd.args(self.base_args())
            .args(command)
            .env("IPMI_PASSWORD", &self.pass)
            .kill_on_drop(true);

        debug!(host = %self.host, command = %command.join(" "), "running ipmitool");

        let output = ctx
            .run(cmd.output())
            .await?
            .map_err(|e| from_spawn(PROGRAM, e))?;

        if !output.status.success() {
            return Err(from_ipmitool_stderr(&String::from_utf8_lossy(
                &output.stderr,
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl std::fmt::Debug for IpmitoolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpmitoolProvider")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Parse `chassis power status` output ("Chassis Power is on").
pub(crate) fn parse_power_status(output: &str) -> DriverResult<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Chassis Power is "))
        .map(|state| state.trim().to_ascii_lowercase())
        .ok_or_else(|| {
            DriverError::CommandFailed(format!(
                "unexpected chassis power status output: {}",
                output.trim()
            ))
        })
}

/// Parse the table printed by `user list <channel>`.
///
/// Slots without a name are skipped.
pub(crate) fn parse_user_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?;
            if id.parse::<u32>().is_err() {
                return None;
            }
            let name = fields.next()?;
            if name == "true" || name == "false" {
                return None;
            }
            Some(name.to_string())
        })
        .collect()
}

#[async_trait]
impl Provider for IpmitoolProvider {
    fn name(&self) -> &str {
        "ipmitool"
    }

    fn protocol(&self) -> &str {
        "ipmi"
    }

    async fn open(&mut self, ctx: &RunContext) -> DriverResult<()> {
        self.execute(ctx, &["mc", "info"]).await.map(|_| ())
    }

    // ipmitool keeps no session between invocations
    async fn close(&mut self, _ctx: &RunContext) -> DriverResult<()> {
        Ok(())
    }

    async fn power_state(&mut self, ctx: &RunContext) -> DriverResult<String> {
        let output = self.execute(ctx, &["chassis", "power", "status"]).await?;
        parse_power_status(&output)
    }

    async fn set_power_state(&mut self, ctx: &RunContext, state: &str) -> DriverResult<()> {
        let state = state.to_ascii_lowercase();
        if !POWER_STATES.contains(&state.as_str()) {
            return Err(DriverError::Unsupported(format!("power state '{state}'")));
        }
        self.execute(ctx, &["chassis", "power", &state])
            .await
            .map(|_| ())
    }

    async fn read_users(&mut self, ctx: &RunContext) -> DriverResult<Vec<String>> {
        let output = self.execute(ctx, &["user", "list", "1"]).await?;
        Ok(parse_user_list(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_args_never_carry_password() {
        let provider = IpmitoolProvider::new("10.0.0.5", 623, "ADMIN", "hunter2");
        let args = provider.base_args();
        assert_eq!(
            args,
            vec!["-I", "lanplus", "-H", "10.0.0.5", "-p", "623", "-U", "ADMIN", "-E"]
        );
        assert!(!format!("{provider:?}").contains("hunter2"));
    }

    #[test]
    fn test_parse_power_status() {
        assert_eq!(parse_power_status("Chassis Power is on\n").unwrap(), "on");
        assert_eq!(parse_power_status("Chassis Power is Off").unwrap(), "off");
        assert!(matches!(
            parse_power_status("garbage"),
            Err(DriverError::CommandFailed(_))
        ));
    }

    #[test]
    fn test_parse_user_list() {
        let output = "\
ID  Name\t     Callin  Link Auth\tIPMI Msg   Channel Priv Limit
1                    true    false      false      NO ACCESS
2   root             false   true       true       ADMINISTRATOR
3   operator         true    true       true       OPERATOR
";
        assert_eq!(parse_user_list(output), vec!["root", "operator"]);
    }

    #[test]
    fn test_parse_user_list_empty() {
        assert!(parse_user_list("").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_power_state_is_rejected_before_spawning() {
        let mut provider = IpmitoolProvider::new("10.0.0.5", 623, "ADMIN", "x");
        let err = provider
            .set_power_state(&RunContext::background(), "hibernate")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DriverError::Unsupported("power state 'hibernate'".to_string())
        );
    }
}
