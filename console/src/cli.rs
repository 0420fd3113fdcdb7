//! Command-line surface of `amlctl` and the text rendering of rules.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use aml_rule_store::{Rule, RuleId, RuleStatus};
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::app::ConsoleConfig;
use crate::http_client::ClientConfig;
use crate::local_storage::StorageConfig;

#[derive(Debug, Parser)]
#[command(name = "amlctl")]
#[command(about = "Manage AML detection rules", long_about = None, version)]
pub struct Cli {
    /// Base address of the rules API
    #[arg(long, env = "AML_API_BASE_URL", default_value = "http://localhost:3000/api", global = true)]
    pub base_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "AML_API_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub timeout_secs: u64,

    /// Local state database (token and cached rules)
    #[arg(long, env = "AML_STATE_DB", default_value = "./var/data/console.db", global = true)]
    pub state_db: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List and change detection rules
    #[command(subcommand)]
    Rules(RuleCommand),

    /// Store the bearer token sent with every request
    Login {
        #[arg(long)]
        token: String,
    },

    /// Forget the stored bearer token
    Logout,
}

#[derive(Debug, Subcommand)]
pub enum RuleCommand {
    /// Refresh from the server and print all rules
    List {
        /// Print the cached rules without contacting the server
        #[arg(long)]
        offline: bool,
    },

    /// Print one rule
    Show { id: RuleId },

    /// Enable a rule
    Enable { id: RuleId },

    /// Disable a rule
    Disable { id: RuleId },

    /// Set a rule's status (enabled/disabled, 启用/禁用)
    SetStatus { id: RuleId, status: RuleStatus },

    /// Keep refreshing and printing rules until Ctrl-C
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
}

impl Cli {
    pub fn console_config(&self) -> ConsoleConfig {
        ConsoleConfig {
            client: ClientConfig {
                base_url: self.base_url.clone(),
                timeout: Duration::from_secs(self.timeout_secs),
                ..ClientConfig::default()
            },
            storage: StorageConfig {
                path: self.state_db.clone(),
            },
        }
    }
}

/// The server rejected the stored credentials; the user has to log in again.
#[derive(Debug, Error)]
#[error("login required")]
pub struct LoginRequired;

/// Process exit status for a failed command: 2 asks for a new login,
/// anything else is 1.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    if err.is::<LoginRequired>() {
        2
    } else {
        1
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Fixed-width table of rules, in collection order.
pub fn render_rules(rules: &[Rule]) -> String {
    if rules.is_empty() {
        return "No rules.\n".to_string();
    }

    let name_width = rules
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6}  {:<name_width$}  {:<8}  {:<18}  {:>12}  {:<20}  {}",
        "ID", "NAME", "STATUS", "TYPE", "THRESHOLD", "UPDATED", "BY",
    );
    for rule in rules {
        let _ = writeln!(
            out,
            "{:>6}  {:<name_width$}  {:<8}  {:<18}  {:>12}  {:<20}  {}",
            rule.id,
            rule.name,
            rule.status.to_string(),
            rule.rule_type.to_string(),
            rule.threshold,
            rule.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            rule.last_modified_by,
        );
    }
    out
}

/// Multi-line description of one rule.
pub fn render_rule(rule: &Rule) -> String {
    format!(
        "Rule {id}: {name}\n  status:      {status} ({status_label})\n  type:        {kind} ({kind_label})\n  threshold:   {threshold}\n  created:     {created}\n  updated:     {updated}\n  modified by: {by}\n",
        id = rule.id,
        name = rule.name,
        status = rule.status,
        status_label = rule.status.wire_label(),
        kind = rule.rule_type,
        kind_label = rule.rule_type.wire_label(),
        threshold = rule.threshold,
        created = rule.created_at.to_rfc3339(),
        updated = rule.updated_at.to_rfc3339(),
        by = rule.last_modified_by,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use aml_rule_store::RuleType;

    fn rule() -> Rule {
        Rule {
            id: RuleId::new(42),
            name: "Cash over limit".into(),
            status: RuleStatus::Enabled,
            threshold: 10000.0,
            rule_type: RuleType::TransactionAmount,
            created_at: "2024-02-01T12:00:00Z".parse().unwrap(),
            updated_at: "2024-02-03T08:15:00Z".parse().unwrap(),
            last_modified_by: "mlro".into(),
        }
    }

    #[test]
    fn parses_set_status_with_wire_label() {
        let cli = Cli::try_parse_from(["amlctl", "rules", "set-status", "7", "禁用"]).unwrap();
        match cli.command {
            Commands::Rules(RuleCommand::SetStatus { id, status }) => {
                assert_eq!(id, RuleId::new(7));
                assert_eq!(status, RuleStatus::Disabled);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(Cli::try_parse_from(["amlctl", "rules", "set-status", "7", "paused"]).is_err());
    }

    #[test]
    fn global_options_feed_console_config() {
        let cli = Cli::try_parse_from([
            "amlctl",
            "rules",
            "list",
            "--base-url",
            "https://aml.internal/api",
            "--timeout-secs",
            "3",
            "--state-db",
            "/tmp/state.db",
        ])
        .unwrap();

        let config = cli.console_config();
        assert_eq!(config.client.base_url, "https://aml.internal/api");
        assert_eq!(config.client.timeout, Duration::from_secs(3));
        assert_eq!(config.storage.path, PathBuf::from("/tmp/state.db"));
    }

    #[test]
    fn login_required_exits_with_two() {
        assert_eq!(exit_status(&anyhow::Error::new(LoginRequired)), 2);
        assert_eq!(exit_status(&anyhow::anyhow!("rule 7 not found")), 1);
    }

    #[test]
    fn table_lists_every_rule() {
        let table = render_rules(&[rule()]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("THRESHOLD"));
        assert!(lines[1].contains("Cash over limit"));
        assert!(lines[1].contains("enabled"));
        assert!(lines[1].contains("2024-02-03 08:15:00"));
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(render_rules(&[]), "No rules.\n");
    }

    #[test]
    fn detail_shows_wire_labels() {
        let text = render_rule(&rule());
        assert!(text.starts_with("Rule 42: Cash over limit"));
        assert!(text.contains("enabled (启用)"));
        assert!(text.contains("transaction-amount (交易金额)"));
    }
}
