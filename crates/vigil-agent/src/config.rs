//! Agent process configuration.

use clap::Parser;
use std::path::PathBuf;

/// Vigil agent - health-check execution daemon
#[derive(Debug, Parser)]
#[command(name = "vigil-agent")]
#[command(about = "Executes health checks and publishes results", long_about = None)]
pub struct Config {
    /// Path to a JSON file listing the checks to execute
    #[arg(long)]
    pub checks: PathBuf,

    /// Path to a JSON file mapping logical target ids to endpoints
    #[arg(long)]
    pub targets: Option<PathBuf>,

    /// Maximum concurrently executing probes per request type
    #[arg(long, default_value_t = 10)]
    pub max_checks: usize,

    /// Cap on resolved targets dispatched per check
    #[arg(long)]
    pub max_hosts: Option<usize>,

    /// Overall time budget for one check run, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Customer identifier stamped on heartbeats
    #[arg(long, default_value = "")]
    pub customer_id: String,

    /// Seconds between heartbeats
    #[arg(long, default_value_t = 15)]
    pub heartbeat_secs: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["vigil-agent", "--checks", "checks.json"]).unwrap();
        assert_eq!(config.max_checks, 10);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.heartbeat_secs, 15);
        assert_eq!(config.log_level, "info");
        assert!(config.max_hosts.is_none());
        assert!(config.targets.is_none());
    }

    #[test]
    fn test_checks_path_is_required() {
        assert!(Config::try_parse_from(["vigil-agent"]).is_err());
    }

    #[test]
    fn test_flag_overrides() {
        let config = Config::try_parse_from([
            "vigil-agent",
            "--checks",
            "checks.json",
            "--max-checks",
            "3",
            "--max-hosts",
            "2",
            "--customer-id",
            "cust-9",
        ])
        .unwrap();
        assert_eq!(config.max_checks, 3);
        assert_eq!(config.max_hosts, Some(2));
        assert_eq!(config.customer_id, "cust-9");
    }
}
