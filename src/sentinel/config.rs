//! Watcher Configuration
//!
//! Configuration structures for the sentinel fleet watcher.

use std::time::Duration;

use super::backoff::RetryPolicy;
use super::monitor::CheckerSettings;
use super::network::TcpSettings;
use super::state::{MasterAddr, SentinelInstance};
use crate::error::{Error, Result};

/// Initial address of a master, before any switch is observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterConfig {
    /// Master name identifier
    pub name: String,
    /// Master IP address
    pub ip: String,
    /// Master port
    pub port: u16,
}

impl MasterConfig {
    pub fn new(name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            port,
        }
    }

    pub fn addr(&self) -> MasterAddr {
        MasterAddr::new(self.ip.clone(), self.port)
    }
}

/// Global watcher configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Sentinels to health check
    pub sentinels: Vec<SentinelInstance>,
    /// Initial topology
    pub masters: Vec<MasterConfig>,
    /// Ping interval in milliseconds (default 1000)
    pub ping_interval_ms: u64,
    /// Subscription receive timeout in milliseconds (default 5000)
    pub receive_timeout_ms: u64,
    /// TCP connect timeout in milliseconds (default 500)
    pub connect_timeout_ms: u64,
    /// Per-command timeout in milliseconds (default 500)
    pub command_timeout_ms: u64,
    /// First reconnect delay in milliseconds (default 500)
    pub retry_initial_ms: u64,
    /// Reconnect delay cap in milliseconds (default 30000)
    pub retry_max_ms: u64,
    /// Reconnect delay growth factor (default 2)
    pub retry_multiplier: u32,
    /// Password sent with AUTH to every sentinel
    pub auth_pass: Option<String>,
    /// Log level
    pub loglevel: String,
    /// Log file path, empty for stderr
    pub logfile: String,
    /// Redact AUTH arguments in log output
    pub hide_user_data_from_log: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            sentinels: Vec::new(),
            masters: Vec::new(),
            ping_interval_ms: 1000,
            receive_timeout_ms: 5000,
            connect_timeout_ms: 500,
            command_timeout_ms: 500,
            retry_initial_ms: 500,
            retry_max_ms: 30000,
            retry_multiplier: 2,
            auth_pass: None,
            loglevel: "notice".to_string(),
            logfile: String::new(),
            hide_user_data_from_log: false,
        }
    }
}

impl WatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sentinel unless one with the same address is already listed
    pub fn add_sentinel(&mut self, sentinel: SentinelInstance) -> bool {
        if self.sentinels.iter().any(|s| s.addr() == sentinel.addr()) {
            return false;
        }
        self.sentinels.push(sentinel);
        true
    }

    /// Add or replace a master by name
    pub fn add_master(&mut self, master: MasterConfig) {
        match self.masters.iter_mut().find(|m| m.name == master.name) {
            Some(existing) => *existing = master,
            None => self.masters.push(master),
        }
    }

    pub fn get_master(&self, name: &str) -> Option<&MasterConfig> {
        self.masters.iter().find(|m| m.name == name)
    }

    /// Reject configurations the watcher cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sentinels.is_empty() {
            return Err(Error::Config("no sentinels configured".into()));
        }
        if self.ping_interval_ms == 0 {
            return Err(Error::Config("ping-interval-ms must be positive".into()));
        }
        if self.receive_timeout_ms == 0 {
            return Err(Error::Config("receive-timeout-ms must be positive".into()));
        }
        if self.retry_multiplier == 0 {
            return Err(Error::Config("retry-multiplier must be positive".into()));
        }
        Ok(())
    }

    pub fn checker_settings(&self) -> CheckerSettings {
        CheckerSettings {
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
        }
    }

    pub fn tcp_settings(&self) -> TcpSettings {
        TcpSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
            auth_pass: self.auth_pass.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial: Duration::from_millis(self.retry_initial_ms),
            max: Duration::from_millis(self.retry_max_ms),
            multiplier: self.retry_multiplier,
            ..RetryPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::new();

        assert_eq!(config.ping_interval_ms, 1000);
        assert_eq!(config.receive_timeout_ms, 5000);
        assert_eq!(config.loglevel, "notice");
        assert!(!config.hide_user_data_from_log);
        assert_eq!(
            config.checker_settings().ping_interval,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_no_sentinels_is_rejected() {
        let config = WatchConfig::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_duplicate_sentinel_ignored() {
        let mut config = WatchConfig::new();
        assert!(config.add_sentinel(SentinelInstance::new("10.0.0.1", 26379)));
        assert!(!config.add_sentinel(SentinelInstance::new("10.0.0.1", 26379).with_cluster("a")));
        assert_eq!(config.sentinels.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_master_replaced_by_name() {
        let mut config = WatchConfig::new();
        config.add_master(MasterConfig::new("mymaster", "10.0.0.1", 6379));
        config.add_master(MasterConfig::new("mymaster", "10.0.0.2", 6380));

        assert_eq!(config.masters.len(), 1);
        assert_eq!(
            config.get_master("mymaster").map(MasterConfig::addr),
            Some(MasterAddr::new("10.0.0.2", 6380))
        );
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = WatchConfig {
            retry_initial_ms: 100,
            retry_max_ms: 1000,
            retry_multiplier: 3,
            ..WatchConfig::default()
        };
        let policy = config.retry_policy();

        assert_eq!(policy.initial, Duration::from_millis(100));
        assert_eq!(policy.max, Duration::from_secs(1));
        assert_eq!(policy.multiplier, 3);
    }
}
