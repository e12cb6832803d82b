//! Watcher Configuration Parser
//!
//! Parses sentinel.conf-style files: one `directive args...` per line.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::sentinel::config::{MasterConfig, WatchConfig};
use crate::sentinel::state::SentinelInstance;

/// Parse a watcher configuration file
pub fn parse_watch_config(path: &Path) -> Result<WatchConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(parse_config_str(&content))
}

/// Parse configuration text. Bad lines are reported and skipped.
pub fn parse_config_str(content: &str) -> WatchConfig {
    let mut config = WatchConfig::default();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Logging is not installed yet while the config is read
        if let Err(e) = parse_config_line(line, &mut config) {
            eprintln!("Warning: line {}: {}", line_num + 1, e);
        }
    }

    config
}

/// Parse a single configuration line
fn parse_config_line(line: &str, config: &mut WatchConfig) -> std::result::Result<(), String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(());
    }

    let directive = parts[0].to_lowercase();

    match directive.as_str() {
        "sentinel" => {
            // sentinel <host> <port> [cluster]
            if parts.len() < 3 || parts.len() > 4 {
                return Err("sentinel requires: host port [cluster]".to_string());
            }
            let port: u16 = parts[2]
                .parse()
                .map_err(|_| "invalid port in sentinel".to_string())?;

            let mut sentinel = SentinelInstance::new(parts[1], port);
            if let Some(cluster) = parts.get(3) {
                sentinel = sentinel.with_cluster(*cluster);
            }
            if !config.add_sentinel(sentinel) {
                return Err(format!("duplicate sentinel {}:{}", parts[1], port));
            }
        }
        "monitor" => {
            // monitor <name> <host> <port>
            if parts.len() != 4 {
                return Err("monitor requires: name host port".to_string());
            }
            let port: u16 = parts[3]
                .parse()
                .map_err(|_| "invalid port in monitor".to_string())?;
            config.add_master(MasterConfig::new(parts[1], parts[2], port));
        }
        "ping-interval-ms" => config.ping_interval_ms = parse_millis(&parts)?,
        "receive-timeout-ms" => config.receive_timeout_ms = parse_millis(&parts)?,
        "connect-timeout-ms" => config.connect_timeout_ms = parse_millis(&parts)?,
        "command-timeout-ms" => config.command_timeout_ms = parse_millis(&parts)?,
        "retry-initial-ms" => config.retry_initial_ms = parse_millis(&parts)?,
        "retry-max-ms" => config.retry_max_ms = parse_millis(&parts)?,
        "retry-multiplier" => {
            let value = single_arg(&parts)?;
            config.retry_multiplier = match value.parse() {
                Ok(n) if n > 0 => n,
                _ => return Err(format!("invalid retry-multiplier: {}", value)),
            };
        }
        "auth-pass" => {
            config.auth_pass = Some(single_arg(&parts)?.to_string());
        }
        "loglevel" => {
            let level = single_arg(&parts)?.to_lowercase();
            if !matches!(
                level.as_str(),
                "debug" | "verbose" | "notice" | "warning" | "nothing"
            ) {
                return Err(format!("invalid loglevel: {}", level));
            }
            config.loglevel = level;
        }
        "logfile" => {
            // logfile "" means stderr
            config.logfile = single_arg(&parts)?.trim_matches('"').to_string();
        }
        "hide-user-data-from-log" => {
            config.hide_user_data_from_log = parse_bool(single_arg(&parts)?)?;
        }
        _ => {
            return Err(format!("unknown directive '{}', ignored", parts[0]));
        }
    }

    Ok(())
}

fn single_arg<'a>(parts: &[&'a str]) -> std::result::Result<&'a str, String> {
    match parts {
        [_, value] => Ok(value),
        _ => Err(format!("{} requires exactly one value", parts[0])),
    }
}

fn parse_millis(parts: &[&str]) -> std::result::Result<u64, String> {
    let value = single_arg(parts)?;
    match value.parse() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(format!("invalid {}: {}", parts[0], value)),
    }
}

/// Parse boolean values (yes/no, true/false, 1/0)
fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.to_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(format!("invalid boolean value: {}", s)),
    }
}
