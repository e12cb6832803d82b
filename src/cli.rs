use crate::error::{Error, Result};
use crate::sentinel::config::WatchConfig;
use crate::sentinel::config_parser::parse_watch_config;
use crate::sentinel::state::SentinelInstance;
use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sockudo-sentinel-watch")]
#[command(author = "Sockudo Team")]
#[command(version = "0.1.0")]
#[command(about = "Health checks a Redis Sentinel fleet and tracks master failovers", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(value_name = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Sentinel to watch, repeatable (HOST:PORT[:CLUSTER])
    #[arg(long = "sentinel", value_name = "HOST:PORT[:CLUSTER]", value_parser = parse_sentinel_arg)]
    pub sentinels: Vec<SentinelInstance>,

    /// Log level (debug, verbose, notice, warning, nothing)
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Log file path
    #[arg(long)]
    pub logfile: Option<String>,

    /// Interval between PINGs (default: 1000)
    #[arg(long)]
    pub ping_interval_ms: Option<u64>,

    /// Subscription receive timeout (default: 5000)
    #[arg(long)]
    pub receive_timeout_ms: Option<u64>,
}

impl Cli {
    /// Parse the process arguments and build a validated config
    pub fn load_config() -> Result<WatchConfig> {
        Cli::parse().into_config()
    }

    /// Load the config file, then apply command line overrides
    pub fn into_config(self) -> Result<WatchConfig> {
        let mut config = match &self.config_file {
            Some(path) => parse_watch_config(path)?,
            None => WatchConfig::default(),
        };

        for sentinel in self.sentinels {
            config.add_sentinel(sentinel);
        }
        if let Some(loglevel) = self.loglevel {
            config.loglevel = loglevel;
        }
        if let Some(logfile) = self.logfile {
            config.logfile = logfile;
        }
        if let Some(v) = self.ping_interval_ms {
            config.ping_interval_ms = v;
        }
        if let Some(v) = self.receive_timeout_ms {
            config.receive_timeout_ms = v;
        }

        config.validate()?;
        Ok(config)
    }
}

/// `HOST:PORT[:CLUSTER]`
fn parse_sentinel_arg(s: &str) -> Result<SentinelInstance> {
    let invalid = || Error::Config(format!("invalid sentinel '{}', expected HOST:PORT[:CLUSTER]", s));

    let mut parts = s.splitn(3, ':');
    let host = parts.next().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    let port: u16 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(invalid)?;

    let sentinel = SentinelInstance::new(host, port);
    Ok(match parts.next() {
        Some(cluster) if !cluster.is_empty() => sentinel.with_cluster(cluster),
        Some(_) => return Err(invalid()),
        None => sentinel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sentinel_arg() {
        let sentinel = parse_sentinel_arg("10.0.0.1:26379").unwrap();
        assert_eq!(sentinel.addr(), "10.0.0.1:26379");
        assert_eq!(sentinel.cluster, None);

        let sentinel = parse_sentinel_arg("sentinel-a:26380:cache").unwrap();
        assert_eq!(sentinel.port, 26380);
        assert_eq!(sentinel.cluster.as_deref(), Some("cache"));

        assert!(parse_sentinel_arg("10.0.0.1").is_err());
        assert!(parse_sentinel_arg(":26379").is_err());
        assert!(parse_sentinel_arg("10.0.0.1:port").is_err());
        assert!(parse_sentinel_arg("10.0.0.1:26379:").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sentinel 10.0.0.1 26379").unwrap();
        writeln!(file, "ping-interval-ms 2000").unwrap();
        writeln!(file, "loglevel warning").unwrap();
        file.flush().unwrap();

        let path = file.path().display().to_string();
        let cli = Cli::try_parse_from([
            "sockudo-sentinel-watch",
            path.as_str(),
            "--sentinel",
            "10.0.0.2:26379:cache",
            "--ping-interval-ms",
            "500",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();

        assert_eq!(config.sentinels.len(), 2);
        assert_eq!(config.ping_interval_ms, 500);
        assert_eq!(config.loglevel, "warning");
    }

    #[test]
    fn test_no_sentinels_rejected() {
        let cli = Cli::try_parse_from(["sockudo-sentinel-watch", "--loglevel", "debug"]).unwrap();
        assert!(matches!(cli.into_config(), Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_sentinel_flag_rejected_by_clap() {
        let result = Cli::try_parse_from(["sockudo-sentinel-watch", "--sentinel", "nope"]);
        assert!(result.is_err());
    }
}
