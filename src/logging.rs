//! Logging
//!
//! Redis-style log output for the watcher:
//! - Log levels (debug, verbose, notice, warning, nothing)
//! - Append to a log file, or stderr when none is configured
//! - Redaction of AUTH passwords

use crate::sentinel::config::WatchConfig;
use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::SystemTime;

const REDACTED: &str = "[REDACTED]";

/// Redis-style log levels mapped to Rust log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Verbose,
    Notice,
    Warning,
    Nothing,
}

impl LogLevel {
    /// Parse a Redis-style level name, falling back to notice
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => Self::Debug,
            "verbose" => Self::Verbose,
            "notice" => Self::Notice,
            "warning" => Self::Warning,
            "nothing" => Self::Nothing,
            _ => Self::Notice,
        }
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::Debug,
            Self::Verbose => LevelFilter::Info,
            Self::Notice => LevelFilter::Info,
            Self::Warning => LevelFilter::Warn,
            Self::Nothing => LevelFilter::Off,
        }
    }
}

pub struct WatchLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
    hide_user_data: bool,
}

impl WatchLogger {
    pub fn new(config: &WatchConfig) -> Self {
        let level = LogLevel::parse(&config.loglevel).to_level_filter();

        let file = if config.logfile.is_empty() {
            None
        } else {
            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.logfile)
            {
                Ok(f) => Some(Mutex::new(f)),
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to open log file '{}': {}",
                        config.logfile, e
                    );
                    None
                }
            }
        };

        Self {
            level,
            file,
            hide_user_data: config.hide_user_data_from_log,
        }
    }

    fn sanitize_message(&self, msg: &str) -> String {
        if self.hide_user_data {
            redact_auth(msg)
        } else {
            msg.to_string()
        }
    }

    /// `pid:level-char timestamp message`
    fn format_record(&self, record: &Record) -> String {
        let level_char = match record.level() {
            log::Level::Error => '!',
            log::Level::Warn => '#',
            log::Level::Info => '*',
            log::Level::Debug => '-',
            log::Level::Trace => '.',
        };

        let msg = self.sanitize_message(&record.args().to_string());
        format!(
            "{}:{} {} {}\n",
            std::process::id(),
            level_char,
            timestamp(),
            msg
        )
    }
}

impl Log for WatchLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let formatted = self.format_record(record);
        match &self.file {
            Some(file) => {
                let _ = file.lock().write_all(formatted.as_bytes());
            }
            None => eprint!("{}", formatted),
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Replace the word following every `AUTH` / `auth-pass` token
fn redact_auth(msg: &str) -> String {
    let mut out = Vec::new();
    let mut redact_next = false;

    for word in msg.split(' ') {
        if redact_next && !word.is_empty() {
            out.push(REDACTED);
            redact_next = false;
            continue;
        }
        redact_next = word.eq_ignore_ascii_case("auth") || word.eq_ignore_ascii_case("auth-pass");
        out.push(word);
    }

    out.join(" ")
}

/// Seconds since the epoch with millisecond precision
fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}.{:03}", now.as_secs(), now.subsec_millis())
}

/// Install the watcher logger. Fails if a logger is already set.
pub fn init_logging(config: &WatchConfig) -> Result<(), log::SetLoggerError> {
    let logger = Box::new(WatchLogger::new(config));
    let level = LogLevel::parse(&config.loglevel).to_level_filter();

    log::set_boxed_logger(logger)?;
    log::set_max_level(level);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(
            LogLevel::parse("debug").to_level_filter(),
            LevelFilter::Debug
        );
        assert_eq!(
            LogLevel::parse("VERBOSE").to_level_filter(),
            LevelFilter::Info
        );
        assert_eq!(
            LogLevel::parse("warning").to_level_filter(),
            LevelFilter::Warn
        );
        assert_eq!(
            LogLevel::parse("nothing").to_level_filter(),
            LevelFilter::Off
        );
        // Unknown defaults to notice
        assert_eq!(LogLevel::parse("chatty"), LogLevel::Notice);
    }

    #[test]
    fn test_sanitize_auth() {
        let logger = WatchLogger {
            level: LevelFilter::Debug,
            file: None,
            hide_user_data: true,
        };

        let sanitized = logger.sanitize_message("sent AUTH mysecretpassword to 10.0.0.1:26379");
        assert_eq!(sanitized, "sent AUTH [REDACTED] to 10.0.0.1:26379");

        let sanitized = logger.sanitize_message("auth-pass hunter2");
        assert!(!sanitized.contains("hunter2"));
    }

    #[test]
    fn test_no_redaction_unless_enabled() {
        let logger = WatchLogger {
            level: LevelFilter::Debug,
            file: None,
            hide_user_data: false,
        };

        assert_eq!(logger.sanitize_message("AUTH secret"), "AUTH secret");
    }

    #[test]
    fn test_logfile_is_appended() {
        use tempfile::NamedTempFile;

        let file = NamedTempFile::new().unwrap();
        let config = WatchConfig {
            logfile: file.path().display().to_string(),
            loglevel: "debug".to_string(),
            ..WatchConfig::default()
        };
        let logger = WatchLogger::new(&config);

        logger.log(
            &Record::builder()
                .args(format_args!("sentinel 10.0.0.1:26379 lost"))
                .level(log::Level::Warn)
                .build(),
        );
        logger.flush();

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert!(written.contains(":# "));
        assert!(written.ends_with("sentinel 10.0.0.1:26379 lost\n"));
    }
}
