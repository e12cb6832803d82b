pub mod cli;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod sentinel;
pub mod sentinel_main;

pub use error::{Error, Result};
pub use sentinel::{HealthCheckerClient, SentinelEvent, SentinelInstance, SentinelManager};
