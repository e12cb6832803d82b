//! Redis Sentinel fleet watcher
//!
//! Health checks every known sentinel and tracks master failovers.
//!
//! Each sentinel gets a `HealthCheckerClient` running two loops:
//! 1. PING on a fixed interval
//! 2. Pub/sub receive on `+switch-master` and `+sentinel`
//!
//! Clients report to a `Coordinator` (the `SentinelManager`), which keeps
//! the topology and re-dials lost sentinels with exponential backoff.

pub mod backoff;
pub mod config;
pub mod config_parser;
pub mod connection;
pub mod coordinator;
pub mod events;
pub mod manager;
pub mod monitor;
pub mod network;
pub mod state;

#[cfg(test)]
pub mod testing;

pub use backoff::RetryPolicy;
pub use config::{MasterConfig, WatchConfig};
pub use config_parser::{parse_config_str, parse_watch_config};
pub use connection::{Connection, Dialer, PubSubMessage, Reply, Subscription};
pub use coordinator::{Coordinator, TopologyRequest};
pub use events::{MasterSwitch, SentinelEvent, SentinelEventKind};
pub use manager::SentinelManager;
pub use monitor::{CheckerSettings, CheckerState, HealthCheckerClient};
pub use network::{TcpDialer, TcpSettings};
pub use state::{MasterAddr, SentinelInstance, TopologyState};
