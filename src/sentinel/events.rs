//! Health-Check Events
//!
//! Notifications a health-check client hands to its coordinator, plus the
//! parsers for the Sentinel pub/sub payloads that produce them.

use std::sync::Arc;
use std::time::SystemTime;

use super::state::{MasterAddr, SentinelInstance};
use crate::error::Error;

/// Channel a Sentinel publishes on after promoting a new master
pub const SWITCH_MASTER_CHANNEL: &str = "+switch-master";

/// Channel a Sentinel publishes on when it discovers a peer sentinel
pub const NEW_SENTINEL_CHANNEL: &str = "+sentinel";

/// Channels every health-check client subscribes to
pub const EVENT_CHANNELS: [&str; 2] = [SWITCH_MASTER_CHANNEL, NEW_SENTINEL_CHANNEL];

#[derive(Debug, Clone)]
pub enum SentinelEvent {
    /// Sentinel answered a liveness check
    Ping {
        sentinel: SentinelInstance,
        at: SystemTime,
    },
    /// Sentinel is unreachable or misbehaving. Emitted at most once per client.
    Lost {
        sentinel: SentinelInstance,
        cause: Arc<Error>,
    },
    /// A sentinel was registered or discovered
    Added { sentinel: SentinelInstance },
    /// A sentinel reported a master switch
    TopologyChanged {
        sentinel: SentinelInstance,
        switch: MasterSwitch,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentinelEventKind {
    Ping,
    Lost,
    Added,
    TopologyChanged,
}

impl SentinelEvent {
    pub fn kind(&self) -> SentinelEventKind {
        match self {
            Self::Ping { .. } => SentinelEventKind::Ping,
            Self::Lost { .. } => SentinelEventKind::Lost,
            Self::Added { .. } => SentinelEventKind::Added,
            Self::TopologyChanged { .. } => SentinelEventKind::TopologyChanged,
        }
    }

    /// The sentinel this event is about
    pub fn sentinel(&self) -> &SentinelInstance {
        match self {
            Self::Ping { sentinel, .. }
            | Self::Lost { sentinel, .. }
            | Self::Added { sentinel }
            | Self::TopologyChanged { sentinel, .. } => sentinel,
        }
    }
}

/// Parsed `+switch-master` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterSwitch {
    pub master_name: String,
    pub old: MasterAddr,
    pub new: MasterAddr,
}

impl MasterSwitch {
    /// Parse `<master-name> <old-ip> <old-port> <new-ip> <new-port>`
    pub fn parse(payload: &str) -> Option<Self> {
        let parts: Vec<&str> = payload.split_whitespace().collect();
        if parts.len() != 5 {
            return None;
        }

        Some(Self {
            master_name: parts[0].to_string(),
            old: MasterAddr::new(parts[1], parts[2].parse().ok()?),
            new: MasterAddr::new(parts[3], parts[4].parse().ok()?),
        })
    }

    /// Format back into the wire payload
    pub fn format_message(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.master_name, self.old.ip, self.old.port, self.new.ip, self.new.port
        )
    }
}

/// Parsed `+sentinel` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelAnnouncement {
    pub ip: String,
    pub port: u16,
    pub master_name: String,
}

impl SentinelAnnouncement {
    /// Parse `sentinel <id> <ip> <port> @ <master-name> <master-ip> <master-port>`
    pub fn parse(payload: &str) -> Option<Self> {
        let parts: Vec<&str> = payload.split_whitespace().collect();
        if parts.len() != 8 || parts[0] != "sentinel" || parts[4] != "@" {
            return None;
        }

        Some(Self {
            ip: parts[2].to_string(),
            port: parts[3].parse().ok()?,
            master_name: parts[5].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch_master() {
        let switch = MasterSwitch::parse("mymaster 127.0.0.1 6379 127.0.0.1 6380").unwrap();
        assert_eq!(switch.master_name, "mymaster");
        assert_eq!(switch.old, MasterAddr::new("127.0.0.1", 6379));
        assert_eq!(switch.new, MasterAddr::new("127.0.0.1", 6380));
        assert_eq!(
            switch.format_message(),
            "mymaster 127.0.0.1 6379 127.0.0.1 6380"
        );
    }

    #[test]
    fn test_parse_switch_master_rejects_malformed() {
        assert_eq!(MasterSwitch::parse(""), None);
        assert_eq!(MasterSwitch::parse("mymaster 127.0.0.1 6379"), None);
        assert_eq!(
            MasterSwitch::parse("mymaster 127.0.0.1 port 127.0.0.1 6380"),
            None
        );
        assert_eq!(
            MasterSwitch::parse("mymaster 127.0.0.1 6379 127.0.0.1 6380 extra"),
            None
        );
    }

    #[test]
    fn test_parse_sentinel_announcement() {
        let announced = SentinelAnnouncement::parse(
            "sentinel 0123abcd 10.0.0.7 26379 @ mymaster 10.0.0.1 6379",
        )
        .unwrap();
        assert_eq!(announced.ip, "10.0.0.7");
        assert_eq!(announced.port, 26379);
        assert_eq!(announced.master_name, "mymaster");

        assert_eq!(
            SentinelAnnouncement::parse("slave 10.0.0.2:6380 10.0.0.2 6380 @ mymaster 10.0.0.1 6379"),
            None
        );
    }

    #[test]
    fn test_event_kind_and_sentinel() {
        let sentinel = SentinelInstance::new("10.0.0.5", 26379);
        let event = SentinelEvent::Lost {
            sentinel: sentinel.clone(),
            cause: Arc::new(Error::ReceiveTimeout),
        };
        assert_eq!(event.kind(), SentinelEventKind::Lost);
        assert_eq!(event.sentinel(), &sentinel);

        let event = SentinelEvent::Added {
            sentinel: sentinel.clone(),
        };
        assert_eq!(event.kind(), SentinelEventKind::Added);
    }
}
