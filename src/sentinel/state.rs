//! Sentinel Identity and Topology State
//!
//! `SentinelInstance` names one watched Sentinel process. `TopologyState`
//! is the coordinator's view of the fleet: which sentinels answer and
//! where each monitored master currently lives.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use super::events::MasterSwitch;

/// Identity of one Sentinel process. Immutable once a client watches it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SentinelInstance {
    pub host: String,
    pub port: u16,
    /// Master group this sentinel is watched for, if restricted to one
    pub cluster: Option<String>,
}

impl SentinelInstance {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            cluster: None,
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// `host:port`, also used as the registry key
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether topology messages about `master_name` concern this instance
    pub fn watches(&self, master_name: &str) -> bool {
        self.cluster.as_deref().is_none_or(|c| c == master_name)
    }
}

impl fmt::Display for SentinelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cluster {
            Some(cluster) => write!(f, "{}:{} ({})", self.host, self.port, cluster),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Network address of a master
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MasterAddr {
    pub ip: String,
    pub port: u16,
}

impl MasterAddr {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for MasterAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelHealth {
    /// Registered, no ping answered yet
    Unknown,
    Alive,
    Lost,
}

#[derive(Debug, Clone)]
pub struct SentinelStatus {
    pub instance: SentinelInstance,
    pub health: SentinelHealth,
    pub last_ping: Option<SystemTime>,
    /// Number of times this sentinel has been reported lost
    pub lost_count: u32,
}

#[derive(Debug, Clone)]
pub struct MasterState {
    pub name: String,
    pub addr: MasterAddr,
    /// Number of switches observed since startup
    pub switch_count: u32,
    pub last_switch: Option<SystemTime>,
    /// Sentinel that first reported the current address
    pub reported_by: Option<String>,
}

/// Snapshot of the fleet as seen by the coordinator
#[derive(Debug, Clone, Default)]
pub struct TopologyState {
    pub sentinels: BTreeMap<String, SentinelStatus>,
    pub masters: BTreeMap<String, MasterState>,
}

impl TopologyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sentinel. Returns false if it was already known.
    pub fn add_sentinel(&mut self, instance: SentinelInstance) -> bool {
        let key = instance.addr();
        if self.sentinels.contains_key(&key) {
            return false;
        }
        self.sentinels.insert(
            key,
            SentinelStatus {
                instance,
                health: SentinelHealth::Unknown,
                last_ping: None,
                lost_count: 0,
            },
        );
        true
    }

    pub fn remove_sentinel(&mut self, addr: &str) -> Option<SentinelStatus> {
        self.sentinels.remove(addr)
    }

    pub fn contains_sentinel(&self, addr: &str) -> bool {
        self.sentinels.contains_key(addr)
    }

    pub fn mark_alive(&mut self, instance: &SentinelInstance, at: SystemTime) {
        if let Some(status) = self.sentinels.get_mut(&instance.addr()) {
            status.health = SentinelHealth::Alive;
            status.last_ping = Some(at);
        }
    }

    pub fn mark_lost(&mut self, instance: &SentinelInstance) {
        if let Some(status) = self.sentinels.get_mut(&instance.addr()) {
            status.health = SentinelHealth::Lost;
            status.lost_count += 1;
        }
    }

    pub fn alive_sentinels(&self) -> usize {
        self.sentinels
            .values()
            .filter(|s| s.health == SentinelHealth::Alive)
            .count()
    }

    /// Seed a master's address from configuration
    pub fn seed_master(&mut self, name: impl Into<String>, addr: MasterAddr) {
        let name = name.into();
        self.masters.insert(
            name.clone(),
            MasterState {
                name,
                addr,
                switch_count: 0,
                last_switch: None,
                reported_by: None,
            },
        );
    }

    pub fn master_addr(&self, name: &str) -> Option<&MasterAddr> {
        self.masters.get(name).map(|m| &m.addr)
    }

    /// Apply a master switch. Every sentinel in a group reports the same
    /// failover, so a switch to the address already recorded is a no-op.
    /// Returns true if the master table changed.
    pub fn apply_switch(
        &mut self,
        switch: &MasterSwitch,
        reporter: &SentinelInstance,
        at: SystemTime,
    ) -> bool {
        match self.masters.get_mut(&switch.master_name) {
            Some(master) if master.addr == switch.new => false,
            Some(master) => {
                master.addr = switch.new.clone();
                master.switch_count += 1;
                master.last_switch = Some(at);
                master.reported_by = Some(reporter.addr());
                true
            }
            None => {
                self.masters.insert(
                    switch.master_name.clone(),
                    MasterState {
                        name: switch.master_name.clone(),
                        addr: switch.new.clone(),
                        switch_count: 1,
                        last_switch: Some(at),
                        reported_by: Some(reporter.addr()),
                    },
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch(name: &str, new_port: u16) -> MasterSwitch {
        MasterSwitch {
            master_name: name.to_string(),
            old: MasterAddr::new("10.0.0.1", 6379),
            new: MasterAddr::new("10.0.0.2", new_port),
        }
    }

    #[test]
    fn test_instance_addr_and_watch() {
        let plain = SentinelInstance::new("10.0.0.5", 26379);
        assert_eq!(plain.addr(), "10.0.0.5:26379");
        assert!(plain.watches("anything"));

        let scoped = plain.clone().with_cluster("mymaster");
        assert!(scoped.watches("mymaster"));
        assert!(!scoped.watches("other"));
        assert_eq!(scoped.to_string(), "10.0.0.5:26379 (mymaster)");
    }

    #[test]
    fn test_sentinel_health_transitions() {
        let mut topology = TopologyState::new();
        let s = SentinelInstance::new("10.0.0.5", 26379);

        assert!(topology.add_sentinel(s.clone()));
        assert!(!topology.add_sentinel(s.clone()));
        assert_eq!(topology.sentinels[&s.addr()].health, SentinelHealth::Unknown);

        topology.mark_alive(&s, SystemTime::now());
        assert_eq!(topology.alive_sentinels(), 1);

        topology.mark_lost(&s);
        let status = &topology.sentinels[&s.addr()];
        assert_eq!(status.health, SentinelHealth::Lost);
        assert_eq!(status.lost_count, 1);
        assert_eq!(topology.alive_sentinels(), 0);
    }

    #[test]
    fn test_unknown_sentinel_updates_are_ignored() {
        let mut topology = TopologyState::new();
        let s = SentinelInstance::new("10.0.0.5", 26379);
        topology.mark_alive(&s, SystemTime::now());
        topology.mark_lost(&s);
        assert!(topology.sentinels.is_empty());
    }

    #[test]
    fn test_apply_switch_is_idempotent() {
        let mut topology = TopologyState::new();
        let reporter = SentinelInstance::new("10.0.0.5", 26379);
        topology.seed_master("mymaster", MasterAddr::new("10.0.0.1", 6379));

        assert!(topology.apply_switch(&switch("mymaster", 6380), &reporter, SystemTime::now()));
        assert!(!topology.apply_switch(&switch("mymaster", 6380), &reporter, SystemTime::now()));

        let master = &topology.masters["mymaster"];
        assert_eq!(master.addr, MasterAddr::new("10.0.0.2", 6380));
        assert_eq!(master.switch_count, 1);
        assert_eq!(master.reported_by.as_deref(), Some("10.0.0.5:26379"));
    }

    #[test]
    fn test_apply_switch_for_unseeded_master() {
        let mut topology = TopologyState::new();
        let reporter = SentinelInstance::new("10.0.0.5", 26379);
        assert!(topology.apply_switch(&switch("other", 7000), &reporter, SystemTime::now()));
        assert_eq!(
            topology.master_addr("other"),
            Some(&MasterAddr::new("10.0.0.2", 7000))
        );
    }
}
