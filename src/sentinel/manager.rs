//! Sentinel Manager
//!
//! The coordinator: owns one health-check client per known sentinel,
//! applies their events to the topology, and re-dials lost sentinels on a
//! backoff schedule.
//!
//! `notify` only pushes onto an unbounded channel; a single task drains it,
//! so events are applied in arrival order and monitoring loops never wait
//! on topology bookkeeping.

use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::backoff::RetryPolicy;
use super::connection::Dialer;
use super::coordinator::{Coordinator, TopologyRequest};
use super::events::{MasterSwitch, SentinelEvent};
use super::monitor::{CheckerSettings, HealthCheckerClient};
use super::state::{MasterAddr, SentinelInstance, TopologyState};
use crate::error::{Error, Result};

pub struct SentinelManager {
    me: Weak<SentinelManager>,
    dialer: Arc<dyn Dialer>,
    settings: CheckerSettings,
    retry: RetryPolicy,
    events_tx: mpsc::UnboundedSender<SentinelEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<SentinelEvent>>>,
    clients: DashMap<String, HealthCheckerClient>,
    /// Consecutive failed attempts per sentinel, reset by a ping
    attempts: DashMap<String, u32>,
    topology: watch::Sender<TopologyState>,
    shutdown: CancellationToken,
}

impl SentinelManager {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        settings: CheckerSettings,
        retry: RetryPolicy,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (topology, _) = watch::channel(TopologyState::new());

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            dialer,
            settings,
            retry,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            clients: DashMap::new(),
            attempts: DashMap::new(),
            topology,
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the event processing task. Only the first call starts it.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let rx = self.events_rx.lock().take()?;
        let manager = self.me.upgrade()?;
        Some(tokio::spawn(manager.process_events(rx)))
    }

    /// Record a master's address before any sentinel reports on it
    pub fn seed_master(&self, name: &str, addr: MasterAddr) {
        self.topology.send_modify(|t| t.seed_master(name, addr));
    }

    /// Start watching a sentinel
    pub fn add_sentinel(&self, sentinel: SentinelInstance) {
        self.notify(SentinelEvent::Added { sentinel });
    }

    /// Stop watching a sentinel and forget it. Emits nothing.
    pub fn remove_sentinel(&self, addr: &str) -> bool {
        if let Some((_, client)) = self.clients.remove(addr) {
            client.stop();
        }
        self.attempts.remove(addr);
        let mut removed = false;
        self.topology.send_if_modified(|t| {
            removed = t.remove_sentinel(addr).is_some();
            false
        });
        if removed {
            log::info!("Stopped watching sentinel {}", addr);
        }
        removed
    }

    /// Snapshot of the current topology
    pub async fn topology(&self) -> TopologyState {
        let (request, rx) = TopologyRequest::new();
        self.get_state(request);
        rx.await.unwrap_or_default()
    }

    /// Receiver notified whenever the master table changes
    pub fn watch_topology(&self) -> watch::Receiver<TopologyState> {
        self.topology.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Stop every client and cancel pending retries
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        for entry in self.clients.iter() {
            entry.value().stop();
        }
        self.clients.clear();
        log::info!("Sentinel manager stopped");
    }

    async fn process_events(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<SentinelEvent>) {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle_event(event);
        }
    }

    fn handle_event(&self, event: SentinelEvent) {
        match event {
            SentinelEvent::Added { sentinel } => {
                let mut added = false;
                self.topology.send_if_modified(|t| {
                    added = t.add_sentinel(sentinel.clone());
                    false
                });
                if added {
                    log::info!("Added sentinel {}", sentinel);
                    self.spawn_monitor(sentinel, Duration::ZERO);
                }
            }
            SentinelEvent::Ping { sentinel, at } => {
                self.attempts.remove(&sentinel.addr());
                self.topology.send_if_modified(|t| {
                    t.mark_alive(&sentinel, at);
                    false
                });
            }
            SentinelEvent::Lost { sentinel, cause } => {
                log::debug!("Sentinel {} marked lost: {}", sentinel, cause);
                self.clients.remove(&sentinel.addr());
                let mut tracked = false;
                self.topology.send_if_modified(|t| {
                    tracked = t.contains_sentinel(&sentinel.addr());
                    t.mark_lost(&sentinel);
                    false
                });
                if tracked {
                    self.schedule_new_health_checker(sentinel);
                }
            }
            SentinelEvent::TopologyChanged { sentinel, switch } => {
                self.apply_switch(&sentinel, &switch);
            }
        }
    }

    fn apply_switch(&self, sentinel: &SentinelInstance, switch: &MasterSwitch) {
        let changed = self
            .topology
            .send_if_modified(|t| t.apply_switch(switch, sentinel, SystemTime::now()));
        if changed {
            log::warn!(
                "Master {} moved {} -> {} (reported by {})",
                switch.master_name,
                switch.old,
                switch.new,
                sentinel
            );
        } else {
            log::debug!(
                "Master {} already at {}, ignoring report from {}",
                switch.master_name,
                switch.new,
                sentinel
            );
        }
    }

    fn is_tracked(&self, sentinel: &SentinelInstance) -> bool {
        self.topology.borrow().contains_sentinel(&sentinel.addr())
    }

    /// Dial and start a client after `delay`, unless the manager shuts down
    /// or the sentinel is removed in the meantime.
    fn spawn_monitor(&self, sentinel: SentinelInstance, delay: Duration) {
        let Some(manager) = self.me.upgrade() else {
            return;
        };

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = manager.shutdown.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if manager.shutdown.is_cancelled() || !manager.is_tracked(&sentinel) {
                return;
            }

            let addr = sentinel.addr();
            match manager.new_sentinel_monitor(sentinel).await {
                Ok(client) => {
                    if manager.shutdown.is_cancelled() || !manager.is_tracked(client.sentinel()) {
                        return;
                    }
                    client.start();
                    if let Some(previous) = manager.clients.insert(addr.clone(), client) {
                        previous.stop();
                    }
                    // shutdown() may have cleared the registry while we dialed
                    if manager.shutdown.is_cancelled() {
                        if let Some((_, client)) = manager.clients.remove(&addr) {
                            client.stop();
                        }
                    }
                }
                Err(e) => {
                    // Lost was already emitted by the client constructor
                    log::debug!("Monitor for {} not started: {}", addr, e);
                }
            }
        });
    }
}

#[async_trait]
impl Coordinator for SentinelManager {
    fn notify(&self, event: SentinelEvent) {
        if self.events_tx.send(event).is_err() {
            log::debug!("Sentinel manager is gone, dropping event");
        }
    }

    fn schedule_new_health_checker(&self, sentinel: SentinelInstance) {
        let attempt = {
            let mut entry = self.attempts.entry(sentinel.addr()).or_insert(0);
            let attempt = *entry;
            *entry = attempt.saturating_add(1);
            attempt
        };
        let delay = self.retry.delay(attempt);
        log::info!(
            "Reconnecting to sentinel {} in {:?} (attempt {})",
            sentinel,
            delay,
            attempt + 1
        );
        self.spawn_monitor(sentinel, delay);
    }

    async fn new_sentinel_monitor(
        &self,
        sentinel: SentinelInstance,
    ) -> Result<HealthCheckerClient> {
        let coordinator: Arc<dyn Coordinator> = self
            .me
            .upgrade()
            .ok_or_else(|| Error::Config("sentinel manager dropped".into()))?;
        HealthCheckerClient::new(
            sentinel,
            coordinator,
            self.dialer.as_ref(),
            self.settings.clone(),
        )
        .await
    }

    fn get_state(&self, request: TopologyRequest) {
        request.respond(self.topology.borrow().clone());
    }
}
