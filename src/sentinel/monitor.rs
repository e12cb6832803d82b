//! Sentinel Health Checking
//!
//! One `HealthCheckerClient` watches one sentinel over one connection with
//! two tasks:
//! - a ping loop that sends PING every `ping_interval` and expects PONG
//! - a subscription loop that listens on the sentinel's event channels
//!
//! Whichever loop fails first moves the client to `Lost`, emits the only
//! `Lost` event the client will ever produce, and cancels its sibling.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;

use super::connection::{
    Connection, Dialer, PING_COMMAND, PONG_REPLY, PubSubMessage, Subscription,
};
use super::coordinator::Coordinator;
use super::events::{
    EVENT_CHANNELS, MasterSwitch, NEW_SENTINEL_CHANNEL, SWITCH_MASTER_CHANNEL,
    SentinelAnnouncement, SentinelEvent,
};
use super::state::SentinelInstance;
use crate::error::{Error, Result};

/// Default interval between PING commands (1 second)
const PING_PERIOD_MS: u64 = 1000;

/// Default bound on a single pub/sub receive
const RECEIVE_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct CheckerSettings {
    pub ping_interval: Duration,
    pub receive_timeout: Duration,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(PING_PERIOD_MS),
            receive_timeout: Duration::from_millis(RECEIVE_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerState {
    /// Connected, loops not started
    Idle,
    Running,
    /// A failure was detected and reported
    Lost,
    /// Stopped on request, nothing reported
    Stopped,
}

/// State shared by the client handle and both loops
struct Shared {
    sentinel: SentinelInstance,
    coordinator: Arc<dyn Coordinator>,
    state: Mutex<CheckerState>,
    shutdown: CancellationToken,
}

impl Shared {
    /// Emit a non-terminal event. Returns false once the client has left
    /// `Running`; the caller should exit.
    fn emit(&self, event: SentinelEvent) -> bool {
        let state = self.state.lock();
        if *state != CheckerState::Running {
            return false;
        }
        self.coordinator.notify(event);
        true
    }

    /// One-shot transition to `Lost`. Only the first caller while `Running`
    /// notifies; everyone else returns silently.
    fn signal_lost(&self, cause: Error) {
        let mut state = self.state.lock();
        if *state != CheckerState::Running {
            log::debug!(
                "Sentinel {} failure after {:?} suppressed: {}",
                self.sentinel,
                *state,
                cause
            );
            return;
        }

        *state = CheckerState::Lost;
        self.shutdown.cancel();
        log::warn!("Sentinel {} lost: {}", self.sentinel, cause);
        self.coordinator.notify(SentinelEvent::Lost {
            sentinel: self.sentinel.clone(),
            cause: Arc::new(cause),
        });
    }
}

/// Health checker for a single sentinel
pub struct HealthCheckerClient {
    shared: Arc<Shared>,
    connection: Arc<dyn Connection>,
    settings: CheckerSettings,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HealthCheckerClient {
    /// Dial `sentinel` and build a client for it.
    ///
    /// On dial failure a `Lost` event has already been sent to the
    /// coordinator when this returns `Err`. On success nothing is emitted
    /// until the first ping answers.
    pub async fn new(
        sentinel: SentinelInstance,
        coordinator: Arc<dyn Coordinator>,
        dialer: &dyn Dialer,
        settings: CheckerSettings,
    ) -> Result<Self> {
        let connection = match dialer.dial(&sentinel).await {
            Ok(connection) => connection,
            Err(e) => {
                let returned = connection_error(&sentinel, &e);
                log::warn!("Sentinel {} unreachable: {}", sentinel, e);
                coordinator.notify(SentinelEvent::Lost {
                    sentinel,
                    cause: Arc::new(e),
                });
                return Err(returned);
            }
        };

        log::debug!("Connected to sentinel {}", sentinel);

        Ok(Self {
            shared: Arc::new(Shared {
                sentinel,
                coordinator,
                state: Mutex::new(CheckerState::Idle),
                shutdown: CancellationToken::new(),
            }),
            connection,
            settings,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn sentinel(&self) -> &SentinelInstance {
        &self.shared.sentinel
    }

    pub fn state(&self) -> CheckerState {
        *self.shared.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == CheckerState::Running
    }

    /// Launch both monitoring loops. Only the first call from `Idle` has
    /// any effect.
    pub fn start(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state != CheckerState::Idle {
                return;
            }
            *state = CheckerState::Running;
        }

        log::info!("Watching sentinel {}", self.shared.sentinel);

        let ping = tokio::spawn(run_ping_loop(
            self.shared.clone(),
            self.connection.clone(),
            self.settings.ping_interval,
        ));
        let subscription = tokio::spawn(run_subscription_loop(
            self.shared.clone(),
            self.connection.new_subscription(),
            self.settings.receive_timeout,
        ));

        self.tasks.lock().extend([ping, subscription]);
    }

    /// Stop both loops without reporting anything. Safe to call repeatedly
    /// and after `Lost`.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            if matches!(*state, CheckerState::Idle | CheckerState::Running) {
                *state = CheckerState::Stopped;
            }
        }
        self.shared.shutdown.cancel();
    }

    /// Wait until both loops have exited
    pub async fn wait(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl Drop for HealthCheckerClient {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

fn connection_error(sentinel: &SentinelInstance, err: &Error) -> Error {
    match err {
        Error::Connection { addr, reason } => Error::Connection {
            addr: addr.clone(),
            reason: reason.clone(),
        },
        other => Error::Connection {
            addr: sentinel.addr(),
            reason: other.to_string(),
        },
    }
}

async fn run_ping_loop(shared: Arc<Shared>, connection: Arc<dyn Connection>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            outcome = ping(connection.as_ref()) => outcome,
        };

        match outcome {
            Ok(()) => {
                log::debug!("Sentinel {} answered PING", shared.sentinel);
                let event = SentinelEvent::Ping {
                    sentinel: shared.sentinel.clone(),
                    at: SystemTime::now(),
                };
                if !shared.emit(event) {
                    break;
                }
            }
            Err(e) => {
                shared.signal_lost(e);
                break;
            }
        }
    }
}

/// Send PING and check for PONG
async fn ping(connection: &dyn Connection) -> Result<()> {
    let reply = connection
        .command(PING_COMMAND, &[])
        .await
        .map_err(|e| match e {
            Error::Command(_) => e,
            other => Error::Command(other.to_string()),
        })?;

    if let Some(err) = reply.error() {
        return Err(Error::Command(err));
    }

    match reply.value() {
        Some(value) if value == PONG_REPLY => Ok(()),
        Some(value) => Err(Error::UnexpectedReply(value)),
        None => Err(Error::UnexpectedReply(format!("{:?}", reply.into_inner()))),
    }
}

async fn run_subscription_loop(
    shared: Arc<Shared>,
    mut subscription: Box<dyn Subscription>,
    receive_timeout: Duration,
) {
    let subscribed = tokio::select! {
        _ = shared.shutdown.cancelled() => return,
        result = subscription.subscribe(&EVENT_CHANNELS) => result,
    };

    match subscribed {
        Ok(reply) => {
            if let Some(err) = reply.error() {
                shared.signal_lost(Error::Subscription(err));
                return;
            }
        }
        Err(e) => {
            shared.signal_lost(Error::Subscription(e.to_string()));
            return;
        }
    }

    log::debug!(
        "Subscribed to {:?} on sentinel {}",
        EVENT_CHANNELS,
        shared.sentinel
    );

    loop {
        let received = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            result = timeout(receive_timeout, subscription.receive()) => result,
        };

        let message = match received {
            Ok(Ok(message)) => message,
            Ok(Err(Error::ReceiveTimeout)) | Err(_) => {
                shared.signal_lost(Error::ReceiveTimeout);
                break;
            }
            Ok(Err(e)) => {
                shared.signal_lost(Error::Receive(e.to_string()));
                break;
            }
        };

        if let Some(event) = classify(&shared.sentinel, message) {
            if let SentinelEvent::TopologyChanged { switch, .. } = &event {
                log::warn!(
                    "Sentinel {} reports master {} switched {} -> {}",
                    shared.sentinel,
                    switch.master_name,
                    switch.old,
                    switch.new
                );
            }
            if !shared.emit(event) {
                break;
            }
        }
    }
}

/// Turn a pub/sub message into an event, or None to ignore it
fn classify(sentinel: &SentinelInstance, message: PubSubMessage) -> Option<SentinelEvent> {
    match message.channel.as_str() {
        SWITCH_MASTER_CHANNEL => {
            let Some(switch) = MasterSwitch::parse(&message.payload) else {
                log::warn!(
                    "Sentinel {} sent malformed {} payload '{}'",
                    sentinel,
                    SWITCH_MASTER_CHANNEL,
                    message.payload
                );
                return None;
            };
            if !sentinel.watches(&switch.master_name) {
                log::debug!(
                    "Ignoring switch of master {} from sentinel {}",
                    switch.master_name,
                    sentinel
                );
                return None;
            }
            Some(SentinelEvent::TopologyChanged {
                sentinel: sentinel.clone(),
                switch,
            })
        }
        NEW_SENTINEL_CHANNEL => {
            let announced = SentinelAnnouncement::parse(&message.payload)?;
            if !sentinel.watches(&announced.master_name) {
                return None;
            }
            let mut peer = SentinelInstance::new(announced.ip, announced.port);
            peer.cluster = sentinel.cluster.clone();
            Some(SentinelEvent::Added { sentinel: peer })
        }
        _ => None,
    }
}
