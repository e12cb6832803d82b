//! Scripted connection and coordinator doubles for tests

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::connection::{Connection, Dialer, PubSubMessage, Reply, Subscription};
use super::coordinator::{Coordinator, TopologyRequest};
use super::events::{MasterSwitch, SentinelEvent, SentinelEventKind};
use super::monitor::HealthCheckerClient;
use super::state::{SentinelInstance, TopologyState};
use crate::error::{Error, Result};
use crate::protocol::RespValue;

#[derive(Debug, Clone)]
pub enum PingBehavior {
    Reply(RespValue),
    TransportError,
}

#[derive(Debug, Clone)]
pub enum SubscriptionStep {
    /// `subscribe` itself fails (only meaningful as the first step)
    SubscribeError,
    /// `subscribe` answers with an error reply (first step only)
    SubscribeReplyError,
    Message(PubSubMessage),
    Timeout,
    Fail,
}

/// Connection whose replies are fixed up front. Once the subscription
/// script runs out, `receive` never returns.
#[derive(Debug, Clone)]
pub struct MockConnection {
    ping: PingBehavior,
    subscription: Vec<SubscriptionStep>,
}

impl MockConnection {
    pub fn pong() -> Self {
        Self {
            ping: PingBehavior::Reply(RespValue::PONG),
            subscription: Vec::new(),
        }
    }

    pub fn with_ping(mut self, ping: PingBehavior) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_subscription(mut self, steps: Vec<SubscriptionStep>) -> Self {
        self.subscription = steps;
        self
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn command(&self, _name: &str, _args: &[&str]) -> Result<Reply> {
        match &self.ping {
            PingBehavior::Reply(value) => Ok(Reply::new(value.clone())),
            PingBehavior::TransportError => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
        }
    }

    fn new_subscription(&self) -> Box<dyn Subscription> {
        Box::new(MockSubscription {
            steps: self.subscription.iter().cloned().collect(),
        })
    }
}

struct MockSubscription {
    steps: VecDeque<SubscriptionStep>,
}

#[async_trait]
impl Subscription for MockSubscription {
    async fn subscribe(&mut self, channels: &[&str]) -> Result<Reply> {
        match self.steps.front() {
            Some(SubscriptionStep::SubscribeError) => {
                self.steps.pop_front();
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "broken pipe",
                )))
            }
            Some(SubscriptionStep::SubscribeReplyError) => {
                self.steps.pop_front();
                Ok(Reply::new(RespValue::error("ERR subscriptions disabled")))
            }
            _ => Ok(Reply::new(RespValue::Integer(channels.len() as i64))),
        }
    }

    async fn receive(&mut self) -> Result<PubSubMessage> {
        match self.steps.pop_front() {
            Some(SubscriptionStep::Message(message)) => Ok(message),
            Some(SubscriptionStep::Timeout) => Err(Error::ReceiveTimeout),
            Some(_) => Err(Error::Receive("connection closed by peer".into())),
            None => std::future::pending().await,
        }
    }
}

/// Hands out `MockConnection`s, refusing listed hosts
pub struct MockDialer {
    connection: MockConnection,
    refused: Mutex<HashSet<String>>,
    dials: AtomicUsize,
}

impl MockDialer {
    pub fn new(connection: MockConnection) -> Self {
        Self {
            connection,
            refused: Mutex::new(HashSet::new()),
            dials: AtomicUsize::new(0),
        }
    }

    pub fn refusing(self, host: &str) -> Self {
        self.refuse(host);
        self
    }

    pub fn refuse(&self, host: &str) {
        self.refused.lock().insert(host.to_string());
    }

    pub fn accept(&self, host: &str) {
        self.refused.lock().remove(host);
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, sentinel: &SentinelInstance) -> Result<Arc<dyn Connection>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refused.lock().contains(&sentinel.host) {
            return Err(Error::Connection {
                addr: sentinel.addr(),
                reason: "connection refused".into(),
            });
        }
        Ok(Arc::new(self.connection.clone()))
    }
}

/// Coordinator that records everything it is told
#[derive(Default)]
pub struct RecordingCoordinator {
    events: Mutex<Vec<SentinelEvent>>,
    scheduled: Mutex<Vec<SentinelInstance>>,
}

impl RecordingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SentinelEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: SentinelEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn lost_causes(&self) -> Vec<Arc<Error>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SentinelEvent::Lost { cause, .. } => Some(cause.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn switches(&self) -> Vec<MasterSwitch> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SentinelEvent::TopologyChanged { switch, .. } => Some(switch.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn scheduled(&self) -> Vec<SentinelInstance> {
        self.scheduled.lock().clone()
    }
}

#[async_trait]
impl Coordinator for RecordingCoordinator {
    fn notify(&self, event: SentinelEvent) {
        self.events.lock().push(event);
    }

    fn schedule_new_health_checker(&self, sentinel: SentinelInstance) {
        self.scheduled.lock().push(sentinel);
    }

    async fn new_sentinel_monitor(
        &self,
        _sentinel: SentinelInstance,
    ) -> Result<HealthCheckerClient> {
        Err(Error::Config(
            "recording coordinator does not build monitors".into(),
        ))
    }

    fn get_state(&self, request: TopologyRequest) {
        request.respond(TopologyState::default());
    }
}
