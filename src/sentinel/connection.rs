//! Connection Contract
//!
//! What a health-check client needs from a wire client: run a command and
//! get a reply, open a subscription and receive pushes. `network` has the
//! TCP implementation; tests substitute scripted ones.

use std::sync::Arc;

use async_trait::async_trait;

use super::state::SentinelInstance;
use crate::error::Result;
use crate::protocol::RespValue;

/// Liveness command sent on every ping tick
pub const PING_COMMAND: &str = "PING";

/// Reply text that counts as alive
pub const PONG_REPLY: &str = "PONG";

/// A reply to a command. A reply error means the peer rejected the
/// command; it is distinct from a transport error.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply(RespValue);

impl Reply {
    pub fn new(value: RespValue) -> Self {
        Self(value)
    }

    /// Textual value, if the reply is a string or integer
    pub fn value(&self) -> Option<String> {
        self.0.as_text()
    }

    /// Error text, if the peer answered with an error
    pub fn error(&self) -> Option<String> {
        self.0.as_error()
    }

    pub fn into_inner(self) -> RespValue {
        self.0
    }
}

impl From<RespValue> for Reply {
    fn from(value: RespValue) -> Self {
        Self(value)
    }
}

/// A message received on a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    pub channel: String,
    pub payload: String,
}

impl PubSubMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Keepalive reply seen while idle in subscribe mode. Carries no channel.
    pub fn keepalive() -> Self {
        Self::new("", "pong")
    }

    pub fn is_keepalive(&self) -> bool {
        self.channel.is_empty()
    }
}

/// Opens connections to sentinels
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Fails with `Error::Connection` if the peer is unreachable or refuses.
    /// Bounded by the transport's own connect timeout.
    async fn dial(&self, sentinel: &SentinelInstance) -> Result<Arc<dyn Connection>>;
}

/// An open connection to one sentinel
#[async_trait]
pub trait Connection: Send + Sync {
    /// `Err` is a transport failure; a peer-side error is a `Reply` whose
    /// `error()` is set.
    async fn command(&self, name: &str, args: &[&str]) -> Result<Reply>;

    fn new_subscription(&self) -> Box<dyn Subscription>;
}

/// A pub/sub handle
#[async_trait]
pub trait Subscription: Send {
    async fn subscribe(&mut self, channels: &[&str]) -> Result<Reply>;

    /// Wait for the next message. Implementations bound the wait and report
    /// `Error::ReceiveTimeout` when nothing arrives in time.
    async fn receive(&mut self) -> Result<PubSubMessage>;
}
