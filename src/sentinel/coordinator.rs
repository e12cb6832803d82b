//! Coordinator Contract
//!
//! The interface a health-check client reports into.

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::events::SentinelEvent;
use super::monitor::HealthCheckerClient;
use super::state::{SentinelInstance, TopologyState};
use crate::error::Result;

/// A request for the coordinator's current view of the fleet
#[derive(Debug)]
pub struct TopologyRequest {
    reply: oneshot::Sender<TopologyState>,
}

impl TopologyRequest {
    pub fn new() -> (Self, oneshot::Receiver<TopologyState>) {
        let (reply, rx) = oneshot::channel();
        (Self { reply }, rx)
    }

    /// Answer the request. A requester that stopped waiting is ignored.
    pub fn respond(self, state: TopologyState) {
        let _ = self.reply.send(state);
    }
}

#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Accept an event. Must not block the caller: monitoring loops call
    /// this inline.
    fn notify(&self, event: SentinelEvent);

    /// Create and start a new client for `sentinel`, on the coordinator's
    /// own retry schedule.
    fn schedule_new_health_checker(&self, sentinel: SentinelInstance);

    /// Build a client for `sentinel` wired to this coordinator.
    async fn new_sentinel_monitor(&self, sentinel: SentinelInstance)
    -> Result<HealthCheckerClient>;

    fn get_state(&self, request: TopologyRequest);
}
