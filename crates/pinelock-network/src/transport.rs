//! Publish/subscribe channel to the controller.

use crate::error::Result;

/// One message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: String,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Message channel used by the control loop.
///
/// Implementations are driven from a single task. Every method that touches
/// the wire is bounded by a timeout, so a dead broker never stalls the loop
/// for longer than that.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open a session. Calling it while connected replaces the session.
    async fn connect(&mut self) -> Result<()>;

    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<()>;

    /// Wait briefly for one inbound message.
    ///
    /// Returns `Ok(None)` when nothing arrived within the poll timeout. An
    /// error means the session is gone.
    async fn poll(&mut self) -> Result<Option<Delivery>>;

    fn is_connected(&self) -> bool;

    /// Drop the session, if any.
    async fn disconnect(&mut self);
}
