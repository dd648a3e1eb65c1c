//! In-process transport for tests and simulation.

use crate::error::{Result, TransportError};
use crate::transport::{Delivery, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct BrokerState {
    online: bool,
    connected: bool,
    connect_attempts: u32,
    subscriptions: Vec<String>,
    inbound: VecDeque<Delivery>,
    published: Vec<Delivery>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            online: true,
            connected: false,
            connect_attempts: 0,
            subscriptions: Vec::new(),
            inbound: VecDeque::new(),
            published: Vec::new(),
        }
    }
}

/// Transport backed by shared memory, controlled by a
/// [`MemoryTransportHandle`].
///
/// Only messages on subscribed topics are delivered, and subscriptions are
/// forgotten when the session drops, as with a real broker.
#[derive(Debug)]
pub struct MemoryTransport {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryTransportHandle) {
        let state = Arc::new(Mutex::new(BrokerState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MemoryTransportHandle { state },
        )
    }

    fn state(&self) -> Result<MutexGuard<'_, BrokerState>> {
        self.state
            .lock()
            .map_err(|_| TransportError::ConnectionLost("memory broker poisoned".to_string()))
    }

    fn session(&self) -> Result<MutexGuard<'_, BrokerState>> {
        let mut state = self.state()?;
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if !state.online {
            state.connected = false;
            state.subscriptions.clear();
            return Err(TransportError::ConnectionLost("broker went offline".to_string()));
        }
        Ok(state)
    }
}

impl Transport for MemoryTransport {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state()?;
        state.connect_attempts += 1;
        state.subscriptions.clear();
        if !state.online {
            state.connected = false;
            return Err(TransportError::Rejected("broker offline".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        let mut state = self.session()?;
        if !state.subscriptions.iter().any(|t| t == topic) {
            state.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        let mut state = self.session()?;
        state.published.push(Delivery::new(topic, payload));
        Ok(())
    }

    async fn poll(&mut self) -> Result<Option<Delivery>> {
        let mut state = self.session()?;
        while let Some(delivery) = state.inbound.pop_front() {
            if state.subscriptions.contains(&delivery.topic) {
                return Ok(Some(delivery));
            }
        }
        Ok(None)
    }

    fn is_connected(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.connected && state.online)
            .unwrap_or(false)
    }

    async fn disconnect(&mut self) {
        if let Ok(mut state) = self.state() {
            state.connected = false;
            state.subscriptions.clear();
        }
    }
}

/// Broker side of a [`MemoryTransport`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MemoryTransportHandle {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryTransportHandle {
    /// Take the broker up or down. Going down ends the current session on
    /// the transport's next operation.
    pub fn set_online(&self, online: bool) {
        self.with_state(|state| state.online = online);
    }

    /// Queue a message for the device.
    pub fn inject(&self, topic: impl Into<String>, payload: impl Into<String>) {
        let delivery = Delivery::new(topic, payload);
        self.with_state(|state| state.inbound.push_back(delivery));
    }

    /// Everything the device has published so far.
    pub fn published(&self) -> Vec<Delivery> {
        self.read(|state| state.published.clone())
    }

    /// Published messages, draining the record.
    pub fn take_published(&self) -> Vec<Delivery> {
        self.read_mut(|state| std::mem::take(&mut state.published))
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.read(|state| state.subscriptions.clone())
    }

    pub fn connect_attempts(&self) -> u32 {
        self.read(|state| state.connect_attempts)
    }

    fn with_state(&self, f: impl FnOnce(&mut BrokerState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn read<T: Default>(&self, f: impl FnOnce(&BrokerState) -> T) -> T {
        self.state.lock().map(|state| f(&state)).unwrap_or_default()
    }

    fn read_mut<T: Default>(&self, f: impl FnOnce(&mut BrokerState) -> T) -> T {
        self.state
            .lock()
            .map(|mut state| f(&mut state))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_only_subscribed_topics() {
        let (mut transport, handle) = MemoryTransport::new();
        transport.connect().await.unwrap();
        transport.subscribe("p/d/command").await.unwrap();

        handle.inject("p/d/status", "{}");
        handle.inject("p/d/command", r#"{"action":"lock"}"#);

        let delivery = transport.poll().await.unwrap().unwrap();
        assert_eq!(delivery.topic, "p/d/command");
        assert_eq!(transport.poll().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_broker() {
        let (mut transport, handle) = MemoryTransport::new();
        transport.connect().await.unwrap();
        transport.subscribe("t").await.unwrap();

        handle.set_online(false);
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.publish("t", "{}").await,
            Err(TransportError::ConnectionLost(_))
        ));
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::Rejected(_))
        ));

        handle.set_online(true);
        transport.connect().await.unwrap();
        assert!(handle.subscriptions().is_empty());
        assert_eq!(handle.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_publish_requires_session() {
        let (mut transport, handle) = MemoryTransport::new();
        assert!(matches!(
            transport.publish("t", "{}").await,
            Err(TransportError::NotConnected)
        ));
        assert!(handle.published().is_empty());
    }

    #[tokio::test]
    async fn test_take_published_drains() {
        let (mut transport, handle) = MemoryTransport::new();
        transport.connect().await.unwrap();
        transport.publish("a", "1").await.unwrap();

        assert_eq!(handle.take_published(), vec![Delivery::new("a", "1")]);
        assert!(handle.published().is_empty());
    }
}
