//! Cooperative control loop.
//!
//! One iteration feeds the watchdog, keeps the broker session alive,
//! drains a bounded number of inbound messages and runs one
//! [`Device::tick`]. Nothing in it waits longer than the transport's own
//! timeouts, so the watchdog is fed at the loop rate even while the broker
//! is unreachable.

use crate::device::Device;
use pinelock_core::{DeviceConfig, MonoTime};
use pinelock_network::{Delivery, ReconnectSchedule, Transport, Watchdog};
use pinelock_protocol::{InboundMessage, OutboundMessage, Topics};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Inbound messages handled per iteration before local inputs get a turn.
const MAX_INBOUND_PER_ITERATION: usize = 8;

pub struct Runtime<T: Transport, W: Watchdog> {
    device: Device,
    transport: T,
    watchdog: W,
    topics: Topics,
    schedule: ReconnectSchedule,
    loop_interval: Duration,
    online: bool,
}

impl<T: Transport, W: Watchdog> Runtime<T, W> {
    pub fn new(config: &DeviceConfig, device: Device, transport: T, watchdog: W) -> Self {
        Self {
            device,
            transport,
            watchdog,
            topics: Topics::new(&config.device.topic_prefix, &config.device.id),
            schedule: ReconnectSchedule::new(config.broker.reconnect_delay()),
            loop_interval: config.timing.loop_interval(),
            online: false,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether the last iteration ended with a live broker session.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Run iterations until `shutdown` resolves, then close the session.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(interval_ms = self.loop_interval.as_millis() as u64, "Control loop started");

        loop {
            self.run_iteration().await;

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(self.loop_interval) => {}
            }
        }

        self.transport.disconnect().await;
        self.online = false;
        info!("Control loop stopped");
    }

    /// One pass of the control loop.
    pub async fn run_iteration(&mut self) {
        self.watchdog.feed();
        let now = self.device.monotonic();

        if self.online && !self.transport.is_connected() {
            warn!("Broker connection lost");
            self.online = false;
        }

        if !self.online && self.schedule.is_due(now) {
            self.connect(now).await;
        }

        if self.online {
            self.drain_inbound().await;
        }

        let outbound = self.device.tick();
        self.publish_all(outbound).await;
    }

    async fn connect(&mut self, now: MonoTime) {
        debug!(failures = self.schedule.failures(), "Connecting to broker");

        let connected = self.transport.connect().await;
        if let Err(e) = connected {
            self.schedule.record_failure(now);
            warn!(
                error = %e,
                retry_ms = self.schedule.delay().as_millis() as u64,
                "Broker connection failed"
            );
            return;
        }

        for topic in self.topics.subscriptions() {
            let subscribed = self.transport.subscribe(&topic).await;
            if let Err(e) = subscribed {
                warn!(error = %e, topic = %topic, "Subscribe failed");
                self.transport.disconnect().await;
                self.schedule.record_failure(now);
                return;
            }
        }

        self.schedule.record_success();
        self.online = true;
        info!("Connected to broker");

        let greeting = self.device.on_connected();
        self.publish_all(greeting).await;
    }

    async fn drain_inbound(&mut self) {
        for _ in 0..MAX_INBOUND_PER_ITERATION {
            let polled = self.transport.poll().await;
            match polled {
                Ok(Some(delivery)) => {
                    let replies = self.dispatch(&delivery);
                    self.publish_all(replies).await;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Broker poll failed");
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, delivery: &Delivery) -> Vec<OutboundMessage> {
        let Some(topic) = self.topics.route(&delivery.topic) else {
            debug!(topic = %delivery.topic, "Ignoring message on foreign topic");
            return Vec::new();
        };

        match InboundMessage::parse(topic, delivery.payload.as_bytes()) {
            Ok(message) => {
                debug!(topic = %topic, "Inbound message");
                self.device.handle_inbound(message)
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Rejected inbound message");
                Vec::new()
            }
        }
    }

    async fn publish_all(&mut self, messages: Vec<OutboundMessage>) {
        for message in messages {
            self.publish(&message).await;
        }
    }

    async fn publish(&mut self, message: &OutboundMessage) {
        if !self.online {
            debug!(topic = message.suffix(), "Offline, dropping message");
            return;
        }

        let payload = match message.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = message.suffix(), error = %e, "Could not encode message");
                return;
            }
        };

        let topic = self.topics.topic(message.suffix());
        let sent = self.transport.publish(&topic, &payload).await;
        if let Err(e) = sent {
            warn!(topic = %topic, error = %e, "Publish failed");
        }
    }
}
