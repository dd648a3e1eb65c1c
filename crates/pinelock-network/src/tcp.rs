//! TCP transport speaking the line broker protocol.
//!
//! ```text
//! Device ── CONNECT ──> Broker
//!        <── CONNACK ──
//!        ── SUB ... ──>
//!        ── PUB ... ──>
//!        <── MSG ... ──
//! ```
//!
//! The transport does not retry. A failed operation drops the session and
//! returns the error; the control loop owns the reconnect policy.

use crate::error::{Result, TransportError};
use crate::transport::{Delivery, Transport};
use futures::{SinkExt, StreamExt};
use pinelock_core::DeviceConfig;
use pinelock_protocol::{BrokerCodec, BrokerFrame};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

/// Default bound on connect, handshake and send.
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// `host:port` of the broker; resolved on every connect.
    pub broker_addr: String,
    pub client_id: String,
    pub credentials: Option<(String, String)>,
    /// Bound on connect, handshake and each send.
    pub io_timeout: Duration,
    /// How long [`Transport::poll`] waits for an inbound frame.
    pub poll_timeout: Duration,
}

impl TcpTransportConfig {
    pub fn from_device_config(config: &DeviceConfig) -> Self {
        let credentials = match (&config.broker.username, &config.broker.password) {
            (Some(user), Some(password)) if !user.is_empty() => Some((user.clone(), password.clone())),
            _ => None,
        };

        Self {
            broker_addr: config.broker.address.clone(),
            client_id: config.client_id(),
            credentials,
            io_timeout: DEFAULT_IO_TIMEOUT,
            poll_timeout: config.broker.poll_timeout(),
        }
    }
}

pub struct TcpTransport {
    config: TcpTransportConfig,
    framed: Option<Framed<TcpStream, BrokerCodec>>,
}

impl TcpTransport {
    pub fn new(config: TcpTransportConfig) -> Self {
        debug!(broker = %config.broker_addr, client_id = %config.client_id, "Creating TCP transport");
        Self { config, framed: None }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.config.io_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn lost(&mut self, reason: impl Into<String>) -> TransportError {
        self.framed = None;
        TransportError::ConnectionLost(reason.into())
    }

    async fn send_frame(&mut self, frame: BrokerFrame) -> Result<()> {
        let io_timeout = self.config.io_timeout;
        let timeout_ms = self.timeout_ms();
        let framed = self.framed.as_mut().ok_or(TransportError::NotConnected)?;

        let sent = tokio::time::timeout(io_timeout, framed.send(frame)).await;
        match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "Send failed, dropping session");
                self.framed = None;
                Err(e.into())
            }
            Err(_) => {
                warn!("Send timeout after {}ms, dropping session", timeout_ms);
                self.framed = None;
                Err(TransportError::Timeout(timeout_ms))
            }
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        let connect = BrokerFrame::Connect {
            client_id: self.config.client_id.clone(),
            credentials: self.config.credentials.clone(),
        };
        self.send_frame(connect).await?;

        let io_timeout = self.config.io_timeout;
        let timeout_ms = self.timeout_ms();
        let framed = self.framed.as_mut().ok_or(TransportError::NotConnected)?;

        let reply = tokio::time::timeout(io_timeout, framed.next()).await;
        match reply {
            Ok(Some(Ok(BrokerFrame::ConnAck))) => Ok(()),
            Ok(Some(Ok(BrokerFrame::Error { reason }))) => {
                self.framed = None;
                Err(TransportError::Rejected(reason))
            }
            Ok(Some(Ok(other))) => {
                self.framed = None;
                Err(TransportError::Rejected(format!("expected CONNACK, got {other:?}")))
            }
            Ok(Some(Err(e))) => {
                self.framed = None;
                Err(e.into())
            }
            Ok(None) => Err(self.lost("Broker closed connection during handshake")),
            Err(_) => {
                self.framed = None;
                Err(TransportError::Timeout(timeout_ms))
            }
        }
    }
}

impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        self.framed = None;
        info!(broker = %self.config.broker_addr, "Connecting to broker");

        let stream = match tokio::time::timeout(
            self.config.io_timeout,
            TcpStream::connect(self.config.broker_addr.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(TransportError::Timeout(self.timeout_ms())),
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(Framed::new(stream, BrokerCodec::new()));
        self.handshake().await?;

        info!(client_id = %self.config.client_id, "Broker session established");
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        debug!(topic, "Subscribing");
        self.send_frame(BrokerFrame::subscribe(topic)).await
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        trace!(topic, payload, "Publishing");
        self.send_frame(BrokerFrame::publish(topic, payload)).await
    }

    async fn poll(&mut self) -> Result<Option<Delivery>> {
        let poll_timeout = self.config.poll_timeout;
        let framed = self.framed.as_mut().ok_or(TransportError::NotConnected)?;

        let received = tokio::time::timeout(poll_timeout, framed.next()).await;
        match received {
            Err(_) => Ok(None),
            Ok(Some(Ok(BrokerFrame::Message { topic, payload }))) => {
                trace!(topic = %topic, "Received message");
                Ok(Some(Delivery { topic, payload }))
            }
            Ok(Some(Ok(BrokerFrame::Error { reason }))) => {
                warn!(reason = %reason, "Broker reported an error");
                Ok(None)
            }
            Ok(Some(Ok(other))) => {
                debug!(frame = ?other, "Ignoring unexpected frame from broker");
                Ok(None)
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Undecodable frame, dropping session");
                self.framed = None;
                Err(e.into())
            }
            Ok(None) => Err(self.lost("Broker closed connection")),
        }
    }

    fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    async fn disconnect(&mut self) {
        if let Some(framed) = self.framed.take() {
            info!(broker = %self.config.broker_addr, "Closing broker session");
            let mut stream = framed.into_inner();
            let shutdown_timeout = Duration::from_millis(500);
            if tokio::time::timeout(shutdown_timeout, stream.shutdown()).await.is_err() {
                warn!("Shutdown timeout during disconnect");
            }
        }
    }
}
