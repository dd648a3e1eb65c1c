//! Messages published by the device.

use crate::error::Result;
use pinelock_core::{AccessEvent, AccessKind, AlertKind};
use serde::Serialize;

/// Lock and presence snapshot for the `status` topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub is_locked: bool,
    pub is_key_present: bool,
    /// Present only while the key tag is in the reader field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_uid: Option<String>,
    pub is_door_open: bool,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Heartbeat { timestamp: i64 },
    Status(StatusReport),
    Access(AccessEvent),
    Alert { kind: AlertKind, timestamp: i64 },
    SyncRequest { timestamp: i64 },
}

#[derive(Serialize)]
struct TimestampBody {
    timestamp: i64,
}

#[derive(Serialize)]
struct AccessBody<'a> {
    access_type: AccessKind,
    access_method: &'a str,
    success: bool,
    timestamp: i64,
}

#[derive(Serialize)]
struct AlertBody {
    #[serde(rename = "type")]
    kind: &'static str,
    message: &'static str,
    timestamp: i64,
}

#[derive(Serialize)]
struct SyncRequestBody {
    request: &'static str,
    timestamp: i64,
}

impl OutboundMessage {
    /// Topic suffix within the device namespace.
    pub fn suffix(&self) -> &'static str {
        match self {
            OutboundMessage::Heartbeat { .. } => "heartbeat",
            OutboundMessage::Status(_) => "status",
            OutboundMessage::Access(_) => "access",
            OutboundMessage::Alert { .. } => "alert",
            OutboundMessage::SyncRequest { .. } => "sync_request",
        }
    }

    /// Compact JSON body.
    ///
    /// # Errors
    /// Returns `ProtocolError::Serialization` if encoding fails.
    pub fn to_payload(&self) -> Result<String> {
        let payload = match self {
            OutboundMessage::Heartbeat { timestamp } => {
                serde_json::to_string(&TimestampBody { timestamp: *timestamp })?
            }
            OutboundMessage::Status(report) => serde_json::to_string(report)?,
            OutboundMessage::Access(event) => serde_json::to_string(&AccessBody {
                access_type: event.kind,
                access_method: &event.method,
                success: event.success,
                timestamp: event.timestamp,
            })?,
            OutboundMessage::Alert { kind, timestamp } => serde_json::to_string(&AlertBody {
                kind: kind.as_str(),
                message: kind.message(),
                timestamp: *timestamp,
            })?,
            OutboundMessage::SyncRequest { timestamp } => serde_json::to_string(&SyncRequestBody {
                request: "sync",
                timestamp: *timestamp,
            })?,
        };
        Ok(payload)
    }
}
