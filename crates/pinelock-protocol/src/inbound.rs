//! Messages received from the controller.
//!
//! Parsing is strict: a payload either yields a complete, validated message
//! or an error. Nothing is applied half-way.

use crate::error::{ProtocolError, Result};
use crate::topics::InboundTopic;
use chrono::{DateTime, TimeZone, Utc};
use pinelock_core::{CredentialKind, TimeWindow};
use serde::Deserialize;
use std::time::Duration;

/// Remote command addressed to this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lock,
    Unlock,
    /// `add_pin` / `add_card`: insert or overwrite a credential.
    AddCredential {
        kind: CredentialKind,
        code: String,
        active: bool,
        window: Option<TimeWindow>,
    },
    /// `remove_pin` / `remove_card`.
    RemoveCredential { kind: CredentialKind, code: String },
    /// Sound the buzzer; `None` uses the configured alarm duration.
    Buzzer { duration: Option<Duration> },
}

/// Full credential set pushed by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub access_codes: Vec<String>,
    #[serde(default)]
    pub rfid_cards: Vec<String>,
    #[serde(default)]
    pub key_tag: Option<String>,
}

impl ConfigSnapshot {
    /// Key tag UID, ignoring an empty or blank value.
    pub fn key_tag(&self) -> Option<&str> {
        self.key_tag
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Command(Command),
    Config(ConfigSnapshot),
    /// Controller asks for fresh status and a sync request.
    Sync,
}

/// Validity bound on the wire: Unix seconds or an RFC 3339 string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Unix(i64),
    Text(String),
}

impl WireTimestamp {
    fn resolve(self) -> Result<DateTime<Utc>> {
        match self {
            WireTimestamp::Unix(secs) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| ProtocolError::InvalidTimestamp(secs.to_string())),
            WireTimestamp::Text(text) => {
                if let Ok(secs) = text.trim().parse::<i64>() {
                    return WireTimestamp::Unix(secs).resolve();
                }
                DateTime::parse_from_rfc3339(text.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| ProtocolError::InvalidTimestamp(text))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCommand {
    action: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    valid_from: Option<WireTimestamp>,
    #[serde(default)]
    valid_until: Option<WireTimestamp>,
    #[serde(default)]
    duration_ms: Option<u64>,
}

impl WireCommand {
    fn require_code(&mut self, action: &'static str) -> Result<String> {
        self.code
            .take()
            .filter(|code| !code.is_empty())
            .ok_or(ProtocolError::MissingField { action, field: "code" })
    }

    fn window(&mut self) -> Result<Option<TimeWindow>> {
        let from = self.valid_from.take().map(WireTimestamp::resolve).transpose()?;
        let until = self.valid_until.take().map(WireTimestamp::resolve).transpose()?;
        TimeWindow::from_bounds(from, until).map_err(ProtocolError::InvalidWindow)
    }

    fn into_command(mut self) -> Result<Command> {
        let requested = std::mem::take(&mut self.action);
        let (action, kind) = match requested.as_str() {
            "lock" => return Ok(Command::Lock),
            "unlock" => return Ok(Command::Unlock),
            "buzzer" => {
                return Ok(Command::Buzzer {
                    duration: self.duration_ms.map(Duration::from_millis),
                });
            }
            "add_pin" => ("add_pin", CredentialKind::Pin),
            "add_card" => ("add_card", CredentialKind::Rfid),
            "remove_pin" => {
                let code = self.require_code("remove_pin")?;
                return Ok(Command::RemoveCredential {
                    kind: CredentialKind::Pin,
                    code,
                });
            }
            "remove_card" => {
                let code = self.require_code("remove_card")?;
                return Ok(Command::RemoveCredential {
                    kind: CredentialKind::Rfid,
                    code,
                });
            }
            other => return Err(ProtocolError::UnknownAction(other.to_string())),
        };

        let code = self.require_code(action)?;
        let window = self.window()?;
        Ok(Command::AddCredential {
            kind,
            code,
            active: self.active.unwrap_or(true),
            window,
        })
    }
}

impl InboundMessage {
    /// Parse the payload received on `topic`.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] describing why the payload was rejected.
    pub fn parse(topic: InboundTopic, payload: &[u8]) -> Result<Self> {
        match topic {
            InboundTopic::Command => {
                let wire: WireCommand = serde_json::from_slice(payload).map_err(|source| {
                    ProtocolError::Malformed {
                        topic: "command",
                        source,
                    }
                })?;
                wire.into_command().map(InboundMessage::Command)
            }
            InboundTopic::Config => serde_json::from_slice(payload)
                .map(InboundMessage::Config)
                .map_err(|source| ProtocolError::Malformed {
                    topic: "config",
                    source,
                }),
            InboundTopic::Sync => Ok(InboundMessage::Sync),
        }
    }
}
