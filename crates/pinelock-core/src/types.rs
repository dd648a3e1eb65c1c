use crate::{Result, error::Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Which credential table an identifier belongs to.
///
/// PIN codes and RFID cards live in independent namespaces: the same string
/// may exist in both tables without conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Pin,
    Rfid,
}

impl CredentialKind {
    /// Stable lowercase name, used in persistence keys and diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialKind::Pin => "pin",
            CredentialKind::Rfid => "rfid",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keypad PIN code (ASCII digits only).
///
/// # Security
/// Equality is evaluated in constant time so that comparing a submitted code
/// against a stored one does not leak the length of the common prefix.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct PinCode(String);

impl PinCode {
    /// Create a PIN code, enforcing the configured maximum length.
    ///
    /// # Errors
    /// Returns `Error::InvalidPin` if the code is empty, longer than
    /// `max_len`, or contains anything other than ASCII digits.
    pub fn new(code: &str, max_len: usize) -> Result<Self> {
        if code.is_empty() {
            return Err(Error::InvalidPin("PIN must not be empty".to_string()));
        }

        let len = code.len();
        if len > max_len {
            return Err(Error::InvalidPin(format!(
                "PIN must be at most {max_len} digits, got {len}"
            )));
        }

        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidPin("PIN must contain only digits".to_string()));
        }

        Ok(PinCode(code.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The code with every digit replaced by `*`, for log output.
    #[must_use]
    pub fn masked(&self) -> String {
        "*".repeat(self.0.len())
    }
}

impl PartialEq for PinCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for PinCode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for PinCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// RFID transponder UID as an upper-case hex string.
///
/// The UID is normalized (trimmed and upper-cased) before validation, so
/// `"04ab12cd"` and `" 04AB12CD "` name the same card.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct CardUid(String);

impl CardUid {
    /// Create a card UID, enforcing the reader buffer bound.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardUid` if the normalized UID is empty, longer
    /// than `max_len`, or not ASCII.
    pub fn new(uid: &str, max_len: usize) -> Result<Self> {
        let uid = uid.trim().to_uppercase();

        if uid.is_empty() {
            return Err(Error::InvalidCardUid("UID must not be empty".to_string()));
        }

        let len = uid.len();
        if len > max_len {
            return Err(Error::InvalidCardUid(format!(
                "UID must be at most {max_len} chars, got {len}"
            )));
        }

        if !uid.is_ascii() {
            return Err(Error::InvalidCardUid("UID must be ASCII".to_string()));
        }

        Ok(CardUid(uid))
    }

    /// Render raw UID bytes the way the reader reports them: two upper-case
    /// hex digits per byte, no separators.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        CardUid(bytes.iter().map(|b| format!("{b:02X}")).collect())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for CardUid {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for CardUid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive validity window `[from, until]` for a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    from: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl TimeWindow {
    /// # Errors
    /// Returns `Error::InvalidTimeWindow` if `from` is after `until`.
    pub fn new(from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self> {
        if from > until {
            return Err(Error::InvalidTimeWindow(format!(
                "start {from} is after end {until}"
            )));
        }
        Ok(TimeWindow { from, until })
    }

    /// Build a window from optional bounds; a missing bound leaves that side
    /// open. Returns `Ok(None)` when neither bound is given.
    ///
    /// # Errors
    /// Returns `Error::InvalidTimeWindow` if both bounds are given and
    /// `from` is after `until`.
    pub fn from_bounds(
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>> {
        match (from, until) {
            (None, None) => Ok(None),
            (from, until) => TimeWindow::new(
                from.unwrap_or(DateTime::<Utc>::MIN_UTC),
                until.unwrap_or(DateTime::<Utc>::MAX_UTC),
            )
            .map(Some),
        }
    }

    #[must_use]
    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    #[must_use]
    pub fn until(&self) -> DateTime<Utc> {
        self.until
    }

    /// Inclusive on both ends.
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.from <= now && now <= self.until
    }
}

/// Physical lock output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Locked,
    Unlocked,
}

impl LockState {
    #[inline]
    #[must_use]
    pub fn is_locked(self) -> bool {
        matches!(self, LockState::Locked)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LockState::Locked => write!(f, "Locked"),
            LockState::Unlocked => write!(f, "Unlocked"),
        }
    }
}

/// Origin of an access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Pin,
    Rfid,
    Remote,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessKind::Pin => write!(f, "pin"),
            AccessKind::Rfid => write!(f, "rfid"),
            AccessKind::Remote => write!(f, "remote"),
        }
    }
}

/// Immutable record of one access attempt.
///
/// `method` is the credential identifier (PIN digits or card UID) or the
/// name of the remote command channel. `timestamp` is Unix seconds, or
/// uptime seconds when no wall clock is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub kind: AccessKind,
    pub method: String,
    pub success: bool,
    pub timestamp: i64,
}

impl AccessEvent {
    pub fn new(kind: AccessKind, method: impl Into<String>, success: bool, timestamp: i64) -> Self {
        Self {
            kind,
            method: method.into(),
            success,
            timestamp,
        }
    }
}

/// Alarm conditions reported to the remote controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Vibration,
    DoorOpenTooLong,
}

impl AlertKind {
    /// Wire tag for the `alert` topic.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Vibration => "vibration",
            AlertKind::DoorOpenTooLong => "door_open_too_long",
        }
    }

    /// Human-readable description sent alongside the tag.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            AlertKind::Vibration => "Repeated shock detected",
            AlertKind::DoorOpenTooLong => "Door left open",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
