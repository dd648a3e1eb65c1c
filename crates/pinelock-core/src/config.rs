//! Device configuration loaded from TOML.
//!
//! Every section and every field has a default, so an empty file yields a
//! working configuration. Durations are written as millisecond integers and
//! exposed as [`Duration`] through accessor methods.
//!
//! ```
//! use pinelock_core::DeviceConfig;
//! use std::time::Duration;
//!
//! let config = DeviceConfig::from_toml_str(r#"
//!     [device]
//!     id = "lock_007"
//!
//!     [timing]
//!     lock_duration_ms = 8000
//! "#).unwrap();
//!
//! assert_eq!(config.device.id, "lock_007");
//! assert_eq!(config.timing.lock_duration(), Duration::from_secs(8));
//! assert_eq!(config.access.max_pin_codes, 50);
//! ```

use crate::constants::*;
use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub device: DeviceSection,
    pub broker: BrokerSection,
    pub timing: TimingSection,
    pub access: AccessSection,
    pub keypad: KeypadSection,
    pub rfid: RfidSection,
    pub alarm: AlarmSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub id: String,
    pub topic_prefix: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            id: DEFAULT_DEVICE_ID.to_string(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    pub address: String,
    /// Defaults to `PineLock-<device id>` when unset.
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub reconnect_delay_ms: u64,
    pub poll_timeout_ms: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            address: DEFAULT_BROKER_ADDRESS.to_string(),
            client_id: None,
            username: None,
            password: None,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
        }
    }
}

impl BrokerSection {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub heartbeat_interval_ms: u64,
    pub lock_duration_ms: u64,
    pub loop_interval_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            lock_duration_ms: DEFAULT_LOCK_DURATION_MS,
            loop_interval_ms: DEFAULT_LOOP_INTERVAL_MS,
        }
    }
}

impl TimingSection {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn lock_duration(&self) -> Duration {
        Duration::from_millis(self.lock_duration_ms)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessSection {
    pub max_pin_codes: usize,
    pub max_rfid_cards: usize,
    pub max_pin_length: usize,
    pub max_uid_length: usize,
    /// Seeded into the PIN table at startup when no credentials were restored.
    pub default_pins: Vec<String>,
}

impl Default for AccessSection {
    fn default() -> Self {
        Self {
            max_pin_codes: DEFAULT_MAX_PIN_CODES,
            max_rfid_cards: DEFAULT_MAX_RFID_CARDS,
            max_pin_length: DEFAULT_MAX_PIN_LENGTH,
            max_uid_length: DEFAULT_MAX_UID_LENGTH,
            default_pins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypadSection {
    pub debounce_ms: u64,
}

impl Default for KeypadSection {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_KEY_DEBOUNCE_MS,
        }
    }
}

impl KeypadSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RfidSection {
    pub poll_interval_ms: u64,
    pub grace_period_ms: u64,
    pub buzz_on_rejected_card: bool,
}

impl Default for RfidSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_RFID_POLL_INTERVAL_MS,
            grace_period_ms: DEFAULT_RFID_GRACE_PERIOD_MS,
            buzz_on_rejected_card: false,
        }
    }
}

impl RfidSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmSection {
    pub vibration_threshold: u32,
    pub vibration_window_ms: u64,
    pub pulse_debounce_ms: u64,
    pub door_settle_ms: u64,
    pub door_open_alert_ms: u64,
    pub alarm_buzzer_ms: u64,
    pub feedback_buzzer_ms: u64,
}

impl Default for AlarmSection {
    fn default() -> Self {
        Self {
            vibration_threshold: DEFAULT_VIBRATION_THRESHOLD,
            vibration_window_ms: DEFAULT_VIBRATION_WINDOW_MS,
            pulse_debounce_ms: DEFAULT_PULSE_DEBOUNCE_MS,
            door_settle_ms: DEFAULT_DOOR_SETTLE_MS,
            door_open_alert_ms: DEFAULT_DOOR_OPEN_ALERT_MS,
            alarm_buzzer_ms: DEFAULT_ALARM_BUZZER_MS,
            feedback_buzzer_ms: DEFAULT_FEEDBACK_BUZZER_MS,
        }
    }
}

impl AlarmSection {
    pub fn vibration_window(&self) -> Duration {
        Duration::from_millis(self.vibration_window_ms)
    }

    pub fn pulse_debounce(&self) -> Duration {
        Duration::from_millis(self.pulse_debounce_ms)
    }

    pub fn door_settle(&self) -> Duration {
        Duration::from_millis(self.door_settle_ms)
    }

    pub fn door_open_alert(&self) -> Duration {
        Duration::from_millis(self.door_open_alert_ms)
    }

    pub fn alarm_buzzer(&self) -> Duration {
        Duration::from_millis(self.alarm_buzzer_ms)
    }

    pub fn feedback_buzzer(&self) -> Duration {
        Duration::from_millis(self.feedback_buzzer_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORAGE_PATH),
        }
    }
}

impl DeviceConfig {
    /// Parse and validate a configuration document.
    ///
    /// # Errors
    /// Returns `Error::ConfigParse` for malformed TOML and `Error::Config`
    /// when a value fails [`validate`](Self::validate).
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: DeviceConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the errors
    /// of [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check values that would make the device unusable.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        validate_topic_segment("device.id", &self.device.id)?;
        validate_topic_segment("device.topic_prefix", &self.device.topic_prefix)?;

        if self.access.max_pin_codes == 0 {
            return Err(Error::Config("access.max_pin_codes must be positive".into()));
        }
        if self.access.max_rfid_cards == 0 {
            return Err(Error::Config("access.max_rfid_cards must be positive".into()));
        }
        if self.access.max_pin_length == 0 {
            return Err(Error::Config("access.max_pin_length must be positive".into()));
        }
        if self.access.max_uid_length == 0 {
            return Err(Error::Config("access.max_uid_length must be positive".into()));
        }
        if self.alarm.vibration_threshold == 0 {
            return Err(Error::Config("alarm.vibration_threshold must be positive".into()));
        }
        if self.timing.heartbeat_interval_ms == 0 {
            return Err(Error::Config(
                "timing.heartbeat_interval_ms must be positive".into(),
            ));
        }
        if self.broker.address.is_empty() {
            return Err(Error::MissingConfig("broker.address".into()));
        }

        Ok(())
    }

    /// Client identifier presented to the broker.
    pub fn client_id(&self) -> String {
        self.broker
            .client_id
            .clone()
            .unwrap_or_else(|| format!("{CLIENT_ID_PREFIX}{}", self.device.id))
    }
}

fn validate_topic_segment(key: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::MissingConfig(key.to_string()));
    }
    if value.contains(['/', '+', '#']) || value.contains(char::is_whitespace) {
        return Err(Error::Config(format!(
            "{key} must not contain '/', '+', '#' or whitespace, got {value:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DeviceConfig::from_toml_str("").unwrap();
        assert_eq!(config, DeviceConfig::default());
        assert_eq!(config.device.topic_prefix, "pinelock");
        assert_eq!(config.timing.lock_duration(), Duration::from_secs(5));
        assert_eq!(config.broker.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.client_id(), "PineLock-lock_001");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = DeviceConfig::from_toml_str(
            r#"
            [alarm]
            vibration_threshold = 3

            [access]
            default_pins = ["1234"]
            "#,
        )
        .unwrap();

        assert_eq!(config.alarm.vibration_threshold, 3);
        assert_eq!(config.alarm.vibration_window(), Duration::from_secs(2));
        assert_eq!(config.access.default_pins, vec!["1234".to_string()]);
        assert_eq!(config.access.max_rfid_cards, 50);
    }

    #[test]
    fn test_explicit_client_id() {
        let config = DeviceConfig::from_toml_str(
            r#"
            [broker]
            client_id = "front-door"
            "#,
        )
        .unwrap();
        assert_eq!(config.client_id(), "front-door");
    }

    #[rstest]
    #[case("[device]\nid = \"\"")]
    #[case("[device]\nid = \"lock/1\"")]
    #[case("[device]\ntopic_prefix = \"a#b\"")]
    #[case("[access]\nmax_pin_codes = 0")]
    #[case("[access]\nmax_pin_length = 0")]
    #[case("[alarm]\nvibration_threshold = 0")]
    #[case("[broker]\naddress = \"\"")]
    fn test_invalid_values_rejected(#[case] source: &str) {
        assert!(DeviceConfig::from_toml_str(source).is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = DeviceConfig::from_toml_str("[device\nid = 1");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }
}
