//! Default values for the device configuration.
//!
//! These mirror the settings the lock node ships with. Every one of them can
//! be overridden from the TOML configuration file; see
//! [`DeviceConfig`](crate::DeviceConfig).

// ============================================================================
// Topics
// ============================================================================

/// Leading segment of every topic: `<prefix>/<device-id>/<suffix>`.
pub const DEFAULT_TOPIC_PREFIX: &str = "pinelock";

/// Device identifier used when none is configured.
pub const DEFAULT_DEVICE_ID: &str = "lock_001";

/// Client identifier prefix; the device id is appended.
pub const CLIENT_ID_PREFIX: &str = "PineLock-";

// ============================================================================
// Broker
// ============================================================================

pub const DEFAULT_BROKER_ADDRESS: &str = "127.0.0.1:1883";

/// Delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;

/// Upper bound on a single inbound poll of the message channel.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 5;

/// Longest broker frame accepted by the codec.
pub const MAX_FRAME_LENGTH: usize = 8 * 1024;

// ============================================================================
// Timing
// ============================================================================

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 60_000;

/// How long the lock stays open before relocking on its own.
pub const DEFAULT_LOCK_DURATION_MS: u64 = 5_000;

/// Pause at the end of every control loop iteration.
pub const DEFAULT_LOOP_INTERVAL_MS: u64 = 50;

// ============================================================================
// Credentials
// ============================================================================

pub const DEFAULT_MAX_PIN_CODES: usize = 50;
pub const DEFAULT_MAX_RFID_CARDS: usize = 50;

/// Longest accepted PIN; also the keypad buffer length.
pub const DEFAULT_MAX_PIN_LENGTH: usize = 10;

/// Longest accepted card UID, the reader buffer minus its terminator.
pub const DEFAULT_MAX_UID_LENGTH: usize = 19;

// ============================================================================
// Inputs
// ============================================================================

/// A held key is accepted again after this long.
pub const DEFAULT_KEY_DEBOUNCE_MS: u64 = 500;

pub const DEFAULT_RFID_POLL_INTERVAL_MS: u64 = 500;

/// A card missed by the reader for less than this is still considered present.
pub const DEFAULT_RFID_GRACE_PERIOD_MS: u64 = 1_500;

// ============================================================================
// Alarms
// ============================================================================

/// Pulses within the window needed to raise a vibration alert.
pub const DEFAULT_VIBRATION_THRESHOLD: u32 = 5;
pub const DEFAULT_VIBRATION_WINDOW_MS: u64 = 2_000;
pub const DEFAULT_PULSE_DEBOUNCE_MS: u64 = 50;

/// A door edge must persist this long to be accepted.
pub const DEFAULT_DOOR_SETTLE_MS: u64 = 100;
pub const DEFAULT_DOOR_OPEN_ALERT_MS: u64 = 60_000;

pub const DEFAULT_ALARM_BUZZER_MS: u64 = 3_000;

/// Short chirp after a rejected PIN.
pub const DEFAULT_FEEDBACK_BUZZER_MS: u64 = 200;

// ============================================================================
// Storage
// ============================================================================

pub const DEFAULT_STORAGE_PATH: &str = "pinelock-credentials.json";
