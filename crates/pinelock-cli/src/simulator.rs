//! Simulated front panel driven from stdin.
//!
//! Each console line is one action:
//!
//! ```text
//! keys 4821#        type on the keypad
//! card 04AB12CD     hold a card on the reader
//! nocard            take it away
//! door open|closed  set the door contact
//! shake             one vibration pulse
//! ```

use anyhow::{Context, Result, bail};
use pinelock_core::CardUid;
use pinelock_core::constants::DEFAULT_MAX_UID_LENGTH;
use pinelock_engine::Peripherals;
use pinelock_hardware::mock::{
    MockInput, MockInputHandle, MockKeypad, MockKeypadHandle, MockOutput, MockRfid, MockRfidHandle,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Time the vibration switch stays closed for one `shake`.
const PULSE_LENGTH: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    Keys(String),
    Card(CardUid),
    NoCard,
    Door { open: bool },
    Shake,
}

impl PanelAction {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();

        let action = match (verb, arg) {
            ("keys", Some(keys)) => PanelAction::Keys(keys.to_string()),
            ("card", Some(uid)) => PanelAction::Card(
                CardUid::new(uid, DEFAULT_MAX_UID_LENGTH).context("invalid card UID")?,
            ),
            ("nocard", None) => PanelAction::NoCard,
            ("door", Some("open")) => PanelAction::Door { open: true },
            ("door", Some("closed")) => PanelAction::Door { open: false },
            ("shake", None) => PanelAction::Shake,
            _ => bail!("unknown panel action: {line}"),
        };
        Ok(Some(action))
    }
}

/// Handles to the simulated peripherals.
#[derive(Debug, Clone)]
pub struct Panel {
    keys: MockKeypadHandle,
    rfid: MockRfidHandle,
    door: MockInputHandle,
    vibration: MockInputHandle,
}

impl Panel {
    /// Build mock peripherals and the panel controlling them.
    pub fn new() -> (Self, Peripherals) {
        let (keypad, keys) = MockKeypad::new();
        let (reader, rfid) = MockRfid::new();
        let (door_input, door) = MockInput::new();
        let (vibration_input, vibration) = MockInput::new();

        let peripherals = Peripherals {
            keypad: Box::new(keypad),
            rfid: Box::new(reader),
            lock_output: Box::new(MockOutput::new().0),
            buzzer_output: Box::new(MockOutput::new().0),
            vibration_input: Box::new(vibration_input),
            door_input: Box::new(door_input),
        };

        (
            Self {
                keys,
                rfid,
                door,
                vibration,
            },
            peripherals,
        )
    }

    pub async fn apply(&self, action: PanelAction) -> Result<()> {
        match action {
            PanelAction::Keys(keys) => self.keys.type_keys(&keys)?,
            PanelAction::Card(uid) => self.rfid.present_card(uid),
            PanelAction::NoCard => self.rfid.remove_card(),
            PanelAction::Door { open } => self.door.set(open),
            PanelAction::Shake => {
                self.vibration.set(true);
                tokio::time::sleep(PULSE_LENGTH).await;
                self.vibration.set(false);
            }
        }
        Ok(())
    }

    /// Read panel actions from stdin until it closes.
    pub async fn drive_from_stdin(self) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        info!("Panel ready: keys <digits>, card <uid>, nocard, door open|closed, shake");

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };

            let applied = match PanelAction::parse(&line) {
                Ok(Some(action)) => self.apply(action).await,
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = applied {
                warn!(error = %e, "Panel action rejected");
            }
        }
    }
}
