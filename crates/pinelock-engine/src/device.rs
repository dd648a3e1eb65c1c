//! Owned state of one lock node and its two entry points.
//!
//! [`Device::tick`] advances every local timer and input by one loop
//! iteration. [`Device::handle_inbound`] applies one message from the
//! controller. Both return the messages to publish; the device never talks
//! to the transport itself, so every decision it makes can be checked
//! without a broker.

use crate::actuator::LockActuator;
use crate::alarm::{AlarmController, AlarmEvent};
use crate::error::Result;
use crate::input::{InputAggregator, InputEvent};
use pinelock_core::config::AccessSection;
use pinelock_core::{
    AccessEvent, AccessKind, CardUid, Clock, CredentialKind, DeviceConfig, MonoTime, PinCode,
};
use pinelock_hardware::{DigitalInput, DigitalOutput, Keypad, RfidReader};
use pinelock_protocol::{Command, ConfigSnapshot, InboundMessage, OutboundMessage, StatusReport};
use pinelock_storage::{CredentialStore, KeyValueStore, StoreLimits};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Every peripheral the node drives, handed over at construction.
pub struct Peripherals {
    pub keypad: Box<dyn Keypad>,
    pub rfid: Box<dyn RfidReader>,
    pub lock_output: Box<dyn DigitalOutput>,
    pub buzzer_output: Box<dyn DigitalOutput>,
    pub vibration_input: Box<dyn DigitalInput>,
    pub door_input: Box<dyn DigitalInput>,
}

/// Build the credential store and load what was persisted.
///
/// A backend that cannot be read leaves the tables empty. Default PINs are
/// seeded only when nothing was restored.
pub fn prepare_store(access: &AccessSection, backend: Box<dyn KeyValueStore>) -> CredentialStore {
    let mut store = CredentialStore::new(StoreLimits::from(access), backend);
    if let Err(e) = store.restore() {
        warn!(error = %e, "Could not restore credentials, starting empty");
    }
    store.seed_defaults(&access.default_pins);
    store
}

pub struct Device {
    clock: Box<dyn Clock>,
    store: CredentialStore,
    actuator: LockActuator,
    inputs: InputAggregator,
    alarm: AlarmController,
    key_tag: Option<CardUid>,
    max_uid_length: usize,
    heartbeat_interval: Duration,
    last_heartbeat: MonoTime,
    buzz_on_rejected_card: bool,
}

impl Device {
    /// Validate the configuration, take the peripherals and drive the lock
    /// to its locked state.
    ///
    /// # Errors
    /// Returns `EngineError::Config` for an invalid configuration and
    /// `EngineError::Hardware` if the lock output cannot be driven.
    pub fn new(
        config: &DeviceConfig,
        peripherals: Peripherals,
        store: CredentialStore,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let now = clock.monotonic();
        let actuator = LockActuator::new(peripherals.lock_output, config.timing.lock_duration())?;
        let inputs = InputAggregator::new(
            peripherals.keypad,
            peripherals.rfid,
            &config.keypad,
            &config.rfid,
            config.access.max_pin_length,
        );
        let alarm = AlarmController::new(
            &config.alarm,
            peripherals.vibration_input,
            peripherals.door_input,
            peripherals.buzzer_output,
            now,
        );

        info!(
            device = %config.device.id,
            pins = store.count(CredentialKind::Pin),
            cards = store.count(CredentialKind::Rfid),
            "Device ready"
        );

        Ok(Self {
            clock,
            store,
            actuator,
            inputs,
            alarm,
            key_tag: None,
            max_uid_length: config.access.max_uid_length,
            heartbeat_interval: config.timing.heartbeat_interval(),
            last_heartbeat: now,
            buzz_on_rejected_card: config.rfid.buzz_on_rejected_card,
        })
    }

    /// Current reading of the device's monotonic counter.
    pub fn monotonic(&self) -> MonoTime {
        self.clock.monotonic()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn is_locked(&self) -> bool {
        self.actuator.is_locked()
    }

    pub fn is_door_open(&self) -> bool {
        self.alarm.is_door_open()
    }

    pub fn is_buzzing(&self) -> bool {
        self.alarm.is_buzzing()
    }

    pub fn key_tag(&self) -> Option<&CardUid> {
        self.key_tag.as_ref()
    }

    /// Digits typed but not yet submitted.
    pub fn pending_digits(&self) -> usize {
        self.inputs.pending_digits()
    }

    /// Whether the configured key tag is in the reader field.
    pub fn is_key_present(&self) -> bool {
        match (&self.key_tag, self.inputs.card_in_field()) {
            (Some(tag), Some(card)) => tag == card,
            _ => false,
        }
    }

    pub fn status_report(&self) -> StatusReport {
        let is_key_present = self.is_key_present();
        StatusReport {
            is_locked: self.actuator.is_locked(),
            is_key_present,
            key_uid: self
                .key_tag
                .as_ref()
                .filter(|_| is_key_present)
                .map(|tag| tag.as_str().to_string()),
            is_door_open: self.alarm.is_door_open(),
            timestamp: self.clock.timestamp(),
        }
    }

    fn status(&self) -> OutboundMessage {
        OutboundMessage::Status(self.status_report())
    }

    fn sync_request(&self) -> OutboundMessage {
        OutboundMessage::SyncRequest {
            timestamp: self.clock.timestamp(),
        }
    }

    fn access(&self, kind: AccessKind, method: &str, success: bool) -> OutboundMessage {
        OutboundMessage::Access(AccessEvent::new(kind, method, success, self.clock.timestamp()))
    }

    /// Messages owed to the controller right after a (re)connect.
    pub fn on_connected(&self) -> Vec<OutboundMessage> {
        vec![self.status(), self.sync_request()]
    }

    /// One control loop iteration of local work.
    ///
    /// Inputs are handled first so an access decision and its status land in
    /// the same batch, then alarms, auto-relock and the heartbeat.
    pub fn tick(&mut self) -> Vec<OutboundMessage> {
        let now = self.clock.monotonic();
        let mut out = Vec::new();

        for event in self.inputs.poll(now) {
            self.on_input(event, now, &mut out);
        }

        for event in self.alarm.poll(now) {
            match event {
                AlarmEvent::Alert(kind) => out.push(OutboundMessage::Alert {
                    kind,
                    timestamp: self.clock.timestamp(),
                }),
                AlarmEvent::DoorChanged { .. } => out.push(self.status()),
            }
        }

        if self.actuator.tick(now) {
            out.push(self.status());
        }

        if now.has_elapsed(self.last_heartbeat, self.heartbeat_interval) {
            self.last_heartbeat = now;
            out.push(OutboundMessage::Heartbeat {
                timestamp: self.clock.timestamp(),
            });
        }

        out
    }

    fn on_input(&mut self, event: InputEvent, now: MonoTime, out: &mut Vec<OutboundMessage>) {
        match event {
            InputEvent::PinSubmitted(pin) => self.on_pin(&pin, now, out),
            InputEvent::CardArrived(uid) => self.on_card(&uid, now, out),
            InputEvent::CardDeparted(uid) => {
                if self.key_tag.as_ref() == Some(&uid) {
                    info!("Key tag removed");
                    out.push(self.status());
                }
            }
        }
    }

    fn on_pin(&mut self, pin: &str, now: MonoTime, out: &mut Vec<OutboundMessage>) {
        let granted = self.store.validate(CredentialKind::Pin, pin, self.clock.wall());
        let masked = PinCode::new(pin, usize::MAX)
            .map(|p| p.masked())
            .unwrap_or_default();

        if granted {
            info!(pin = %masked, "PIN accepted");
            self.actuator.unlock(now);
            out.push(self.status());
        } else {
            info!(pin = %masked, "PIN rejected");
            self.alarm.feedback(now);
        }
        out.push(self.access(AccessKind::Pin, pin, granted));
    }

    fn on_card(&mut self, uid: &CardUid, now: MonoTime, out: &mut Vec<OutboundMessage>) {
        if self.key_tag.as_ref() == Some(uid) {
            info!(uid = %uid, "Key tag present");
            out.push(self.status());
            return;
        }

        let granted = self
            .store
            .validate(CredentialKind::Rfid, uid.as_str(), self.clock.wall());
        if granted {
            info!(uid = %uid, "Card accepted");
            self.actuator.unlock(now);
            out.push(self.status());
        } else {
            info!(uid = %uid, "Card rejected");
            if self.buzz_on_rejected_card {
                self.alarm.feedback(now);
            }
        }
        out.push(self.access(AccessKind::Rfid, uid.as_str(), granted));
    }

    /// Apply one message from the controller.
    pub fn handle_inbound(&mut self, message: InboundMessage) -> Vec<OutboundMessage> {
        match message {
            InboundMessage::Command(command) => self.on_command(command),
            InboundMessage::Config(snapshot) => self.on_config(&snapshot),
            InboundMessage::Sync => {
                debug!("Sync requested by controller");
                vec![self.status(), self.sync_request()]
            }
        }
    }

    fn on_command(&mut self, command: Command) -> Vec<OutboundMessage> {
        let now = self.clock.monotonic();
        match command {
            Command::Lock => {
                info!("Remote lock");
                self.actuator.lock();
                vec![self.status(), self.access(AccessKind::Remote, "remote", true)]
            }
            Command::Unlock => {
                info!("Remote unlock");
                self.actuator.unlock(now);
                vec![self.status(), self.access(AccessKind::Remote, "remote", true)]
            }
            Command::AddCredential {
                kind,
                code,
                active,
                window,
            } => {
                if let Err(e) = self.store.add(kind, &code, active, window) {
                    warn!(kind = %kind, error = %e, "Remote add rejected");
                }
                Vec::new()
            }
            Command::RemoveCredential { kind, code } => {
                if let Err(e) = self.store.remove(kind, &code) {
                    warn!(kind = %kind, error = %e, "Remote remove rejected");
                }
                Vec::new()
            }
            Command::Buzzer { duration } => {
                self.alarm.sound(now, duration);
                Vec::new()
            }
        }
    }

    fn on_config(&mut self, snapshot: &ConfigSnapshot) -> Vec<OutboundMessage> {
        let was_present = self.is_key_present();

        let report = self
            .store
            .apply_snapshot(&snapshot.access_codes, &snapshot.rfid_cards);
        info!(
            pins = report.pins,
            cards = report.cards,
            skipped = report.skipped.len(),
            "Applied credential config"
        );

        self.key_tag = snapshot
            .key_tag()
            .and_then(|tag| match CardUid::new(tag, self.max_uid_length) {
                Ok(uid) => Some(uid),
                Err(e) => {
                    warn!(error = %e, "Ignoring key tag");
                    None
                }
            });

        if self.is_key_present() != was_present {
            vec![self.status()]
        } else {
            Vec::new()
        }
    }
}
