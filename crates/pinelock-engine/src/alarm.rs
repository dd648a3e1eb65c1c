//! Tamper detection and the buzzer.
//!
//! [`VibrationMonitor`] and [`DoorMonitor`] are pure signal processors fed
//! one sampled level per tick. [`AlarmController`] owns the sensor inputs
//! and the buzzer output and wires them together.

use pinelock_core::config::AlarmSection;
use pinelock_core::{AlertKind, MonoTime};
use pinelock_hardware::{DigitalInput, DigitalOutput};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counts shock pulses inside a rolling window.
///
/// A pulse is a rising edge on the vibration switch, accepted only if the
/// previous accepted pulse is at least `pulse_debounce` old. The window opens
/// at the first counted pulse. Reaching `threshold` inside it fires and
/// resets; letting it lapse resets without firing.
#[derive(Debug, Clone)]
pub struct VibrationMonitor {
    threshold: u32,
    window: Duration,
    pulse_debounce: Duration,
    last_level: bool,
    last_pulse: Option<MonoTime>,
    window_start: Option<MonoTime>,
    count: u32,
}

impl VibrationMonitor {
    pub fn new(threshold: u32, window: Duration, pulse_debounce: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            window,
            pulse_debounce,
            last_level: false,
            last_pulse: None,
            window_start: None,
            count: 0,
        }
    }

    /// Pulses counted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Feed one sample. Returns `true` when the threshold is reached.
    pub fn sample(&mut self, level: bool, now: MonoTime) -> bool {
        if let Some(start) = self.window_start
            && now.has_elapsed(start, self.window)
        {
            debug!(count = self.count, "Vibration window lapsed");
            self.count = 0;
            self.window_start = None;
        }

        let rising = level && !self.last_level;
        self.last_level = level;
        if !rising {
            return false;
        }

        let debounced = self
            .last_pulse
            .is_none_or(|last| now.has_elapsed(last, self.pulse_debounce));
        if !debounced {
            return false;
        }

        self.last_pulse = Some(now);
        if self.count == 0 {
            self.window_start = Some(now);
        }
        self.count += 1;
        debug!(count = self.count, threshold = self.threshold, "Vibration pulse");

        if self.count >= self.threshold {
            self.count = 0;
            self.window_start = None;
            return true;
        }
        false
    }
}

/// What one door sample produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoorUpdate {
    /// New accepted state, `true` for open.
    pub changed: Option<bool>,
    /// The door has now been open past the alert duration.
    pub open_too_long: bool,
}

/// Door contact with settle filtering and a one-shot open-too-long alert.
///
/// A level that differs from the accepted state becomes pending; it is
/// accepted only if it still reads the same once `settle` has passed. A
/// sample matching the accepted state in between discards it as noise.
#[derive(Debug, Clone)]
pub struct DoorMonitor {
    settle: Duration,
    open_alert_after: Duration,
    open: bool,
    pending_since: Option<MonoTime>,
    opened_at: Option<MonoTime>,
    alerted: bool,
}

impl DoorMonitor {
    pub fn new(initially_open: bool, now: MonoTime, settle: Duration, open_alert_after: Duration) -> Self {
        Self {
            settle,
            open_alert_after,
            open: initially_open,
            pending_since: None,
            opened_at: initially_open.then_some(now),
            alerted: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn sample(&mut self, level_open: bool, now: MonoTime) -> DoorUpdate {
        let mut update = DoorUpdate::default();

        if level_open == self.open {
            if self.pending_since.take().is_some() {
                debug!("Door edge did not settle, ignoring");
            }
        } else {
            let since = *self.pending_since.get_or_insert(now);
            if now.has_elapsed(since, self.settle) {
                self.pending_since = None;
                self.open = level_open;
                self.opened_at = level_open.then_some(now);
                self.alerted = false;
                update.changed = Some(level_open);
                info!(open = level_open, "Door state changed");
            }
        }

        if let Some(opened_at) = self.opened_at
            && !self.alerted
            && now.has_elapsed(opened_at, self.open_alert_after)
        {
            self.alerted = true;
            update.open_too_long = true;
            warn!("Door open too long");
        }

        update
    }
}

/// Timed audible output.
///
/// The stop point is kept as a start time plus a length and compared with
/// [`MonoTime::has_elapsed`], so a counter wrap silences early rather than
/// never.
pub struct Buzzer {
    output: Box<dyn DigitalOutput>,
    started: Option<MonoTime>,
    length: Duration,
}

impl Buzzer {
    pub fn new(output: Box<dyn DigitalOutput>) -> Self {
        Self {
            output,
            started: None,
            length: Duration::ZERO,
        }
    }

    pub fn is_active(&self) -> bool {
        self.started.is_some()
    }

    /// Sound for `duration`. While already sounding, the longer of the
    /// remaining time and `duration` wins.
    pub fn activate(&mut self, now: MonoTime, duration: Duration) {
        let remaining = self
            .started
            .and_then(|started| now.elapsed_since(started))
            .map(|elapsed| self.length.saturating_sub(elapsed))
            .unwrap_or(Duration::ZERO);

        self.length = duration.max(remaining);
        if self.started.replace(now).is_none() {
            self.drive(true);
        }
        debug!(ms = self.length.as_millis() as u64, "Buzzer on");
    }

    /// Silence once the deadline has passed.
    pub fn tick(&mut self, now: MonoTime) {
        if let Some(started) = self.started
            && now.has_elapsed(started, self.length)
        {
            self.started = None;
            self.drive(false);
            debug!("Buzzer off");
        }
    }

    fn drive(&mut self, active: bool) {
        if let Err(e) = self.output.set_active(active) {
            warn!(error = %e, active, "Failed to drive buzzer");
        }
    }
}

/// Alarm outcome reported to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    Alert(AlertKind),
    DoorChanged { open: bool },
}

/// Vibration switch, door contact and buzzer.
pub struct AlarmController {
    vibration_input: Box<dyn DigitalInput>,
    door_input: Box<dyn DigitalInput>,
    vibration: VibrationMonitor,
    door: DoorMonitor,
    buzzer: Buzzer,
    alarm_buzz: Duration,
    feedback_buzz: Duration,
}

fn read_level(input: &mut dyn DigitalInput, name: &str) -> Option<bool> {
    match input.is_active() {
        Ok(level) => Some(level),
        Err(e) => {
            warn!(error = %e, input = name, "Sensor read failed");
            None
        }
    }
}

impl AlarmController {
    /// The door's current level is taken as its initial accepted state.
    pub fn new(
        settings: &AlarmSection,
        vibration_input: Box<dyn DigitalInput>,
        mut door_input: Box<dyn DigitalInput>,
        buzzer_output: Box<dyn DigitalOutput>,
        now: MonoTime,
    ) -> Self {
        let initially_open = read_level(door_input.as_mut(), "door").unwrap_or(false);
        Self {
            vibration_input,
            door_input,
            vibration: VibrationMonitor::new(
                settings.vibration_threshold,
                settings.vibration_window(),
                settings.pulse_debounce(),
            ),
            door: DoorMonitor::new(initially_open, now, settings.door_settle(), settings.door_open_alert()),
            buzzer: Buzzer::new(buzzer_output),
            alarm_buzz: settings.alarm_buzzer(),
            feedback_buzz: settings.feedback_buzzer(),
        }
    }

    pub fn is_door_open(&self) -> bool {
        self.door.is_open()
    }

    pub fn is_buzzing(&self) -> bool {
        self.buzzer.is_active()
    }

    /// Sample both sensors, then service the buzzer deadline.
    ///
    /// A vibration alert sounds the alarm buzzer before it is returned.
    pub fn poll(&mut self, now: MonoTime) -> Vec<AlarmEvent> {
        let mut events = Vec::new();

        if let Some(level) = read_level(self.vibration_input.as_mut(), "vibration")
            && self.vibration.sample(level, now)
        {
            warn!("Vibration alarm");
            self.buzzer.activate(now, self.alarm_buzz);
            events.push(AlarmEvent::Alert(AlertKind::Vibration));
        }

        if let Some(level) = read_level(self.door_input.as_mut(), "door") {
            let update = self.door.sample(level, now);
            if let Some(open) = update.changed {
                events.push(AlarmEvent::DoorChanged { open });
            }
            if update.open_too_long {
                events.push(AlarmEvent::Alert(AlertKind::DoorOpenTooLong));
            }
        }

        self.buzzer.tick(now);
        events
    }

    /// Short cue after a rejected credential.
    pub fn feedback(&mut self, now: MonoTime) {
        self.buzzer.activate(now, self.feedback_buzz);
    }

    /// Remote buzzer command; `None` uses the alarm duration.
    pub fn sound(&mut self, now: MonoTime, duration: Option<Duration>) {
        self.buzzer.activate(now, duration.unwrap_or(self.alarm_buzz));
    }
}
