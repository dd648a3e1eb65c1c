//! Keypad and RFID reader front end.
//!
//! Raw keypad scans and reader polls go in, access attempts come out:
//!
//! - [`PinEntry`] turns held-key scans into discrete presses and collects
//!   them into a PIN submission
//! - [`RfidPresence`] smooths reader flicker into one arrival and one
//!   departure per card
//!
//! Neither looks at credentials. Validation happens in the device once an
//! [`InputEvent`] is produced.

use pinelock_core::config::{KeypadSection, RfidSection};
use pinelock_core::{CardUid, MonoTime};
use pinelock_hardware::{Keypad, KeypadKey, RfidReader, RfidReading};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Access attempt or presence edge seen on the local inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// `#` pressed with a non-empty buffer.
    PinSubmitted(String),
    CardArrived(CardUid),
    CardDeparted(CardUid),
}

/// Pending PIN buffer with key debounce.
#[derive(Debug, Clone)]
pub struct PinEntry {
    buffer: String,
    max_len: usize,
    debounce: Duration,
    last: Option<(KeypadKey, MonoTime)>,
}

impl PinEntry {
    pub fn new(max_len: usize, debounce: Duration) -> Self {
        Self {
            buffer: String::with_capacity(max_len),
            max_len,
            debounce,
            last: None,
        }
    }

    /// Digits collected so far.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one keypad scan. Returns the buffer when it is submitted.
    pub fn on_scan(&mut self, scan: Option<KeypadKey>, now: MonoTime) -> Option<String> {
        let key = scan?;
        if !self.accept(key, now) {
            return None;
        }

        match key {
            KeypadKey::Digit(d) => {
                if self.buffer.len() < self.max_len {
                    self.buffer.push(char::from(b'0' + d));
                } else {
                    debug!(max = self.max_len, "PIN buffer full, digit dropped");
                }
                None
            }
            KeypadKey::Star => {
                debug!("PIN buffer cleared");
                self.buffer.clear();
                None
            }
            KeypadKey::Hash => {
                if self.buffer.is_empty() {
                    debug!("Empty PIN submit ignored");
                    return None;
                }
                Some(std::mem::take(&mut self.buffer))
            }
            KeypadKey::Letter(_) => None,
        }
    }

    /// A scan is a new press if the key changed or the debounce has passed
    /// since the last accepted press.
    fn accept(&mut self, key: KeypadKey, now: MonoTime) -> bool {
        let fresh = match self.last {
            Some((last_key, at)) => last_key != key || now.has_elapsed(at, self.debounce),
            None => true,
        };
        if fresh {
            self.last = Some((key, now));
        }
        fresh
    }
}

/// Change in effective card presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Arrived(CardUid),
    Departed(CardUid),
}

/// Grace-period smoothing of reader polls.
///
/// A card counts as present from its first read until no read has seen it
/// for `grace`. A different UID read while a card is present replaces it:
/// the old card departs and the new one arrives in the same poll.
#[derive(Debug, Clone)]
pub struct RfidPresence {
    poll_interval: Duration,
    grace: Duration,
    last_poll: Option<MonoTime>,
    present: Option<CardUid>,
    last_seen: MonoTime,
}

impl RfidPresence {
    pub fn new(poll_interval: Duration, grace: Duration) -> Self {
        Self {
            poll_interval,
            grace,
            last_poll: None,
            present: None,
            last_seen: MonoTime::default(),
        }
    }

    pub fn card(&self) -> Option<&CardUid> {
        self.present.as_ref()
    }

    /// Whether the reader should be polled at `now`. Marks the poll as taken.
    pub fn poll_due(&mut self, now: MonoTime) -> bool {
        let due = self
            .last_poll
            .is_none_or(|last| now.has_elapsed(last, self.poll_interval));
        if due {
            self.last_poll = Some(now);
        }
        due
    }

    /// Fold one reading into the effective presence.
    ///
    /// [`RfidReading::Unresponsive`] leaves presence untouched; the caller
    /// reinitializes the reader.
    pub fn observe(&mut self, reading: &RfidReading, now: MonoTime) -> Vec<PresenceChange> {
        match reading {
            RfidReading::Card(uid) => {
                self.last_seen = now;
                if self.present.as_ref() == Some(uid) {
                    return Vec::new();
                }
                let mut changes = Vec::with_capacity(2);
                if let Some(previous) = self.present.replace(uid.clone()) {
                    debug!(seen = %uid, previous = %previous, "Card swapped within grace period");
                    changes.push(PresenceChange::Departed(previous));
                }
                changes.push(PresenceChange::Arrived(uid.clone()));
                changes
            }
            RfidReading::NoCard if now.has_elapsed(self.last_seen, self.grace) => {
                self.present.take().map(PresenceChange::Departed).into_iter().collect()
            }
            RfidReading::NoCard | RfidReading::Unresponsive => Vec::new(),
        }
    }
}

/// Owns the keypad and reader and produces [`InputEvent`]s.
pub struct InputAggregator {
    keypad: Box<dyn Keypad>,
    reader: Box<dyn RfidReader>,
    pin: PinEntry,
    presence: RfidPresence,
}

impl InputAggregator {
    pub fn new(
        keypad: Box<dyn Keypad>,
        reader: Box<dyn RfidReader>,
        keypad_settings: &KeypadSection,
        rfid_settings: &RfidSection,
        max_pin_length: usize,
    ) -> Self {
        Self {
            keypad,
            reader,
            pin: PinEntry::new(max_pin_length, keypad_settings.debounce()),
            presence: RfidPresence::new(rfid_settings.poll_interval(), rfid_settings.grace_period()),
        }
    }

    pub fn pending_digits(&self) -> usize {
        self.pin.pending()
    }

    /// Card currently in the reader field, after grace smoothing.
    pub fn card_in_field(&self) -> Option<&CardUid> {
        self.presence.card()
    }

    /// Take one keypad scan and, when due, one reader poll.
    pub fn poll(&mut self, now: MonoTime) -> Vec<InputEvent> {
        let mut events = Vec::new();

        match self.keypad.read_key() {
            Ok(scan) => {
                if let Some(pin) = self.pin.on_scan(scan, now) {
                    events.push(InputEvent::PinSubmitted(pin));
                }
            }
            Err(e) => warn!(error = %e, "Keypad scan failed"),
        }

        if self.presence.poll_due(now) {
            match self.reader.poll() {
                Ok(RfidReading::Unresponsive) => self.reinitialize_reader(),
                Ok(reading) => {
                    for change in self.presence.observe(&reading, now) {
                        match change {
                            PresenceChange::Arrived(uid) => {
                                info!(uid = %uid, "Card detected");
                                events.push(InputEvent::CardArrived(uid));
                            }
                            PresenceChange::Departed(uid) => {
                                info!(uid = %uid, "Card removed");
                                events.push(InputEvent::CardDeparted(uid));
                            }
                        }
                    }
                }
                Err(e) => warn!(error = %e, "RFID poll failed"),
            }
        }

        events
    }

    fn reinitialize_reader(&mut self) {
        warn!("RFID reader unresponsive, reinitializing");
        if let Err(e) = self.reader.reinitialize() {
            warn!(error = %e, "RFID reinitialize failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinelock_hardware::mock::{MockKeypad, MockRfid};
    use rstest::rstest;

    fn at(ms: u32) -> MonoTime {
        MonoTime::from_millis(ms)
    }

    fn key(c: char) -> Option<KeypadKey> {
        KeypadKey::from_char(c)
    }

    /// Feed each legend 10ms apart, returning every submission.
    fn type_into(entry: &mut PinEntry, keys: &str, start: u32) -> Vec<String> {
        keys.chars()
            .zip((start..).step_by(10))
            .filter_map(|(c, ms)| entry.on_scan(key(c), at(ms)))
            .collect()
    }

    #[test]
    fn test_clear_then_submit() {
        let mut entry = PinEntry::new(10, Duration::from_millis(500));
        let submitted = type_into(&mut entry, "482*4821#", 0);

        assert_eq!(submitted, vec!["4821".to_string()]);
        assert_eq!(entry.pending(), 0);
    }

    #[test]
    fn test_digits_past_max_are_dropped() {
        let mut entry = PinEntry::new(4, Duration::from_millis(500));
        assert_eq!(type_into(&mut entry, "123456#", 0), vec!["1234".to_string()]);
    }

    #[rstest]
    #[case("#")]
    #[case("12*#")]
    fn test_empty_submit_ignored(#[case] keys: &str) {
        let mut entry = PinEntry::new(10, Duration::from_millis(500));
        assert!(type_into(&mut entry, keys, 0).is_empty());
    }

    #[test]
    fn test_letters_ignored() {
        let mut entry = PinEntry::new(10, Duration::from_millis(500));
        assert_eq!(type_into(&mut entry, "1A2B#", 0), vec!["12".to_string()]);
    }

    #[test]
    fn test_held_key_is_debounced() {
        let mut entry = PinEntry::new(10, Duration::from_millis(500));
        for ms in (0..400).step_by(20) {
            entry.on_scan(key('7'), at(ms));
        }
        assert_eq!(entry.pending(), 1);

        entry.on_scan(key('7'), at(500));
        assert_eq!(entry.pending(), 2);
    }

    #[test]
    fn test_idle_scans_do_nothing() {
        let mut entry = PinEntry::new(10, Duration::from_millis(500));
        entry.on_scan(key('5'), at(0));
        entry.on_scan(None, at(10));
        entry.on_scan(key('5'), at(20));
        assert_eq!(entry.pending(), 1);
    }

    fn uid(hex: &str) -> CardUid {
        CardUid::new(hex, 19).unwrap()
    }

    fn presence() -> RfidPresence {
        RfidPresence::new(Duration::from_millis(500), Duration::from_millis(1_500))
    }

    #[test]
    fn test_presence_reports_each_edge_once() {
        let mut p = presence();
        let card = RfidReading::Card(uid("DEADBEEF"));

        assert_eq!(p.observe(&card, at(0)), vec![PresenceChange::Arrived(uid("DEADBEEF"))]);
        assert!(p.observe(&card, at(500)).is_empty());
        assert!(p.observe(&RfidReading::NoCard, at(1_000)).is_empty());
        assert!(p.observe(&RfidReading::NoCard, at(1_999)).is_empty());
        assert_eq!(
            p.observe(&RfidReading::NoCard, at(2_000)),
            vec![PresenceChange::Departed(uid("DEADBEEF"))]
        );
        assert!(p.observe(&RfidReading::NoCard, at(2_500)).is_empty());
        assert!(p.card().is_none());
    }

    #[test]
    fn test_presence_flicker_within_grace() {
        let mut p = presence();
        let card = RfidReading::Card(uid("01020304"));

        p.observe(&card, at(0));
        p.observe(&RfidReading::NoCard, at(500));
        p.observe(&RfidReading::NoCard, at(1_000));
        assert!(p.observe(&card, at(1_400)).is_empty());
        assert!(p.observe(&RfidReading::NoCard, at(2_500)).is_empty());
        assert!(p.card().is_some());
    }

    #[test]
    fn test_presence_card_swap_within_grace() {
        let mut p = presence();
        p.observe(&RfidReading::Card(uid("AAAA0001")), at(0));
        p.observe(&RfidReading::NoCard, at(500));

        let swapped = RfidReading::Card(uid("BBBB0002"));
        assert_eq!(
            p.observe(&swapped, at(1_000)),
            vec![
                PresenceChange::Departed(uid("AAAA0001")),
                PresenceChange::Arrived(uid("BBBB0002")),
            ]
        );
        for ms in (1_500..20_000).step_by(500) {
            assert!(p.observe(&swapped, at(ms)).is_empty());
        }
        assert_eq!(p.card(), Some(&uid("BBBB0002")));
    }

    #[test]
    fn test_unresponsive_does_not_count_as_absence() {
        let mut p = presence();
        p.observe(&RfidReading::Card(uid("AA")), at(0));
        assert!(p.observe(&RfidReading::Unresponsive, at(5_000)).is_empty());
        assert!(p.card().is_some());
    }

    #[test]
    fn test_poll_interval() {
        let mut p = presence();
        assert!(p.poll_due(at(0)));
        assert!(!p.poll_due(at(499)));
        assert!(p.poll_due(at(500)));
    }

    #[test]
    fn test_aggregator_reinitializes_unresponsive_reader() {
        let (keypad, _keys) = MockKeypad::new();
        let (reader, rfid) = MockRfid::new();
        let mut inputs = InputAggregator::new(
            Box::new(keypad),
            Box::new(reader),
            &KeypadSection::default(),
            &RfidSection::default(),
            10,
        );

        rfid.set_unresponsive(true);
        assert!(inputs.poll(at(0)).is_empty());
        assert_eq!(rfid.reinit_count(), 1);

        rfid.present_card(uid("CAFE"));
        assert_eq!(inputs.poll(at(500)), vec![InputEvent::CardArrived(uid("CAFE"))]);
    }

    #[test]
    fn test_aggregator_submits_pin() {
        let (keypad, keys) = MockKeypad::new();
        let (reader, _rfid) = MockRfid::new();
        let mut inputs = InputAggregator::new(
            Box::new(keypad),
            Box::new(reader),
            &KeypadSection::default(),
            &RfidSection::default(),
            10,
        );

        keys.type_keys("4821#").unwrap();
        let mut events = Vec::new();
        for ms in (0..100).step_by(10) {
            events.extend(inputs.poll(at(ms)));
        }
        assert_eq!(events, vec![InputEvent::PinSubmitted("4821".into())]);
        assert_eq!(inputs.pending_digits(), 0);
    }
}
