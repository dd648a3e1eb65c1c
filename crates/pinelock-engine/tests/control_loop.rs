//! End-to-end control loop tests against the in-memory broker.

use pinelock_core::{CardUid, DeviceConfig, ManualClock};
use pinelock_engine::{Device, Peripherals, Runtime, prepare_store};
use pinelock_hardware::mock::{
    MockInput, MockInputHandle, MockKeypad, MockKeypadHandle, MockOutput, MockOutputHandle,
    MockRfid, MockRfidHandle,
};
use pinelock_network::{CountingWatchdog, Delivery, MemoryTransport, MemoryTransportHandle};
use pinelock_storage::MemoryKeyValue;
use serde_json::{Value, json};
use std::time::Duration;

const STEP: Duration = Duration::from_millis(10);

struct Node {
    runtime: Runtime<MemoryTransport, CountingWatchdog>,
    broker: MemoryTransportHandle,
    watchdog: CountingWatchdog,
    clock: ManualClock,
    keys: MockKeypadHandle,
    rfid: MockRfidHandle,
    lock: MockOutputHandle,
    buzzer: MockOutputHandle,
    vibration: MockInputHandle,
    door: MockInputHandle,
    storage: MemoryKeyValue,
}

fn node(config: DeviceConfig) -> Node {
    let (keypad, keys) = MockKeypad::new();
    let (reader, rfid) = MockRfid::new();
    let (lock_output, lock) = MockOutput::new();
    let (buzzer_output, buzzer) = MockOutput::new();
    let (vibration_input, vibration) = MockInput::new();
    let (door_input, door) = MockInput::new();
    let clock = ManualClock::new();
    let storage = MemoryKeyValue::new();

    let store = prepare_store(&config.access, Box::new(storage.clone()));
    let peripherals = Peripherals {
        keypad: Box::new(keypad),
        rfid: Box::new(reader),
        lock_output: Box::new(lock_output),
        buzzer_output: Box::new(buzzer_output),
        vibration_input: Box::new(vibration_input),
        door_input: Box::new(door_input),
    };
    let device = Device::new(&config, peripherals, store, Box::new(clock.clone())).unwrap();

    let (transport, broker) = MemoryTransport::new();
    let watchdog = CountingWatchdog::new();
    let runtime = Runtime::new(&config, device, transport, watchdog.clone());

    Node {
        runtime,
        broker,
        watchdog,
        clock,
        keys,
        rfid,
        lock,
        buzzer,
        vibration,
        door,
        storage,
    }
}

impl Node {
    async fn run(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.runtime.run_iteration().await;
            self.clock.advance(STEP);
        }
    }

    /// Published messages on one topic suffix, as JSON, draining the record.
    fn take(&self, suffix: &str) -> Vec<Value> {
        let wanted = format!("pinelock/lock_001/{suffix}");
        self.broker
            .take_published()
            .into_iter()
            .filter(|d| d.topic == wanted)
            .map(|d| serde_json::from_str(&d.payload).unwrap())
            .collect()
    }

    fn send(&self, suffix: &str, body: Value) {
        self.broker
            .inject(format!("pinelock/lock_001/{suffix}"), body.to_string());
    }
}

#[tokio::test]
async fn test_connect_subscribes_and_greets() {
    let mut node = node(DeviceConfig::default());
    node.run(1).await;

    assert!(node.runtime.is_online());
    assert_eq!(
        node.broker.subscriptions(),
        vec![
            "pinelock/lock_001/command".to_string(),
            "pinelock/lock_001/config".to_string(),
            "pinelock/lock_001/sync".to_string(),
        ]
    );

    let published = node.broker.take_published();
    let topics: Vec<&str> = published.iter().map(|d| d.topic.as_str()).collect();
    assert_eq!(
        topics,
        vec!["pinelock/lock_001/status", "pinelock/lock_001/sync_request"]
    );
    let request: Value = serde_json::from_str(&published[1].payload).unwrap();
    assert_eq!(request["request"], "sync");
}

#[tokio::test]
async fn test_pin_scenario_unlocks_once() {
    let mut node = node(DeviceConfig::default());
    node.run(1).await;
    node.send("config", json!({"access_codes": ["4821"], "rfid_cards": [], "key_tag": null}));
    node.run(1).await;
    node.broker.take_published();

    node.keys.type_keys("482*4821#").unwrap();
    node.run(9).await;

    let access = node.take("access");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0]["access_type"], "pin");
    assert_eq!(access[0]["access_method"], "4821");
    assert_eq!(access[0]["success"], true);
    assert!(!node.runtime.device().is_locked());
    assert!(node.lock.is_active());
    assert_eq!(node.runtime.device().pending_digits(), 0);
}

#[tokio::test]
async fn test_status_precedes_access_in_same_iteration() {
    let mut config = DeviceConfig::default();
    config.access.default_pins = vec!["1234".into()];
    let mut node = node(config);
    node.run(1).await;
    node.broker.take_published();

    node.keys.type_keys("1234").unwrap();
    node.run(4).await;
    node.keys.type_keys("#").unwrap();
    node.run(1).await;

    let topics: Vec<String> = node
        .broker
        .take_published()
        .into_iter()
        .map(|d| d.topic)
        .collect();
    assert_eq!(
        topics,
        vec![
            "pinelock/lock_001/status".to_string(),
            "pinelock/lock_001/access".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_unknown_card_is_denied() {
    let mut node = node(DeviceConfig::default());
    node.run(1).await;
    node.broker.take_published();

    node.rfid.present_card(CardUid::new("0A0B0C0D", 19).unwrap());
    node.run(60).await;

    let access = node.take("access");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0]["access_type"], "rfid");
    assert_eq!(access[0]["access_method"], "0A0B0C0D");
    assert_eq!(access[0]["success"], false);
    assert!(node.runtime.device().is_locked());
    assert!(!node.buzzer.is_active());
}

#[tokio::test]
async fn test_remote_add_card_then_tap() {
    let mut node = node(DeviceConfig::default());
    node.run(1).await;
    node.send("command", json!({"action": "add_card", "code": "04ab12cd"}));
    node.run(1).await;
    node.broker.take_published();

    node.rfid.present_card(CardUid::new("04AB12CD", 19).unwrap());
    node.run(60).await;

    let access = node.take("access");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0]["success"], true);
    assert!(!node.runtime.device().is_locked());
    assert_eq!(
        node.storage.snapshot().get("rfid.0.id").map(String::as_str),
        Some("04AB12CD")
    );
}

#[tokio::test]
async fn test_malformed_messages_change_nothing() {
    let mut config = DeviceConfig::default();
    config.access.default_pins = vec!["4821".into()];
    let mut node = node(config);
    node.run(1).await;
    node.broker.take_published();

    node.send("command", json!({"action": "add_pin"}));
    node.send("command", json!({"action": "add_pin", "code": "12ab"}));
    node.send("command", json!({"action": "explode"}));
    node.broker.inject("pinelock/lock_001/config", "not json");
    node.broker.inject("pinelock/lock_002/command", r#"{"action":"unlock"}"#);
    node.run(2).await;

    let store = node.runtime.device().store();
    assert_eq!(store.identifiers(pinelock_core::CredentialKind::Pin), vec!["4821".to_string()]);
    assert!(node.runtime.device().is_locked());
    assert!(node.broker.take_published().is_empty());
}

#[tokio::test]
async fn test_remote_unlock_then_auto_relock() {
    let mut node = node(DeviceConfig::default());
    node.run(1).await;
    node.broker.take_published();

    node.send("command", json!({"action": "unlock"}));
    node.run(1).await;
    let status = node.take("status");
    assert_eq!(status.len(), 1);
    assert_eq!(status[0]["is_locked"], false);

    node.run(500).await;
    assert!(node.runtime.device().is_locked());
    assert!(!node.lock.is_active());
    let status = node.take("status");
    assert_eq!(status.len(), 1);
    assert_eq!(status[0]["is_locked"], true);
}

#[tokio::test]
async fn test_vibration_alarm_publishes_alert() {
    let mut config = DeviceConfig::default();
    config.alarm.vibration_threshold = 3;
    let mut node = node(config);
    node.run(1).await;
    node.broker.take_published();

    for _ in 0..3 {
        node.vibration.set(true);
        node.run(6).await;
        node.vibration.set(false);
        node.run(6).await;
    }

    let alerts = node.take("alert");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["type"], "vibration");
    assert!(node.buzzer.is_active());
}

#[tokio::test]
async fn test_door_change_and_open_too_long() {
    let mut config = DeviceConfig::default();
    config.alarm.door_open_alert_ms = 1_000;
    let mut node = node(config);
    node.run(1).await;
    node.broker.take_published();

    node.door.set(true);
    node.run(20).await;
    let published = node.broker.take_published();
    let status: Vec<&Delivery> = published
        .iter()
        .filter(|d| d.topic.ends_with("/status"))
        .collect();
    assert_eq!(status.len(), 1);
    assert!(status[0].payload.contains(r#""is_door_open":true"#));

    node.run(200).await;
    let alerts = node.take("alert");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["type"], "door_open_too_long");
}

#[tokio::test]
async fn test_offline_broker_keeps_loop_alive() {
    let mut config = DeviceConfig::default();
    config.access.default_pins = vec!["4821".into()];
    let mut node = node(config);
    node.broker.set_online(false);

    node.keys.type_keys("4821#").unwrap();
    node.run(100).await;

    assert_eq!(node.watchdog.feeds(), 100);
    assert_eq!(node.broker.connect_attempts(), 1);
    assert!(!node.runtime.device().is_locked());
    assert!(node.broker.published().is_empty());

    node.run(410).await;
    assert_eq!(node.broker.connect_attempts(), 2);

    node.broker.set_online(true);
    node.run(500).await;
    assert!(node.runtime.is_online());
    assert_eq!(node.broker.connect_attempts(), 3);
    assert_eq!(node.broker.subscriptions().len(), 3);
}

#[tokio::test]
async fn test_reconnects_after_connection_loss() {
    let mut node = node(DeviceConfig::default());
    node.run(1).await;
    node.broker.set_online(false);
    node.run(1).await;
    assert!(!node.runtime.is_online());

    node.broker.set_online(true);
    node.run(100).await;
    assert!(!node.runtime.is_online());

    node.run(400).await;
    assert!(node.runtime.is_online());
    assert_eq!(node.broker.connect_attempts(), 3);
    assert_eq!(node.broker.subscriptions().len(), 3);
}

#[tokio::test]
async fn test_sync_request_answered() {
    let mut node = node(DeviceConfig::default());
    node.run(1).await;
    node.broker.take_published();

    node.send("sync", json!({}));
    node.run(1).await;

    let topics: Vec<String> = node
        .broker
        .take_published()
        .into_iter()
        .map(|d| d.topic)
        .collect();
    assert_eq!(
        topics,
        vec![
            "pinelock/lock_001/status".to_string(),
            "pinelock/lock_001/sync_request".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_until_stops_on_shutdown() {
    let mut node = node(DeviceConfig::default());
    node.runtime
        .run_until(tokio::time::sleep(Duration::from_millis(500)))
        .await;

    assert!(node.watchdog.feeds() >= 10);
    assert!(!node.runtime.is_online());
    assert!(node.broker.subscriptions().is_empty());
}
