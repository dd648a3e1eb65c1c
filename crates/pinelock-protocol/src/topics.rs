//! Per-device topic namespace: `<prefix>/<device-id>/<suffix>`.

use std::fmt;

/// Topics the device subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundTopic {
    Command,
    Config,
    Sync,
}

impl InboundTopic {
    pub const ALL: [InboundTopic; 3] = [InboundTopic::Command, InboundTopic::Config, InboundTopic::Sync];

    pub fn suffix(self) -> &'static str {
        match self {
            InboundTopic::Command => "command",
            InboundTopic::Config => "config",
            InboundTopic::Sync => "sync",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        InboundTopic::ALL.into_iter().find(|t| t.suffix() == suffix)
    }
}

impl fmt::Display for InboundTopic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Topic builder and router for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    namespace: String,
}

impl Topics {
    pub fn new(prefix: &str, device_id: &str) -> Self {
        Self {
            namespace: format!("{}/{}/", prefix.trim_end_matches('/'), device_id),
        }
    }

    /// Full topic for `suffix` in this device's namespace.
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}{}", self.namespace, suffix)
    }

    pub fn inbound(&self, topic: InboundTopic) -> String {
        self.topic(topic.suffix())
    }

    /// Topics to subscribe to after every (re)connect.
    pub fn subscriptions(&self) -> Vec<String> {
        InboundTopic::ALL.iter().map(|t| self.inbound(*t)).collect()
    }

    /// Map a received topic to its inbound kind.
    ///
    /// Returns `None` for topics of other devices and unknown suffixes.
    pub fn route(&self, topic: &str) -> Option<InboundTopic> {
        topic
            .strip_prefix(&self.namespace)
            .and_then(InboundTopic::from_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_topic_layout() {
        let topics = Topics::new("pinelock", "lock_001");
        assert_eq!(topics.topic("status"), "pinelock/lock_001/status");
        assert_eq!(
            topics.subscriptions(),
            vec![
                "pinelock/lock_001/command",
                "pinelock/lock_001/config",
                "pinelock/lock_001/sync",
            ]
        );
    }

    #[test]
    fn test_trailing_slash_in_prefix() {
        let topics = Topics::new("site/a/", "door");
        assert_eq!(topics.topic("heartbeat"), "site/a/door/heartbeat");
    }

    #[rstest]
    #[case("pinelock/lock_001/command", Some(InboundTopic::Command))]
    #[case("pinelock/lock_001/config", Some(InboundTopic::Config))]
    #[case("pinelock/lock_001/sync", Some(InboundTopic::Sync))]
    #[case("pinelock/lock_002/command", None)]
    #[case("pinelock/lock_001/status", None)]
    #[case("pinelock/lock_001/command/extra", None)]
    #[case("other/lock_001/command", None)]
    fn test_route(#[case] topic: &str, #[case] expected: Option<InboundTopic>) {
        let topics = Topics::new("pinelock", "lock_001");
        assert_eq!(topics.route(topic), expected);
    }
}
