//! Property-based tests for broker framing and inbound parsing.

use bytes::BytesMut;
use pinelock_core::CredentialKind;
use pinelock_protocol::{
    BrokerCodec, BrokerFrame, Command, InboundMessage, InboundTopic, ProtocolError,
};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

/// Topic-like words: no whitespace, never empty.
fn topic() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_]{1,12}(/[a-z0-9_]{1,12}){0,3}")
        .expect("topic regex")
}

/// Printable single-line bodies, including spaces.
fn body() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,120}").expect("body regex")
}

fn word() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9_.-]{1,16}").expect("word regex")
}

fn frame() -> impl Strategy<Value = BrokerFrame> {
    prop_oneof![
        (word(), prop::option::of((word(), word()))).prop_map(|(client_id, credentials)| {
            BrokerFrame::Connect {
                client_id,
                credentials,
            }
        }),
        topic().prop_map(BrokerFrame::subscribe),
        (topic(), body()).prop_map(|(t, p)| BrokerFrame::publish(t, p)),
        (topic(), body()).prop_map(|(t, p)| BrokerFrame::message(t, p)),
        Just(BrokerFrame::ConnAck),
        body().prop_map(|reason| BrokerFrame::Error { reason }),
    ]
}

fn all_topics() -> impl Strategy<Value = InboundTopic> {
    prop::sample::select(InboundTopic::ALL.to_vec())
}

proptest! {
    /// However TCP happens to split the stream, the same frames come out.
    #[test]
    fn prop_frames_survive_any_chunking(
        frames in prop::collection::vec(frame(), 1..8),
        chunk_sizes in prop::collection::vec(1usize..32, 1..16),
    ) {
        let mut codec = BrokerCodec::new();
        let mut wire = BytesMut::new();
        for frame in &frames {
            codec.encode(frame.clone(), &mut wire).unwrap();
        }
        let wire = wire.freeze();

        let mut decoded = Vec::new();
        let mut buf = BytesMut::new();
        let mut offset = 0;
        for size in chunk_sizes.iter().cycle() {
            if offset >= wire.len() {
                break;
            }
            let end = (offset + size).min(wire.len());
            buf.extend_from_slice(&wire[offset..end]);
            offset = end;
            while let Some(frame) = codec.decode(&mut buf).unwrap() {
                decoded.push(frame);
            }
        }

        prop_assert_eq!(decoded, frames);
        prop_assert!(buf.is_empty());
    }

    /// An unterminated line longer than the limit is rejected and dropped.
    #[test]
    fn prop_oversized_partial_line_rejected(len in 65usize..512) {
        let mut codec = BrokerCodec::with_max_frame_length(64);
        let mut buf = BytesMut::from(vec![b'x'; len].as_slice());

        let result = codec.decode(&mut buf);
        let is_too_large = matches!(result, Err(ProtocolError::FrameTooLarge { .. }));
        prop_assert!(is_too_large);
        prop_assert!(buf.is_empty());
    }

    /// Arbitrary payloads are either parsed or rejected, never a panic.
    #[test]
    fn prop_inbound_parse_total(
        topic in all_topics(),
        payload in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let _ = InboundMessage::parse(topic, &payload);
    }

    /// A well-formed add_pin always carries its code through untouched.
    #[test]
    fn prop_add_pin_keeps_code(code in "[0-9]{1,10}", active in any::<bool>()) {
        let json = format!(r#"{{"action":"add_pin","code":"{code}","active":{active}}}"#);
        let parsed = InboundMessage::parse(InboundTopic::Command, json.as_bytes()).unwrap();

        prop_assert_eq!(
            parsed,
            InboundMessage::Command(Command::AddCredential {
                kind: CredentialKind::Pin,
                code,
                active,
                window: None,
            })
        );
    }
}
