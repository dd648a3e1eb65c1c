//! Tokio codec for the line-oriented broker protocol.
//!
//! One frame per `\n`-terminated line. The verb is the first word:
//!
//! ```text
//! client -> broker   CONNECT <client-id> [<user> <password>]
//!                    SUB <topic>
//!                    PUB <topic> <json>
//! broker -> client   CONNACK
//!                    MSG <topic> <json>
//!                    ERR <reason>
//! ```
//!
//! Topics and credentials never contain whitespace. The JSON body is written
//! compact, so it never contains a raw newline. A trailing `\r` is tolerated
//! on decode. Blank lines are skipped.
//!
//! The same codec decodes both directions; the transport and the test broker
//! each simply ignore frames that make no sense for their side.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::{Decoder, Encoder};
//! use pinelock_protocol::{BrokerCodec, BrokerFrame};
//!
//! let mut codec = BrokerCodec::new();
//! let mut buf = BytesMut::new();
//! codec
//!     .encode(BrokerFrame::subscribe("pinelock/lock_001/command"), &mut buf)
//!     .unwrap();
//! assert_eq!(&buf[..], b"SUB pinelock/lock_001/command\n");
//!
//! let frame = codec.decode(&mut buf).unwrap();
//! assert_eq!(frame, Some(BrokerFrame::subscribe("pinelock/lock_001/command")));
//! ```

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, BytesMut};
use pinelock_core::constants::MAX_FRAME_LENGTH;
use tokio_util::codec::{Decoder, Encoder};

/// One broker protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerFrame {
    Connect {
        client_id: String,
        credentials: Option<(String, String)>,
    },
    Subscribe {
        topic: String,
    },
    Publish {
        topic: String,
        payload: String,
    },
    ConnAck,
    Message {
        topic: String,
        payload: String,
    },
    Error {
        reason: String,
    },
}

impl BrokerFrame {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        BrokerFrame::Subscribe { topic: topic.into() }
    }

    pub fn publish(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        BrokerFrame::Publish {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn message(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        BrokerFrame::Message {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    fn parse(line: &str) -> Result<Self> {
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));

        match verb {
            "CONNECT" => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                match args.as_slice() {
                    [client_id] => Ok(BrokerFrame::Connect {
                        client_id: (*client_id).to_string(),
                        credentials: None,
                    }),
                    [client_id, user, password] => Ok(BrokerFrame::Connect {
                        client_id: (*client_id).to_string(),
                        credentials: Some(((*user).to_string(), (*password).to_string())),
                    }),
                    _ => Err(ProtocolError::InvalidFrame(format!(
                        "CONNECT takes 1 or 3 arguments, got {}",
                        args.len()
                    ))),
                }
            }
            "SUB" => {
                let topic = rest.trim();
                if topic.is_empty() || topic.contains(char::is_whitespace) {
                    return Err(ProtocolError::InvalidFrame(format!("bad SUB topic {topic:?}")));
                }
                Ok(BrokerFrame::subscribe(topic))
            }
            "PUB" | "MSG" => {
                let (topic, payload) = rest
                    .split_once(' ')
                    .filter(|(topic, _)| !topic.is_empty())
                    .ok_or_else(|| ProtocolError::InvalidFrame(format!("{verb} needs a topic and a payload")))?;
                if verb == "PUB" {
                    Ok(BrokerFrame::publish(topic, payload))
                } else {
                    Ok(BrokerFrame::message(topic, payload))
                }
            }
            "CONNACK" if rest.is_empty() => Ok(BrokerFrame::ConnAck),
            "ERR" => Ok(BrokerFrame::Error {
                reason: rest.to_string(),
            }),
            _ => Err(ProtocolError::InvalidFrame(format!("unknown verb {verb:?}"))),
        }
    }

    fn render(&self) -> Result<String> {
        fn word(field: &'static str, value: &str) -> Result<()> {
            if value.is_empty() || value.contains(char::is_whitespace) {
                return Err(ProtocolError::InvalidFrame(format!(
                    "{field} must be a single non-empty word"
                )));
            }
            Ok(())
        }

        fn body(value: &str) -> Result<()> {
            if value.contains(['\n', '\r']) {
                return Err(ProtocolError::InvalidFrame("payload contains a line break".to_string()));
            }
            Ok(())
        }

        let line = match self {
            BrokerFrame::Connect {
                client_id,
                credentials,
            } => {
                word("client id", client_id)?;
                match credentials {
                    Some((user, password)) => {
                        word("username", user)?;
                        word("password", password)?;
                        format!("CONNECT {client_id} {user} {password}")
                    }
                    None => format!("CONNECT {client_id}"),
                }
            }
            BrokerFrame::Subscribe { topic } => {
                word("topic", topic)?;
                format!("SUB {topic}")
            }
            BrokerFrame::Publish { topic, payload } => {
                word("topic", topic)?;
                body(payload)?;
                format!("PUB {topic} {payload}")
            }
            BrokerFrame::ConnAck => "CONNACK".to_string(),
            BrokerFrame::Message { topic, payload } => {
                word("topic", topic)?;
                body(payload)?;
                format!("MSG {topic} {payload}")
            }
            BrokerFrame::Error { reason } => {
                body(reason)?;
                format!("ERR {reason}")
            }
        };
        Ok(line)
    }
}

/// Newline-delimited codec for [`BrokerFrame`].
#[derive(Debug, Clone)]
pub struct BrokerCodec {
    max_frame_length: usize,
    /// Bytes of the current partial line already scanned for `\n`.
    scanned: usize,
}

impl BrokerCodec {
    pub fn new() -> Self {
        Self::with_max_frame_length(MAX_FRAME_LENGTH)
    }

    /// Limit excludes the terminating newline.
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            scanned: 0,
        }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Default for BrokerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BrokerCodec {
    type Item = BrokerFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BrokerFrame>> {
        loop {
            let start = self.scanned.min(src.len());
            let newline = src[start..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| start + offset);

            let Some(end) = newline else {
                if src.len() > self.max_frame_length {
                    let size = src.len();
                    src.clear();
                    self.scanned = 0;
                    return Err(ProtocolError::FrameTooLarge {
                        size,
                        max_size: self.max_frame_length,
                    });
                }
                self.scanned = src.len();
                return Ok(None);
            };

            self.scanned = 0;
            let line = src.split_to(end + 1);
            let mut content = &line[..end];
            if let [head @ .., b'\r'] = content {
                content = head;
            }

            if content.len() > self.max_frame_length {
                return Err(ProtocolError::FrameTooLarge {
                    size: content.len(),
                    max_size: self.max_frame_length,
                });
            }

            if content.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let text = std::str::from_utf8(content)
                .map_err(|_| ProtocolError::InvalidFrame("frame is not UTF-8".to_string()))?;
            return BrokerFrame::parse(text).map(Some);
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<BrokerFrame>> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.iter().all(u8::is_ascii_whitespace) => {
                buf.advance(buf.len());
                Ok(None)
            }
            None => {
                buf.clear();
                self.scanned = 0;
                Err(ProtocolError::InvalidFrame("stream closed mid-frame".to_string()))
            }
        }
    }
}

impl Encoder<BrokerFrame> for BrokerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: BrokerFrame, dst: &mut BytesMut) -> Result<()> {
        let line = item.render()?;
        if line.len() > self.max_frame_length {
            return Err(ProtocolError::FrameTooLarge {
                size: line.len(),
                max_size: self.max_frame_length,
            });
        }

        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode_all(input: &[u8]) -> Vec<BrokerFrame> {
        let mut codec = BrokerCodec::new();
        let mut buf = BytesMut::from(input);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[rstest]
    #[case(b"CONNACK\n", BrokerFrame::ConnAck)]
    #[case(b"CONNACK\r\n", BrokerFrame::ConnAck)]
    #[case(b"SUB a/b/command\n", BrokerFrame::subscribe("a/b/command"))]
    #[case(
        b"MSG a/b/command {\"action\": \"lock\"}\n",
        BrokerFrame::message("a/b/command", "{\"action\": \"lock\"}")
    )]
    #[case(b"PUB a/b/status {}\n", BrokerFrame::publish("a/b/status", "{}"))]
    #[case(b"ERR not authorised\n", BrokerFrame::Error { reason: "not authorised".into() })]
    #[case(
        b"CONNECT PineLock-lock_001\n",
        BrokerFrame::Connect { client_id: "PineLock-lock_001".into(), credentials: None }
    )]
    #[case(
        b"CONNECT PineLock-lock_001 admin s3cret\n",
        BrokerFrame::Connect {
            client_id: "PineLock-lock_001".into(),
            credentials: Some(("admin".into(), "s3cret".into())),
        }
    )]
    fn test_decode_frame(#[case] input: &[u8], #[case] expected: BrokerFrame) {
        assert_eq!(decode_all(input), vec![expected]);
    }

    #[test]
    fn test_decode_partial_then_complete() {
        let mut codec = BrokerCodec::new();
        let mut buf = BytesMut::from(&b"MSG a/b/sync {"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"}\nCONN");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(BrokerFrame::message("a/b/sync", "{}"))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"ACK\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(BrokerFrame::ConnAck));
    }

    #[test]
    fn test_decode_skips_blank_lines() {
        assert_eq!(decode_all(b"\n\r\n  \nCONNACK\n"), vec![BrokerFrame::ConnAck]);
    }

    #[rstest]
    #[case(b"HELLO\n")]
    #[case(b"SUB\n")]
    #[case(b"MSG onlytopic\n")]
    #[case(b"CONNECT a b\n")]
    #[case(b"CONNACK extra\n")]
    #[case(b"\xff\xfe\n")]
    fn test_decode_invalid(#[case] input: &[u8]) {
        let mut codec = BrokerCodec::new();
        let mut buf = BytesMut::from(input);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_decode_too_long_without_newline() {
        let mut codec = BrokerCodec::with_max_frame_length(16);
        let mut buf = BytesMut::from(&[b'A'; 17][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FrameTooLarge { size: 17, max_size: 16 })
        ));
    }

    #[test]
    fn test_decode_too_long_line() {
        let mut codec = BrokerCodec::with_max_frame_length(8);
        let mut buf = BytesMut::from(&b"MSG t {\"a\":1}\nCONNACK\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(BrokerFrame::ConnAck));
    }

    #[test]
    fn test_decode_eof_mid_frame() {
        let mut codec = BrokerCodec::new();
        let mut buf = BytesMut::from(&b"MSG a/b"[..]);
        assert!(codec.decode_eof(&mut buf).is_err());

        let mut empty = BytesMut::new();
        assert_eq!(codec.decode_eof(&mut empty).unwrap(), None);
    }

    #[test]
    fn test_encode_publish() {
        let mut codec = BrokerCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(BrokerFrame::publish("p/d/access", r#"{"success":true}"#), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"PUB p/d/access {\"success\":true}\n");
    }

    #[rstest]
    #[case(BrokerFrame::subscribe("has space"))]
    #[case(BrokerFrame::subscribe(""))]
    #[case(BrokerFrame::publish("t", "line\nbreak"))]
    #[case(BrokerFrame::Connect { client_id: "id".into(), credentials: Some(("user name".into(), "pw".into())) })]
    fn test_encode_rejects_unframeable(#[case] frame: BrokerFrame) {
        let mut codec = BrokerCodec::new();
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(frame, &mut buf),
            Err(ProtocolError::InvalidFrame(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_too_large() {
        let mut codec = BrokerCodec::with_max_frame_length(10);
        let mut buf = BytesMut::new();
        let result = codec.encode(BrokerFrame::publish("topic", "0123456789"), &mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }
}
