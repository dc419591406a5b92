//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Engine packets are a single type digit followed by data. Socket packets
//! travel inside Engine `message` packets: a type digit, an optional
//! namespace (`/ns,`), an optional ack id, then a JSON body.

use feastline_core::FeastlineError;
use feastline_core::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Engine.IO protocol revision spoken by this client.
pub const ENGINE_IO_VERSION: u8 = 4;

/// Separator between packets in a long-polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Server handshake carried by the Engine `open` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl HandshakeInfo {
    /// Longest silence tolerated before the transport counts as dropped.
    pub fn liveness_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(HandshakeInfo),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(info) => {
                format!("0{}", serde_json::to_string(info).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data.as_deref().unwrap_or("")),
            EnginePacket::Pong(data) => format!("3{}", data.as_deref().unwrap_or("")),
            EnginePacket::Message(body) => format!("4{}", body),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }

    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| FeastlineError::protocol("empty engine packet"))?;
        let data = chars.as_str();
        let optional = |d: &str| (!d.is_empty()).then(|| d.to_string());
        match kind {
            '0' => serde_json::from_str(data)
                .map(EnginePacket::Open)
                .map_err(|e| FeastlineError::protocol(format!("bad open packet: {}", e))),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(optional(data))),
            '3' => Ok(EnginePacket::Pong(optional(data))),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            'b' => Err(FeastlineError::protocol("binary engine packets are not supported")),
            other => Err(FeastlineError::protocol(format!(
                "unknown engine packet type '{}'",
                other
            ))),
        }
    }
}

/// Splits a long-polling response body into packets.
pub fn decode_payload(body: &str) -> Result<Vec<EnginePacket>> {
    body.split(RECORD_SEPARATOR)
        .filter(|frame| !frame.is_empty())
        .map(EnginePacket::decode)
        .collect()
}

/// Joins packets into a long-polling request body.
pub fn encode_payload(packets: &[EnginePacket]) -> String {
    packets
        .iter()
        .map(EnginePacket::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        args: Vec<Value>,
        ack_id: Option<u64>,
    },
    Ack {
        id: u64,
        args: Vec<Value>,
    },
    ConnectError(Value),
}

impl SocketPacket {
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        SocketPacket::Event {
            name: name.into(),
            args,
            ack_id: None,
        }
    }

    /// Wraps this packet in an Engine `message`.
    pub fn into_engine(self) -> EnginePacket {
        EnginePacket::Message(self.encode())
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{}", auth),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, args, ack_id } => {
                let mut body = Vec::with_capacity(args.len() + 1);
                body.push(Value::String(name.clone()));
                body.extend(args.iter().cloned());
                let id = ack_id.map(|id| id.to_string()).unwrap_or_default();
                format!("2{}{}", id, Value::Array(body))
            }
            SocketPacket::Ack { id, args } => format!("3{}{}", id, Value::Array(args.clone())),
            SocketPacket::ConnectError(data) => format!("4{}", data),
        }
    }

    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| FeastlineError::protocol("empty socket packet"))?;
        let mut rest = chars.as_str();

        // optional namespace; only the root namespace is used here
        if rest.starts_with('/') {
            rest = match rest.find(',') {
                Some(idx) => &rest[idx + 1..],
                None => "",
            };
        }

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            rest[..digits].parse::<u64>().ok()
        } else {
            None
        };
        let body = &rest[digits..];
        let json = |body: &str| -> Result<Value> {
            serde_json::from_str(body)
                .map_err(|e| FeastlineError::protocol(format!("bad socket packet body: {}", e)))
        };

        match kind {
            '0' => Ok(SocketPacket::Connect(if body.is_empty() {
                None
            } else {
                Some(json(body)?)
            })),
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let Value::Array(mut items) = json(body)? else {
                    return Err(FeastlineError::protocol("event body is not an array"));
                };
                if items.is_empty() {
                    return Err(FeastlineError::protocol("event without a name"));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(FeastlineError::protocol("event name is not a string"));
                };
                Ok(SocketPacket::Event {
                    name,
                    args: items,
                    ack_id,
                })
            }
            '3' => {
                let id = ack_id.ok_or_else(|| FeastlineError::protocol("ack without id"))?;
                let Value::Array(args) = json(body)? else {
                    return Err(FeastlineError::protocol("ack body is not an array"));
                };
                Ok(SocketPacket::Ack { id, args })
            }
            '4' => Ok(SocketPacket::ConnectError(if body.is_empty() {
                Value::Null
            } else {
                json(body)?
            })),
            '5' | '6' => Err(FeastlineError::protocol("binary socket packets are not supported")),
            other => Err(FeastlineError::protocol(format!(
                "unknown socket packet type '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"abc","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let EnginePacket::Open(info) = packet else {
            panic!("expected open packet");
        };
        assert_eq!(info.sid, "abc");
        assert_eq!(info.liveness_window().as_millis(), 45_000);
    }

    #[test]
    fn test_engine_control_packets() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(None));
        assert_eq!(
            EnginePacket::decode("2hello").unwrap(),
            EnginePacket::Ping(Some("hello".into()))
        );
        assert_eq!(EnginePacket::Pong(None).encode(), "3");
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
        assert!(EnginePacket::decode("bAAAA").is_err());
    }

    #[test]
    fn test_decode_event_with_payload() {
        let EnginePacket::Message(body) =
            EnginePacket::decode(r#"42["new_order",{"order":{"orderId":"o1"}}]"#).unwrap()
        else {
            panic!("expected message");
        };
        let packet = SocketPacket::decode(&body).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "new_order".into(),
                args: vec![json!({"order": {"orderId": "o1"}})],
                ack_id: None,
            }
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        let packet = SocketPacket::decode(r#"2/admin,12["product-deleted","p1"]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "product-deleted".into(),
                args: vec![json!("p1")],
                ack_id: Some(12),
            }
        );
    }

    #[test]
    fn test_encode_join_events() {
        let join = SocketPacket::event("join_user_room", vec![json!("u1")]);
        assert_eq!(join.into_engine().encode(), r#"42["join_user_room","u1"]"#);
        let admin = SocketPacket::event("join_admin_room", vec![]);
        assert_eq!(admin.encode(), r#"2["join_admin_room"]"#);
    }

    #[test]
    fn test_connect_packets() {
        assert_eq!(SocketPacket::Connect(Some(json!({"userId": "u1"}))).encode(), r#"0{"userId":"u1"}"#);
        assert_eq!(
            SocketPacket::decode(r#"0{"sid":"s1"}"#).unwrap(),
            SocketPacket::Connect(Some(json!({"sid": "s1"})))
        );
        assert_eq!(
            SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError(json!({"message": "Not authorized"}))
        );
    }

    #[test]
    fn test_malformed_socket_packets() {
        assert!(SocketPacket::decode("2{}").is_err());
        assert!(SocketPacket::decode("2[]").is_err());
        assert!(SocketPacket::decode("2[42]").is_err());
        assert!(SocketPacket::decode("2[\"x\"").is_err());
        assert!(SocketPacket::decode("3[]").is_err());
    }

    #[test]
    fn test_polling_payload() {
        let body = format!("2{}42[\"a\",1]{}6", RECORD_SEPARATOR, RECORD_SEPARATOR);
        let packets = decode_payload(&body).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], EnginePacket::Ping(None));
        assert_eq!(encode_payload(&packets), body);
    }
}
