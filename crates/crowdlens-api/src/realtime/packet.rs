// Engine.IO v4 / Socket.IO v5 packet codec
//
// Engine.IO frames every transport message with a one-digit type prefix.
// Socket.IO packets travel inside Engine.IO `message` packets:
//
//   0{"sid":..,"pingInterval":..}   engine open
//   2 / 3                           engine ping / pong
//   40{"token":".."}                socket connect (client, with auth)
//   42["alert",{..}]                socket event
//   44{"message":".."}              socket connect error
//
// Polling payloads batch several engine packets separated by `\x1e`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Record separator between packets in a polling payload.
pub(crate) const RECORD_SEPARATOR: char = '\x1e';

// ── Engine.IO ────────────────────────────────────────────────────────

/// Handshake data from the engine `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub(crate) fn decode(frame: &str) -> Result<Self, Error> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::RealtimeProtocol("empty engine packet".into()))?;
        let data = chars.as_str();

        match kind {
            '0' => serde_json::from_str(data)
                .map(Self::Open)
                .map_err(|e| Error::RealtimeProtocol(format!("bad open packet: {e}"))),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(data.to_owned())),
            '3' => Ok(Self::Pong(data.to_owned())),
            '4' => Ok(Self::Message(data.to_owned())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(Error::RealtimeProtocol(format!(
                "unknown engine packet type {other:?}"
            ))),
        }
    }

    /// Text encoding. `Open` is server-only and never encoded by the client.
    pub(crate) fn encode(&self) -> String {
        match self {
            Self::Open(_) => "0".to_owned(),
            Self::Close => "1".to_owned(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_owned(),
            Self::Noop => "6".to_owned(),
        }
    }
}

/// Split a polling payload into individual engine packets.
pub(crate) fn decode_payload(payload: &str) -> Result<Vec<EnginePacket>, Error> {
    payload
        .split(RECORD_SEPARATOR)
        .filter(|frame| !frame.is_empty())
        .map(EnginePacket::decode)
        .collect()
}

// ── Socket.IO ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SocketPacket {
    /// Client→server carries the auth object; server→client carries `{sid}`.
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    Ack,
    ConnectError(Value),
    /// Any packet addressed to a namespace other than `/`.
    OtherNamespace(String),
}

impl SocketPacket {
    /// Connect packet for the default namespace carrying `{"token": ..}`.
    pub(crate) fn connect_with_token(token: &str) -> Self {
        Self::Connect(Some(serde_json::json!({ "token": token })))
    }

    pub(crate) fn decode(data: &str) -> Result<Self, Error> {
        let mut chars = data.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::RealtimeProtocol("empty socket packet".into()))?;
        let (namespace, body) = split_namespace(chars.as_str());
        if namespace != "/" {
            return Ok(Self::OtherNamespace(namespace.to_owned()));
        }
        let body = strip_ack_id(body);

        match kind {
            '0' => Ok(Self::Connect(parse_optional(body)?)),
            '1' => Ok(Self::Disconnect),
            '2' => {
                let mut args: Vec<Value> = serde_json::from_str(body)
                    .map_err(|e| Error::RealtimeProtocol(format!("bad event packet: {e}")))?;
                if args.is_empty() {
                    return Err(Error::RealtimeProtocol("event packet without a name".into()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(Error::RealtimeProtocol(format!(
                            "event name is not a string: {other}"
                        )));
                    }
                };
                Ok(Self::Event { name, args })
            }
            '3' | '6' => Ok(Self::Ack),
            '4' => Ok(Self::ConnectError(parse_optional(body)?.unwrap_or(Value::Null))),
            // Binary events are not used by this backend.
            '5' => Err(Error::RealtimeProtocol("binary events are not supported".into())),
            other => Err(Error::RealtimeProtocol(format!(
                "unknown socket packet type {other:?}"
            ))),
        }
    }

    pub(crate) fn encode(&self) -> String {
        match self {
            Self::Connect(Some(auth)) => format!("0{auth}"),
            Self::Connect(None) => "0".to_owned(),
            Self::Disconnect => "1".to_owned(),
            Self::Event { name, args } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                format!("2{}", Value::Array(items))
            }
            Self::Ack => "3[]".to_owned(),
            Self::ConnectError(data) => format!("4{data}"),
            Self::OtherNamespace(namespace) => format!("1{namespace},"),
        }
    }

    /// Wrap into an engine `message` frame.
    pub(crate) fn into_engine(self) -> EnginePacket {
        EnginePacket::Message(self.encode())
    }

    /// Human-readable reason carried by a connect error.
    pub(crate) fn error_message(data: &Value) -> String {
        data.get("message")
            .and_then(Value::as_str)
            .map_or_else(|| data.to_string(), str::to_owned)
    }
}

/// Split an optional `/namespace,` prefix off a packet body.
fn split_namespace(body: &str) -> (&str, &str) {
    if !body.starts_with('/') {
        return ("/", body);
    }
    match body.split_once(',') {
        Some((namespace, rest)) => (namespace, rest),
        None => (body, ""),
    }
}

fn strip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn parse_optional(body: &str) -> Result<Option<Value>, Error> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| Error::RealtimeProtocol(format!("bad packet data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"abc","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let EnginePacket::Open(hs) = packet else {
            panic!("expected open, got {packet:?}");
        };
        assert_eq!(hs.sid, "abc");
        assert_eq!(hs.ping_interval, 25_000);
        assert_eq!(hs.upgrades, vec!["websocket".to_owned()]);
    }

    #[test]
    fn ping_pong_keep_probe_data() {
        assert_eq!(EnginePacket::decode("2probe").unwrap(), EnginePacket::Ping("probe".into()));
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
    }

    #[test]
    fn connect_packet_carries_token() {
        let frame = SocketPacket::connect_with_token("t0k").into_engine().encode();
        assert_eq!(frame, r#"40{"token":"t0k"}"#);
    }

    #[test]
    fn decodes_event_with_payload() {
        let EnginePacket::Message(data) =
            EnginePacket::decode(r#"42["alert",{"severity":"High","zone":"Gate A"}]"#).unwrap()
        else {
            panic!("expected message");
        };
        let packet = SocketPacket::decode(&data).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "alert".into(),
                args: vec![json!({"severity": "High", "zone": "Gate A"})],
            }
        );
    }

    #[test]
    fn event_with_ack_id() {
        let packet = SocketPacket::decode(r#"217["liveOccupancy",{"occupancy":12}]"#).unwrap();
        assert!(matches!(packet, SocketPacket::Event { ref name, .. } if name == "liveOccupancy"));

        let packet = SocketPacket::decode(r#"2/,17["alert",{}]"#).unwrap();
        assert!(matches!(packet, SocketPacket::Event { ref name, .. } if name == "alert"));
    }

    #[test]
    fn other_namespaces_are_not_events() {
        let packet = SocketPacket::decode(r#"2/admin,17["liveOccupancy",{"occupancy":12}]"#).unwrap();
        assert_eq!(packet, SocketPacket::OtherNamespace("/admin".into()));
        assert_eq!(
            SocketPacket::decode("0/admin").unwrap(),
            SocketPacket::OtherNamespace("/admin".into())
        );
    }

    #[test]
    fn connect_error_message() {
        let packet = SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap();
        let SocketPacket::ConnectError(data) = packet else {
            panic!("expected connect error");
        };
        assert_eq!(SocketPacket::error_message(&data), "Not authorized");
    }

    #[test]
    fn polling_payload_splits_on_record_separator() {
        let packets = decode_payload("2\u{1e}42[\"alert\",{}]\u{1e}6").unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], EnginePacket::Ping(String::new()));
        assert_eq!(packets[2], EnginePacket::Noop);
    }

    #[test]
    fn rejects_garbage() {
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
        assert!(SocketPacket::decode("2[]").is_err());
        assert!(SocketPacket::decode("2[42]").is_err());
    }
}
