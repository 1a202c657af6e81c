// Connection lifecycle
//
// One background task per `RealtimeChannel::connect`. Each attempt tries the
// configured transports in order (WebSocket first, long-polling as fallback)
// and the task reconnects with exponential backoff until cancelled, rejected
// by the server, or out of retries.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::packet::{EnginePacket, SocketPacket};
use super::registry::Registry;
use super::{ChannelState, RealtimeConfig, ReconnectConfig, TransportKind, polling, websocket};
use crate::error::Error;

/// Everything a connection task shares with its `RealtimeChannel`.
pub(crate) struct Shared {
    pub config: RealtimeConfig,
    pub registry: Arc<Registry>,
    pub state: watch::Sender<ChannelState>,
}

/// How a single connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ended {
    /// The channel was disconnected locally.
    Cancelled,
    /// Engine close or transport end; reconnect.
    Closed,
    /// The server sent a Socket.IO disconnect; do not reconnect.
    ServerDisconnect,
}

/// What a transport should do after one decoded engine packet.
#[derive(Debug)]
pub(crate) enum Step {
    Continue,
    Reply(EnginePacket),
    End(Ended),
}

// ── Per-connection protocol state ────────────────────────────────────

/// Engine.IO/Socket.IO handshake state shared by both transports.
pub(crate) struct Session<'a> {
    shared: &'a Shared,
    token: &'a SecretString,
    transport: TransportKind,
    engine_sid: Option<String>,
    connected: bool,
    ping_window: Duration,
}

impl<'a> Session<'a> {
    fn new(shared: &'a Shared, token: &'a SecretString, transport: TransportKind) -> Self {
        Self {
            shared,
            token,
            transport,
            engine_sid: None,
            connected: false,
            ping_window: shared.config.transport.timeout,
        }
    }

    pub(crate) fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }

    /// The engine handshake completed.
    pub(crate) fn opened(&self) -> bool {
        self.engine_sid.is_some()
    }

    pub(crate) fn engine_sid(&self) -> Option<&str> {
        self.engine_sid.as_deref()
    }

    /// How long to wait for the next server packet before declaring the
    /// connection dead: the handshake timeout until `open`, then
    /// `pingInterval + pingTimeout`.
    pub(crate) fn ping_window(&self) -> Duration {
        self.ping_window
    }

    pub(crate) fn endpoint(&self, sid: Option<&str>) -> Result<Url, Error> {
        endpoint(&self.shared.config, self.transport, sid)
    }

    pub(crate) fn handle(&mut self, packet: EnginePacket) -> Result<Step, Error> {
        match packet {
            EnginePacket::Open(handshake) => {
                debug!(
                    sid = %handshake.sid,
                    ping_interval = handshake.ping_interval,
                    ping_timeout = handshake.ping_timeout,
                    "engine handshake"
                );
                self.ping_window =
                    Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
                self.engine_sid = Some(handshake.sid);
                let connect = SocketPacket::connect_with_token(self.token.expose_secret());
                Ok(Step::Reply(connect.into_engine()))
            }
            EnginePacket::Ping(data) => Ok(Step::Reply(EnginePacket::Pong(data))),
            EnginePacket::Message(data) => self.handle_socket(&data),
            EnginePacket::Close => Ok(Step::End(Ended::Closed)),
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => Ok(Step::Continue),
        }
    }

    fn handle_socket(&mut self, data: &str) -> Result<Step, Error> {
        let packet = match SocketPacket::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "ignoring undecodable socket packet");
                return Ok(Step::Continue);
            }
        };

        match packet {
            SocketPacket::Connect(payload) => {
                let sid = payload
                    .as_ref()
                    .and_then(|v| v.get("sid"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                self.connected = true;
                info!(transport = %self.transport, %sid, "realtime channel connected");
                self.shared.state.send_replace(ChannelState::Connected {
                    transport: self.transport,
                    sid,
                });
                Ok(Step::Continue)
            }
            SocketPacket::Event { name, args } => {
                let payload = args.into_iter().next().unwrap_or(Value::Null);
                let delivered = self.shared.registry.dispatch(&name, &payload);
                trace!(event = %name, delivered, "event dispatched");
                Ok(Step::Continue)
            }
            SocketPacket::ConnectError(data) => Err(Error::RealtimeRejected {
                message: SocketPacket::error_message(&data),
            }),
            SocketPacket::Disconnect => Ok(Step::End(Ended::ServerDisconnect)),
            SocketPacket::Ack => Ok(Step::Continue),
            SocketPacket::OtherNamespace(namespace) => {
                debug!(%namespace, "ignoring packet for another namespace");
                Ok(Step::Continue)
            }
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
pub(crate) async fn run(shared: Arc<Shared>, token: SecretString, cancel: CancellationToken) {
    let reconnect = shared.config.reconnect.clone();
    let mut attempt: u32 = 0;

    loop {
        let state = if attempt == 0 {
            ChannelState::Connecting
        } else {
            ChannelState::Reconnecting { attempt }
        };
        shared.state.send_replace(state);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_once(&shared, &token, &cancel) => result,
        };

        match result {
            Ok(Ended::Cancelled) => break,
            Ok(Ended::ServerDisconnect) => {
                info!("realtime channel disconnected by server");
                shared.state.send_replace(ChannelState::Disconnected);
                break;
            }
            // Clean close after a successful connect: start the backoff over,
            // but never reconnect without a pause.
            Ok(Ended::Closed) => {
                attempt = 0;
                let delay = reconnect.initial_delay;
                info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "realtime connection closed, reconnecting"
                );
                shared
                    .state
                    .send_replace(ChannelState::Reconnecting { attempt: 1 });

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(Error::RealtimeRejected { message }) => {
                error!(%message, "realtime connection rejected by server");
                shared.state.send_replace(ChannelState::Failed { reason: message });
                break;
            }
            Err(e) => {
                warn!(error = %e, attempt, "realtime connection error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        error!(max_retries = max, "realtime reconnection limit reached, giving up");
                        shared.state.send_replace(ChannelState::Failed {
                            reason: e.to_string(),
                        });
                        break;
                    }
                }

                attempt += 1;
                shared
                    .state
                    .send_replace(ChannelState::Reconnecting { attempt });

                let delay = calculate_backoff(attempt - 1, &reconnect);
                info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    debug!("realtime connection task exiting");
}

/// One connection attempt across the configured transports.
///
/// A transport that fails before the engine handshake falls through to the
/// next one. Once a handshake succeeded, its outcome is final.
async fn connect_once(
    shared: &Shared,
    token: &SecretString,
    cancel: &CancellationToken,
) -> Result<Ended, Error> {
    let mut last_err = None;

    for &kind in &shared.config.transports {
        let mut session = Session::new(shared, token, kind);
        let result = match kind {
            TransportKind::WebSocket => websocket::run(&mut session, cancel).await,
            TransportKind::Polling => polling::run(&mut session, cancel).await,
        };

        match result {
            Ok(Ended::Closed) if !session.connected => {
                return Err(Error::RealtimeConnect(
                    "connection closed before the socket connected".into(),
                ));
            }
            Err(e) if !session.opened() && !matches!(e, Error::RealtimeRejected { .. }) => {
                warn!(transport = %kind, error = %e, "transport unavailable, trying next");
                last_err = Some(e);
            }
            other => return other,
        }
    }

    Err(last_err.unwrap_or_else(|| Error::RealtimeConnect("no transports configured".into())))
}

// ── Endpoint ─────────────────────────────────────────────────────────

/// `{socket_url}/{path}/?EIO=4&transport=..[&sid=..]`, with a `ws`/`wss`
/// scheme for the WebSocket transport.
pub(crate) fn endpoint(
    config: &RealtimeConfig,
    transport: TransportKind,
    sid: Option<&str>,
) -> Result<Url, Error> {
    let mut url = config.socket_url.clone();
    let path = format!(
        "{}/{}/",
        url.path().trim_end_matches('/'),
        config.path.trim_matches('/')
    );
    url.set_path(&path);

    {
        let mut query = url.query_pairs_mut();
        query
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", transport.as_str());
        if let Some(sid) = sid {
            query.append_pair("sid", sid);
        }
    }

    if transport == TransportKind::WebSocket {
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => other,
        }
        .to_owned();
        url.set_scheme(&scheme)
            .map_err(|()| Error::RealtimeConnect(format!("unsupported socket scheme: {scheme}")))?;
    }

    Ok(url)
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
pub(crate) fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RealtimeConfig {
        RealtimeConfig::new(Url::parse("https://rt.example.com").unwrap())
    }

    #[test]
    fn websocket_endpoint_uses_wss() {
        let url = endpoint(&config(), TransportKind::WebSocket, None).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://rt.example.com/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn polling_endpoint_carries_sid() {
        let url = endpoint(&config(), TransportKind::Polling, Some("abc")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://rt.example.com/socket.io/?EIO=4&transport=polling&sid=abc"
        );
    }

    #[test]
    fn backoff_grows_and_caps() {
        let reconnect = ReconnectConfig::default();
        let first = calculate_backoff(0, &reconnect);
        let later = calculate_backoff(3, &reconnect);
        let capped = calculate_backoff(20, &reconnect);

        assert!(first <= Duration::from_millis(1250));
        assert!(later > first);
        assert!(capped <= reconnect.max_delay.mul_f64(1.25));
    }

    #[test]
    fn session_replies_to_open_with_token() {
        let (state, _rx) = watch::channel(ChannelState::Disconnected);
        let shared = Shared {
            config: config(),
            registry: Arc::new(Registry::default()),
            state,
        };
        let token = SecretString::from("t0k".to_owned());
        let mut session = Session::new(&shared, &token, TransportKind::Polling);

        let open = EnginePacket::decode(
            r#"0{"sid":"e1","upgrades":[],"pingInterval":100,"pingTimeout":50}"#,
        )
        .unwrap();
        let Step::Reply(reply) = session.handle(open).unwrap() else {
            panic!("expected a reply to open");
        };
        assert_eq!(reply.encode(), r#"40{"token":"t0k"}"#);
        assert!(session.opened());
        assert_eq!(session.ping_window(), Duration::from_millis(150));

        session.handle(EnginePacket::Message(r#"0{"sid":"s1"}"#.into())).unwrap();
        assert!(matches!(
            &*shared.state.borrow(),
            ChannelState::Connected { sid, .. } if sid == "s1"
        ));

        let err = session
            .handle(EnginePacket::Message(r#"4{"message":"Not authorized"}"#.into()))
            .unwrap_err();
        assert!(matches!(err, Error::RealtimeRejected { .. }));
    }
}
