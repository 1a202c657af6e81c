#![allow(clippy::unwrap_used)]
// Integration tests for the realtime channel against a local Socket.IO
// server (tokio-tungstenite) and a wiremock long-polling server.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crowdlens_api::{ChannelState, RealtimeChannel, RealtimeConfig, TransportKind};

const OPEN: &str =
    r#"0{"sid":"e1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

// ── Helpers ─────────────────────────────────────────────────────────

/// What the fake server does once a client completed the handshake.
#[derive(Clone, Copy)]
enum Script {
    /// Push one alert and keep the connection open.
    PushAlert,
    /// Push an alert on the `/admin` namespace, then one on `/`.
    PushAdminThenAlert,
    /// Close the connection right away.
    Close,
    /// Refuse the socket connect.
    Reject,
}

/// Serve one scripted WebSocket connection per entry of `scripts`.
/// Every auth frame received is forwarded on the returned channel.
async fn spawn_ws_server(scripts: Vec<Script>) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (auth_tx, auth_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for script in scripts {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            ws.send(Message::text(OPEN)).await.unwrap();
            let Some(Ok(Message::Text(auth))) = ws.next().await else {
                panic!("expected the socket connect packet");
            };
            auth_tx.send(auth.as_str().to_owned()).unwrap();

            match script {
                Script::PushAlert | Script::PushAdminThenAlert => {
                    ws.send(Message::text(r#"40{"sid":"s1"}"#)).await.unwrap();
                    if matches!(script, Script::PushAdminThenAlert) {
                        ws.send(Message::text(r#"42/admin,["alert",{"name":"Audit"}]"#))
                            .await
                            .unwrap();
                    }
                    ws.send(Message::text(
                        r#"42["alert",{"name":"Ravi","zone":"Gate A","severity":"High"}]"#,
                    ))
                    .await
                    .unwrap();
                    // Hold the connection until the client goes away.
                    while let Some(Ok(_)) = ws.next().await {}
                }
                Script::Close => {
                    ws.send(Message::text(r#"40{"sid":"s0"}"#)).await.unwrap();
                    ws.close(None).await.unwrap();
                }
                Script::Reject => {
                    ws.send(Message::text(r#"44{"message":"Not authorized"}"#))
                        .await
                        .unwrap();
                    while let Some(Ok(_)) = ws.next().await {}
                }
            }
        }
    });

    (addr, auth_rx)
}

fn channel_for(url: &str, transports: Vec<TransportKind>) -> RealtimeChannel {
    let mut config = RealtimeConfig::new(Url::parse(url).unwrap());
    config.transports = transports;
    config.reconnect.initial_delay = Duration::from_millis(20);
    config.transport.timeout = Duration::from_secs(2);
    RealtimeChannel::new(config)
}

fn token() -> SecretString {
    SecretString::from("tok-1".to_owned())
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .unwrap()
}

// ── WebSocket transport ─────────────────────────────────────────────

#[tokio::test]
async fn test_websocket_delivers_to_every_subscriber() {
    let (addr, mut auth_rx) = spawn_ws_server(vec![Script::PushAlert]).await;
    let channel = channel_for(&format!("http://{addr}"), vec![TransportKind::WebSocket]);

    channel.connect(&token());
    let (first_tx, mut first_rx) = mpsc::unbounded_channel();
    let (second_tx, mut second_rx) = mpsc::unbounded_channel();
    let _first = channel
        .subscribe_to_alerts(move |v| first_tx.send(v.clone()).unwrap())
        .unwrap();
    let _second = channel
        .subscribe_to_alerts(move |v| second_tx.send(v.clone()).unwrap())
        .unwrap();

    let auth = tokio::time::timeout(Duration::from_secs(5), auth_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth, r#"40{"token":"tok-1"}"#);

    assert_eq!(recv(&mut first_rx).await["name"], "Ravi");
    assert_eq!(recv(&mut second_rx).await["zone"], "Gate A");
    assert!(matches!(
        channel.current_state(),
        ChannelState::Connected { transport: TransportKind::WebSocket, .. }
    ));

    channel.disconnect();
    assert_eq!(channel.current_state(), ChannelState::Disconnected);
}

#[tokio::test]
async fn test_other_namespaces_are_not_delivered() {
    let (addr, _auth_rx) = spawn_ws_server(vec![Script::PushAdminThenAlert]).await;
    let channel = channel_for(&format!("http://{addr}"), vec![TransportKind::WebSocket]);

    channel.connect(&token());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = channel
        .subscribe_to_alerts(move |v| tx.send(v.clone()).unwrap())
        .unwrap();

    assert_eq!(recv(&mut rx).await["name"], "Ravi");
    assert!(rx.try_recv().is_err());
    channel.disconnect();
}

#[tokio::test]
async fn test_subscriptions_survive_reconnect() {
    let (addr, mut auth_rx) = spawn_ws_server(vec![Script::Close, Script::PushAlert]).await;
    let channel = channel_for(&format!("http://{addr}"), vec![TransportKind::WebSocket]);

    channel.connect(&token());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = channel
        .subscribe_to_alerts(move |v| tx.send(v.clone()).unwrap())
        .unwrap();

    // Alert only arrives on the second connection.
    let alert = recv(&mut rx).await;
    assert_eq!(alert["severity"], "High");

    auth_rx.recv().await.unwrap();
    auth_rx.recv().await.unwrap();
    channel.disconnect();
}

#[tokio::test]
async fn test_reconnect_after_close_waits_initial_delay() {
    let (addr, mut auth_rx) = spawn_ws_server(vec![Script::Close, Script::PushAlert]).await;
    let mut config = RealtimeConfig::new(Url::parse(&format!("http://{addr}")).unwrap());
    config.transports = vec![TransportKind::WebSocket];
    config.reconnect.initial_delay = Duration::from_millis(400);
    let channel = RealtimeChannel::new(config);

    channel.connect(&token());
    auth_rx.recv().await.unwrap();
    let closed_at = std::time::Instant::now();

    tokio::time::timeout(Duration::from_secs(5), auth_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(
        closed_at.elapsed() >= Duration::from_millis(300),
        "reconnected after {:?}",
        closed_at.elapsed()
    );
    channel.disconnect();
}

#[tokio::test]
async fn test_rejected_connect_fails_without_retry() {
    let (addr, _auth_rx) = spawn_ws_server(vec![Script::Reject]).await;
    let channel = channel_for(&format!("http://{addr}"), vec![TransportKind::WebSocket]);

    channel.connect(&token());
    let mut state = channel.state();
    let failed = tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| matches!(s, ChannelState::Failed { .. })),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    assert_eq!(
        failed,
        ChannelState::Failed {
            reason: "Not authorized".into()
        }
    );
}

// ── Long-polling fallback ───────────────────────────────────────────

#[tokio::test]
async fn test_falls_back_to_polling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("transport", "polling"))
        .and(query_param_is_missing("sid"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OPEN))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "e1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "e1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "40{\"sid\":\"s1\"}\u{1e}42[\"liveOccupancy\",{\"occupancy\":734}]",
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "e1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("6")
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let channel = channel_for(
        &server.uri(),
        vec![TransportKind::WebSocket, TransportKind::Polling],
    );
    channel.connect(&token());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = channel
        .subscribe_to_live_occupancy(move |v| tx.send(v.clone()).unwrap())
        .unwrap();

    assert_eq!(recv(&mut rx).await, json!({"occupancy": 734}));
    assert!(matches!(
        channel.current_state(),
        ChannelState::Connected { transport: TransportKind::Polling, .. }
    ));

    channel.disconnect();
}
