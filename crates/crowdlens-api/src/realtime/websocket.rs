// WebSocket transport
//
// One text frame carries exactly one Engine.IO packet.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::connection::{Ended, Session, Step};
use super::packet::{EnginePacket, SocketPacket};
use crate::error::Error;

/// Establish a single WebSocket connection and pump packets until it ends.
pub(crate) async fn run(
    session: &mut Session<'_>,
    cancel: &CancellationToken,
) -> Result<Ended, Error> {
    let url = session.endpoint(None)?;
    info!(url = %url, "connecting realtime websocket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::RealtimeConnect(e.to_string()))?;
    let request = ClientRequestBuilder::new(uri)
        .with_header("User-Agent", session.config().transport.user_agent.clone());

    let handshake = tokio::time::timeout(
        session.ping_window(),
        tokio_tungstenite::connect_async(request),
    );
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(Ended::Cancelled),
        result = handshake => result
            .map_err(|_| Error::RealtimeConnect("websocket handshake timed out".into()))?
            .map_err(|e| Error::RealtimeConnect(e.to_string()))?,
    };

    debug!("websocket upgraded, waiting for engine open");
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let goodbye = SocketPacket::Disconnect.into_engine().encode();
                let _ = write.send(Message::text(goodbye)).await;
                let _ = write.close().await;
                return Ok(Ended::Cancelled);
            }
            () = tokio::time::sleep(session.ping_window()) => {
                return Err(Error::RealtimeConnect("ping timeout".into()));
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let packet = EnginePacket::decode(text.as_str())?;
                        match session.handle(packet)? {
                            Step::Continue => {}
                            Step::Reply(reply) => {
                                write
                                    .send(Message::text(reply.encode()))
                                    .await
                                    .map_err(|e| Error::RealtimeConnect(e.to_string()))?;
                            }
                            Step::End(ended) => {
                                let _ = write.close().await;
                                return Ok(ended);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        trace!("websocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            info!(code = %cf.code, reason = %cf.reason, "websocket close frame received");
                        } else {
                            info!("websocket close frame received (no payload)");
                        }
                        return Ok(Ended::Closed);
                    }
                    Some(Err(e)) => {
                        return Err(Error::RealtimeConnect(e.to_string()));
                    }
                    None => {
                        info!("websocket stream ended");
                        return Ok(Ended::Closed);
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}
