// HTTP long-polling transport
//
// Server→client packets arrive as the bodies of consecutive GETs, each
// possibly batching several packets separated by `\x1e`. Client→server
// packets (socket connect, pongs) are POSTed to the same URL.

use std::time::Duration;

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::connection::{Ended, Session, Step};
use super::packet::{EnginePacket, SocketPacket, decode_payload};
use crate::error::Error;

/// A poll is held open by the server for up to one ping interval.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(60);

const TEXT_PLAIN: &str = "text/plain;charset=UTF-8";

pub(crate) async fn run(
    session: &mut Session<'_>,
    cancel: &CancellationToken,
) -> Result<Ended, Error> {
    let client = session
        .config()
        .transport
        .build_client_with_timeout(LONG_POLL_TIMEOUT)?;

    let open_url = session.endpoint(None)?;
    info!(url = %open_url, "connecting realtime long-polling");

    let handshake = tokio::time::timeout(session.ping_window(), fetch(&client, &open_url));
    let body = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(Ended::Cancelled),
        result = handshake => result
            .map_err(|_| Error::RealtimeConnect("polling handshake timed out".into()))??,
    };

    // The open packet must come first; the sid it carries scopes every
    // later request.
    let mut packets = decode_payload(&body)?.into_iter();
    let open = packets
        .next()
        .ok_or_else(|| Error::RealtimeProtocol("empty polling handshake".into()))?;
    let first_step = session.handle(open)?;
    let sid = session
        .engine_sid()
        .ok_or_else(|| Error::RealtimeProtocol("polling handshake did not open a session".into()))?
        .to_owned();
    let url = session.endpoint(Some(&sid))?;
    debug!(%sid, "polling session opened");

    if let Some(ended) = apply(&client, &url, first_step).await? {
        return Ok(ended);
    }
    for packet in packets {
        let step = session.handle(packet)?;
        if let Some(ended) = apply(&client, &url, step).await? {
            return Ok(ended);
        }
    }

    let polls = poll_stream(client.clone(), url.clone());
    futures_util::pin_mut!(polls);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let goodbye = SocketPacket::Disconnect.into_engine().encode();
                let _ = post(&client, &url, goodbye).await;
                return Ok(Ended::Cancelled);
            }
            () = tokio::time::sleep(session.ping_window()) => {
                return Err(Error::RealtimeConnect("ping timeout".into()));
            }
            item = polls.next() => {
                let body = match item {
                    Some(body) => body?,
                    None => return Ok(Ended::Closed),
                };
                for packet in decode_payload(&body)? {
                    let step = session.handle(packet)?;
                    if let Some(ended) = apply(&client, &url, step).await? {
                        return Ok(ended);
                    }
                }
            }
        }
    }
}

/// Carry out one protocol step. Returns the end reason if the connection is over.
async fn apply(client: &reqwest::Client, url: &Url, step: Step) -> Result<Option<Ended>, Error> {
    match step {
        Step::Continue => Ok(None),
        Step::Reply(packet) => {
            post(client, url, packet.encode()).await?;
            Ok(None)
        }
        Step::End(ended) => {
            if ended == Ended::Closed {
                let _ = post(client, url, EnginePacket::Close.encode()).await;
            }
            Ok(Some(ended))
        }
    }
}

/// Endless sequence of long-poll GET bodies.
fn poll_stream(client: reqwest::Client, url: Url) -> impl Stream<Item = Result<String, Error>> {
    try_stream! {
        loop {
            let body = fetch(&client, &url).await?;
            yield body;
        }
    }
}

async fn fetch(client: &reqwest::Client, url: &Url) -> Result<String, Error> {
    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| Error::RealtimeConnect(format!("poll failed: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::RealtimeConnect(format!("poll returned HTTP {status}")));
    }
    resp.text()
        .await
        .map_err(|e| Error::RealtimeConnect(format!("poll body: {e}")))
}

async fn post(client: &reqwest::Client, url: &Url, body: String) -> Result<(), Error> {
    let resp = client
        .post(url.clone())
        .header(reqwest::header::CONTENT_TYPE, TEXT_PLAIN)
        .body(body)
        .send()
        .await
        .map_err(|e| Error::RealtimeConnect(format!("post failed: {e}")))?;
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::RealtimeConnect(format!("post returned HTTP {status}")))
    }
}
