// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Self-healing websocket connection manager.
//!
//! [`connect`] spawns one supervisor task per socket. The supervisor owns
//! the connection lifecycle: it dials, pushes every valid JSON text frame
//! into a bounded channel, and on any disconnect waits a fixed delay and
//! dials again, forever, until [`SocketHandle::close`] cancels it.
//!
//! Consumers never see the reconnect machinery. They read frames with
//! [`SocketHandle::next_frame`] and observe [`ConnectionStatus`] through a
//! watch channel; a dropped connection is just a `Closed -> Connecting ->
//! Open` transition between frames.

use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use zapdesk_core::types::ConnectionStatus;

/// Configuration for one managed socket.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Full `ws://` or `wss://` URL, auth token included as a query
    /// parameter. The token is redacted from all log output.
    pub url: String,
    /// Fixed wait between a disconnect and the next dial attempt.
    pub reconnect_delay: Duration,
    /// Whether a server-initiated clean close is also retried. Backends
    /// recycle connections on deploy, so this defaults to on.
    pub reconnect_on_clean_close: bool,
    /// Capacity of the frame channel; the reader applies backpressure to
    /// the socket when the consumer falls behind.
    pub frame_buffer: usize,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_millis(2000),
            reconnect_on_clean_close: true,
            frame_buffer: 256,
        }
    }
}

/// Handle to one supervised socket.
///
/// Dropping the handle cancels the supervisor, as does [`close`]; both are
/// idempotent, and a close during the reconnect wait aborts the pending
/// dial.
///
/// [`close`]: SocketHandle::close
#[derive(Debug)]
pub struct SocketHandle {
    status_rx: watch::Receiver<ConnectionStatus>,
    frames: Mutex<mpsc::Receiver<Value>>,
    cancel: CancellationToken,
}

impl SocketHandle {
    /// Last observed connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// A watcher over status transitions, for callers that want to await
    /// `Open` rather than poll.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Next decoded JSON frame, in arrival order across reconnects.
    ///
    /// Returns `None` only after [`close`](SocketHandle::close): the
    /// supervisor holds the sender for as long as it runs, so a dropped
    /// connection blocks here until the retry succeeds.
    pub async fn next_frame(&self) -> Option<Value> {
        self.frames.lock().await.recv().await
    }

    /// Stops the supervisor and closes the connection. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns the supervisor for `config` and returns its handle.
///
/// Never fails: an unreachable endpoint is the same as a dropped
/// connection, observed as a status that stays off `Open`.
pub fn connect(config: SocketConfig) -> SocketHandle {
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
    let (frame_tx, frame_rx) = mpsc::channel(config.frame_buffer.max(1));
    let cancel = CancellationToken::new();

    tokio::spawn(run_supervisor(config, status_tx, frame_tx, cancel.clone()));

    SocketHandle {
        status_rx,
        frames: Mutex::new(frame_rx),
        cancel,
    }
}

async fn run_supervisor(
    config: SocketConfig,
    status_tx: watch::Sender<ConnectionStatus>,
    frame_tx: mpsc::Sender<Value>,
    cancel: CancellationToken,
) {
    let display_url = redact_token(&config.url);

    loop {
        let _ = status_tx.send(ConnectionStatus::Connecting);
        debug!(url = %display_url, "dialing socket");

        let stream = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect_async(config.url.as_str()) => match result {
                Ok((stream, _response)) => stream,
                Err(error) => {
                    warn!(url = %display_url, %error, "socket dial failed");
                    let _ = status_tx.send(ConnectionStatus::Closed);
                    if !wait_for_retry(&config, &cancel).await {
                        break;
                    }
                    continue;
                }
            },
        };

        info!(url = %display_url, "socket open");
        let _ = status_tx.send(ConnectionStatus::Open);

        let clean = read_frames(stream, &frame_tx, &cancel).await;
        let _ = status_tx.send(ConnectionStatus::Closed);

        if cancel.is_cancelled() {
            break;
        }
        if clean && !config.reconnect_on_clean_close {
            info!(url = %display_url, "socket closed cleanly, not reconnecting");
            break;
        }
        warn!(
            url = %display_url,
            delay_ms = config.reconnect_delay.as_millis() as u64,
            "socket disconnected, reconnecting"
        );
        if !wait_for_retry(&config, &cancel).await {
            break;
        }
    }

    let _ = status_tx.send(ConnectionStatus::Closed);
    debug!(url = %display_url, "socket supervisor stopped");
}

/// Reads one connection until it drops. Returns whether the server closed
/// it cleanly (close frame or end-of-stream) as opposed to a transport
/// error.
///
/// The stream is read unsplit so that pong replies queued by the protocol
/// layer are flushed as part of polling.
async fn read_frames<S>(
    mut stream: tokio_tungstenite::WebSocketStream<S>,
    frame_tx: &mpsc::Sender<Value>,
    cancel: &CancellationToken,
) -> bool
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return true,
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                Ok(frame) => {
                    if frame_tx.send(frame).await.is_err() {
                        // Consumer gone; nothing left to deliver to.
                        return true;
                    }
                }
                Err(error) => {
                    warn!(%error, len = text.len(), "non-JSON text frame dropped");
                }
            },
            Some(Ok(Message::Binary(payload))) => {
                warn!(len = payload.len(), "unexpected binary frame dropped");
            }
            Some(Ok(Message::Close(reason))) => {
                debug!(?reason, "server sent close frame");
                return true;
            }
            // Ping/Pong/Frame are handled inside tungstenite.
            Some(Ok(_)) => {}
            Some(Err(error)) => {
                warn!(%error, "socket read error");
                return false;
            }
            None => return true,
        }
    }
}

/// Sleeps the fixed reconnect delay; false means the handle was closed
/// while waiting.
async fn wait_for_retry(config: &SocketConfig, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(config.reconnect_delay) => true,
    }
}

/// Strips credential query values from a URL before it reaches a log line.
fn redact_token(raw: &str) -> String {
    let Ok(mut url) = url::Url::parse(raw) else {
        return raw.to_owned();
    };
    let redacted: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case("token") && !v.is_empty() {
                (k.into_owned(), "[redacted]".to_owned())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    if redacted.is_empty() {
        return url.to_string();
    }
    url.query_pairs_mut().clear().extend_pairs(redacted);
    url.to_string()
}
