// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket implementation of [`RemoteLink`].
//!
//! A background task owns the socket and reconnects with exponential
//! backoff. Emits are queued to that task; acknowledgements are matched to
//! callers through a pending map keyed by ack id. When the socket drops,
//! every pending ack fails with [`LinkError::Disconnected`].

use super::{LinkError, RemoteLink, ServerEvent};
use async_trait::async_trait;
use dx_core::OfflineLogRecord;
use dx_wire::{events, BulkAck, BulkPayload, ClientFrame, PostLogAck, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

/// Header carrying the client API key on the handshake (`API-KEY`; header
/// names are case-insensitive and `http` requires the lowercase form).
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("api-key");

/// Connection settings for [`WsLink`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Persistent client identity, added to every emitted payload as `uuid`.
    pub client_uuid: String,
    /// Ack deadline for single-record posts.
    pub ack_timeout: Duration,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
}

impl LinkConfig {
    pub fn new(url: impl Into<String>, client_uuid: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            client_uuid: client_uuid.into(),
            ack_timeout: Duration::from_secs(10),
            reconnect_min: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
        }
    }

    dx_core::setters! {
        ack_timeout: Duration,
        reconnect_min: Duration,
        reconnect_max: Duration,
        some api_key: String,
    }
}

#[derive(Default)]
struct LinkState {
    /// Frames for the current socket; `None` while disconnected.
    outbound: Option<mpsc::UnboundedSender<String>>,
    pending: HashMap<u64, oneshot::Sender<Value>>,
    next_ack: u64,
}

struct Shared {
    config: LinkConfig,
    state: Mutex<LinkState>,
    connected: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
}

/// Server link over a WebSocket. Cheap to clone.
#[derive(Clone)]
pub struct WsLink {
    inner: Arc<Shared>,
}

impl WsLink {
    /// Start connecting in the background. Server pushes are delivered on the
    /// returned receiver.
    pub fn connect(config: LinkConfig) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let link = Self {
            inner: Arc::new(Shared {
                config,
                state: Mutex::new(LinkState::default()),
                connected: watch::channel(false).0,
                shutdown: watch::channel(false).0,
            }),
        };
        tokio::spawn(run(Arc::clone(&link.inner), events_tx));
        (link, events_rx)
    }

    /// Stop reconnecting and drop the socket.
    pub fn close(&self) {
        self.inner.shutdown.send_replace(true);
    }

    async fn emit_with_ack<T: DeserializeOwned>(
        &self,
        event: &str,
        mut data: Value,
        timeout: Duration,
    ) -> Result<T, LinkError> {
        if let Value::Object(map) = &mut data {
            map.insert("uuid".to_string(), Value::String(self.inner.config.client_uuid.clone()));
        }

        let (tx, rx) = oneshot::channel();
        let ack_id = {
            let mut state = self.inner.state.lock();
            let outbound = state.outbound.clone().ok_or(LinkError::Disconnected)?;
            state.next_ack += 1;
            let ack_id = state.next_ack;
            let frame = ClientFrame { event: event.to_string(), ack_id: Some(ack_id), data };
            let text =
                serde_json::to_string(&frame).map_err(|e| LinkError::Encode(e.to_string()))?;
            state.pending.insert(ack_id, tx);
            if outbound.send(text).is_err() {
                state.pending.remove(&ack_id);
                return Err(LinkError::Disconnected);
            }
            ack_id
        };
        tracing::trace!(event, ack_id, "emitted");

        let data = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(data)) => data,
            Ok(Err(_)) => return Err(LinkError::Disconnected),
            Err(_) => {
                self.inner.state.lock().pending.remove(&ack_id);
                return Err(LinkError::Timeout(timeout));
            }
        };
        serde_json::from_value(data).map_err(|e| LinkError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteLink for WsLink {
    fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    fn watch_connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    async fn post_log(&self, record: &OfflineLogRecord) -> Result<PostLogAck, LinkError> {
        let data = serde_json::to_value(record).map_err(|e| LinkError::Encode(e.to_string()))?;
        self.emit_with_ack(events::POST_LOG, data, self.inner.config.ack_timeout).await
    }

    async fn post_logs_bulk(
        &self,
        records: &[OfflineLogRecord],
        timeout: Duration,
    ) -> Result<BulkAck, LinkError> {
        let payload = BulkPayload { logs: records.to_vec() };
        let data = serde_json::to_value(&payload).map_err(|e| LinkError::Encode(e.to_string()))?;
        self.emit_with_ack(events::POST_LOGS_BULK, data, timeout).await
    }

    async fn ping(&self, timeout: Duration) -> Result<Duration, LinkError> {
        let start = Instant::now();
        let _: Value = self.emit_with_ack(events::PING, Value::Object(Default::default()), timeout).await?;
        Ok(start.elapsed())
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection supervisor: connect, serve until the socket drops, back off,
/// repeat until shutdown.
async fn run(shared: Arc<Shared>, events_tx: mpsc::Sender<ServerEvent>) {
    let mut shutdown = shared.shutdown.subscribe();
    let mut backoff = shared.config.reconnect_min;

    loop {
        if *shutdown.borrow() {
            break;
        }
        match open(&shared.config).await {
            Ok(ws) => {
                tracing::info!(url = %shared.config.url, "server link connected");
                backoff = shared.config.reconnect_min;
                serve(&shared, ws, &events_tx, &mut shutdown).await;
                tracing::info!("server link disconnected");
            }
            Err(e) => {
                tracing::debug!(url = %shared.config.url, error = %e, ?backoff, "server link connect failed");
            }
        }

        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown.changed() => {}
        }
        backoff = (backoff * 2).min(shared.config.reconnect_max);
    }
    tracing::debug!("server link closed");
}

async fn open(config: &LinkConfig) -> Result<WsStream, tokio_tungstenite::tungstenite::Error> {
    let mut request = config.url.as_str().into_client_request()?;
    if let Some(key) = &config.api_key {
        match HeaderValue::from_str(key) {
            Ok(value) => {
                request.headers_mut().insert(API_KEY_HEADER, value);
            }
            Err(_) => tracing::warn!("api key is not a valid header value, connecting without it"),
        }
    }
    let (ws, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(ws)
}

async fn serve(
    shared: &Shared,
    ws: WsStream,
    events_tx: &mpsc::Sender<ServerEvent>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let (mut write, mut read) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    shared.state.lock().outbound = Some(outbound_tx);
    shared.connected.send_replace(true);

    loop {
        tokio::select! {
            Some(text) = outbound_rx.recv() => {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "server link write failed");
                    break;
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => on_frame(shared, text.as_str(), events_tx).await,
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "server closed link");
                    break;
                }
                Some(Ok(_)) => {} // Ping/Pong/Binary
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "server link read failed");
                    break;
                }
                None => break,
            },
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        }
    }

    // Dropping the senders fails every waiting emit with Disconnected
    let pending = {
        let mut state = shared.state.lock();
        state.outbound = None;
        std::mem::take(&mut state.pending)
    };
    if !pending.is_empty() {
        tracing::warn!(count = pending.len(), "dropping unacknowledged emits");
    }
    shared.connected.send_replace(false);
}

async fn on_frame(shared: &Shared, text: &str, events_tx: &mpsc::Sender<ServerEvent>) {
    match ServerFrame::parse(text) {
        Some(ServerFrame::Ack { ack_id, data }) => {
            let waiter = shared.state.lock().pending.remove(&ack_id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(data);
                }
                None => tracing::debug!(ack_id, "unmatched ack"),
            }
        }
        Some(ServerFrame::Push { event, data }) => {
            tracing::debug!(%event, "server push");
            if events_tx.send(ServerEvent::from_push(event, data)).await.is_err() {
                tracing::debug!("no listener for server events");
            }
        }
        None => tracing::debug!(len = text.len(), "ignoring unrecognized server frame"),
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
