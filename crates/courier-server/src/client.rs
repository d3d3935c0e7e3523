use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use courier_core::{ConnId, ServerFrame};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// A connected WebSocket client as the transport sees it: an outbound queue
/// plus liveness bookkeeping. Identity lives in the session registry, never
/// here.
pub struct Client {
    pub id: ConnId,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    last_pong: AtomicU64,
}

impl Client {
    fn new(id: ConnId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Owner of all live sockets' outbound queues. Delivery primitives only:
/// unicast `send_to`, full `broadcast`, and removal.
pub struct ClientHub {
    clients: DashMap<ConnId, Arc<Client>>,
    max_send_queue: usize,
    client_timeout: Duration,
}

impl ClientHub {
    pub fn new(max_send_queue: usize, client_timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
            client_timeout,
        }
    }

    /// Register a new client and return its id plus the outbound queue end.
    pub fn register(&self) -> (ConnId, mpsc::Receiver<String>) {
        let id = ConnId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let client = Arc::new(Client::new(id.clone(), tx));
        self.clients.insert(id.clone(), client);
        (id, rx)
    }

    /// Remove a client. Dropping its sender closes the outbound queue, which
    /// lets the writer drain anything already queued (an error frame on a
    /// hard failure) and then shut the socket. Idempotent.
    pub fn unregister(&self, id: &ConnId) {
        if let Some((_, client)) = self.clients.remove(id) {
            client.connected.store(false, Ordering::Relaxed);
        }
    }

    /// Queue a frame for one client. Returns false if the client is gone,
    /// already disconnected, or its queue is full.
    pub fn send_to(&self, id: &ConnId, frame: &ServerFrame) -> bool {
        let Some(client) = self.clients.get(id) else {
            return false;
        };
        if !client.is_connected() {
            return false;
        }
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, event = frame.event_name(), "Failed to serialize outbound frame");
                return false;
            }
        };
        match client.tx.try_send(json) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    conn_id = %id,
                    event = frame.event_name(),
                    "Send queue full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Queue a frame for every connected client. Serialized once; a full
    /// queue on one client never affects the others.
    pub fn broadcast(&self, frame: &ServerFrame) {
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, event = frame.event_name(), "Failed to serialize broadcast frame");
                return;
            }
        };
        for entry in self.clients.iter() {
            let client = entry.value();
            if client.is_connected() {
                let _ = client.tx.try_send(json.clone());
            }
        }
    }

    pub fn is_connected(&self, id: &ConnId) -> bool {
        self.clients
            .get(id)
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }

    /// Number of registered clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Ids of clients that have not answered a protocol ping in time.
    pub fn dead_clients(&self) -> Vec<ConnId> {
        self.clients
            .iter()
            .filter(|entry| !entry.value().is_alive(self.client_timeout))
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn mark_disconnected(&self, id: &ConnId) {
        if let Some(client) = self.clients.get(id) {
            client.connected.store(false, Ordering::Relaxed);
        }
    }

    fn record_pong(&self, id: &ConnId) {
        if let Some(client) = self.clients.get(id) {
            client.record_pong();
        }
    }
}

/// Drive one WebSocket: split into reader/writer, forward inbound text
/// frames to the dispatcher, keep the connection alive with protocol pings.
/// Returns once the socket is finished; the caller runs the disconnect path.
pub async fn handle_ws_connection(
    socket: WebSocket,
    conn_id: ConnId,
    mut rx: mpsc::Receiver<String>,
    hub: Arc<ClientHub>,
    inbound: mpsc::Sender<(ConnId, String)>,
    heartbeat_interval: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: forward queued frames to the socket + periodic ping
    let writer_cid = conn_id.clone();
    let writer_hub = Arc::clone(&hub);
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(conn_id = %writer_cid, "Sent ping");
                }
            }
        }

        writer_hub.mark_disconnected(&writer_cid);
    });

    // Reader task: forward text frames to the dispatcher, track pongs
    let reader_cid = conn_id.clone();
    let reader_hub = Arc::clone(&hub);
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let _ = inbound.send((reader_cid.clone(), text.to_string())).await;
                }
                WsMessage::Pong(_) => {
                    reader_hub.record_pong(&reader_cid);
                }
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum answers pongs automatically
                _ => {}
            }
        }
    });

    // Either side finishing ends the connection
    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    hub.unregister(&conn_id);
}
