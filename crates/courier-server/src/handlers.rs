//! Inbound event handling: frame dispatch, session lifecycle hooks, and the
//! error reporter.

use std::sync::Arc;

use chrono::Utc;
use courier_core::{ClientFrame, ConnId, RelayError, ServerFrame};

use crate::client::ClientHub;
use crate::presence;
use crate::registry::SessionRegistry;
use crate::router;

/// Shared state available to all handlers. Constructed once in `start` and
/// passed explicitly; there are no process-wide globals.
pub struct HandlerState {
    pub hub: Arc<ClientHub>,
    pub registry: Arc<SessionRegistry>,
}

impl HandlerState {
    pub fn new(hub: Arc<ClientHub>, registry: Arc<SessionRegistry>) -> Self {
        Self { hub, registry }
    }
}

/// Transport connect hook. Presence is not broadcast here: the list only
/// changes when an identity is bound or released.
pub fn handle_connect(state: &HandlerState, conn_id: &ConnId, remote_addr: &str) {
    state.registry.register(conn_id, remote_addr);
    tracing::info!(
        conn_id = %conn_id,
        remote_addr = %remote_addr,
        total = state.hub.count(),
        "Client connected"
    );
}

/// Transport disconnect hook. Idempotent: the second call for the same id
/// finds nothing to remove and does nothing.
pub fn handle_disconnect(state: &HandlerState, conn_id: &ConnId) {
    let Some(record) = state.registry.unregister(conn_id) else {
        return;
    };
    let session_secs = (Utc::now() - record.connected_at).num_seconds();
    if let Some(username) = record.username {
        tracing::info!(
            conn_id = %conn_id,
            username = %username,
            session_secs,
            "Identified client disconnected"
        );
        presence::broadcast_presence(&state.hub, &state.registry);
    } else {
        tracing::info!(conn_id = %conn_id, session_secs, "Client disconnected");
    }
}

/// Decode and dispatch one raw inbound text frame.
pub fn dispatch(state: &HandlerState, conn_id: &ConnId, raw: &str) {
    let frame = match ClientFrame::parse(raw) {
        Ok(frame) => frame,
        Err(err) => return report_error(state, conn_id, &err),
    };
    tracing::debug!(conn_id = %conn_id, event = frame.event_name(), "Inbound frame");

    match frame {
        ClientFrame::SetUsername { username } => set_username(state, conn_id, username),
        ClientFrame::Message { to, text } => message(state, conn_id, to, text),
        ClientFrame::Ping => ping(state, conn_id),
    }
}

fn set_username(state: &HandlerState, conn_id: &ConnId, username: Option<String>) {
    let username = username.unwrap_or_default();
    match state.registry.bind(conn_id, &username) {
        Ok(()) => {
            tracing::info!(conn_id = %conn_id, username = %username, "Username set");
            presence::broadcast_presence(&state.hub, &state.registry);
        }
        Err(err) => report_error(state, conn_id, &err),
    }
}

fn message(state: &HandlerState, conn_id: &ConnId, to: Option<String>, text: Option<String>) {
    if let Err(err) = router::route(
        &state.hub,
        &state.registry,
        conn_id,
        to.as_deref(),
        text.as_deref(),
    ) {
        report_error(state, conn_id, &err);
    }
}

/// App-level liveness probe. No registry side effects.
fn ping(state: &HandlerState, conn_id: &ConnId) {
    state.hub.send_to(
        conn_id,
        &ServerFrame::Pong {
            timestamp: Utc::now().to_rfc3339(),
        },
    );
}

/// Map a failure to the single outward `error` frame shape and, for hard
/// errors, tear the connection down: identity released first, so presence
/// stays consistent, then the socket closed. The error frame is queued
/// before the close, so the client still sees it.
pub fn report_error(state: &HandlerState, conn_id: &ConnId, err: &RelayError) {
    if *err == RelayError::Internal {
        tracing::warn!(conn_id = %conn_id, kind = err.kind(), "Internal handler failure");
    } else {
        tracing::debug!(conn_id = %conn_id, kind = err.kind(), "Rejected frame");
    }

    state.hub.send_to(conn_id, &ServerFrame::error(err));

    if err.is_hard() {
        handle_disconnect(state, conn_id);
        state.hub.unregister(conn_id);
        tracing::info!(conn_id = %conn_id, kind = err.kind(), "Connection closed after hard error");
    }
}
