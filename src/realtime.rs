//! Realtime socket channel: connect/disconnect tracking only, no message protocol.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Counts live socket connections.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    active: Arc<AtomicUsize>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Records a new connection. Dropping the guard records the disconnect.
    pub fn connect(&self) -> Connection {
        let id = Uuid::new_v4();
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        info!(connection = %id, active, "A user connected");
        Connection { id, active: self.active.clone() }
    }
}

pub struct Connection {
    id: Uuid,
    active: Arc<AtomicUsize>,
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        info!(connection = %self.id, active, "User disconnected");
    }
}

/// Upgrades to a WebSocket. Requests that are not valid upgrades get the usual JSON error body.
pub async fn socket_entry(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => {
            let hub = state.realtime.clone();
            ws.on_upgrade(move |socket| serve_socket(hub, socket))
        }
        Err(rejection) => {
            debug!("Rejected socket upgrade: {}", rejection.body_text());
            AppError::from(rejection).into_response()
        }
    }
}

async fn serve_socket(hub: RealtimeHub, mut socket: WebSocket) {
    let connection = hub.connect();
    // Inbound frames carry no protocol yet; drain until the peer goes away.
    while let Some(frame) = socket.recv().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = %connection.id(), "Socket error: {}", e);
                break;
            }
        }
    }
}
