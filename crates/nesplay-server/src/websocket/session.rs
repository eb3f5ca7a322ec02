//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use nesplay_core::{ConnectionId, Handled, RelayDispatcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use crate::config::ServerConfig;
use crate::metrics::{
    RELAY_COMMANDS_TOTAL, RELAY_ROLES_ACTIVE, WS_CONNECTION_DURATION_SECONDS,
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};

/// Per-connection transport limits.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    /// Ping period.
    pub heartbeat_interval: Duration,
    /// Close after this long without a pong.
    pub heartbeat_timeout: Duration,
    /// Outbound queue depth.
    pub send_queue_capacity: usize,
}

impl From<&ServerConfig> for SessionOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
            send_queue_capacity: config.send_queue_capacity.max(1),
        }
    }
}

/// Run one client connection to completion.
///
/// 1. Registers the connection with the fan-out, then sends the `status`
///    snapshot through the dispatcher
/// 2. Feeds text and binary frames to the dispatcher
/// 3. Drains the outbound queue and pings on a timer in a writer task
/// 4. On close, heartbeat timeout or `shutdown`, unregisters and releases
///    the connection's role
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    dispatcher: RelayDispatcher<BroadcastManager>,
    options: SessionOptions,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();
    let (send_tx, send_rx) = mpsc::channel::<Arc<str>>(options.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));
    let closed = shutdown.child_token();

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let broadcast = Arc::clone(dispatcher.fanout());
    broadcast.add(Arc::clone(&connection));
    let mut state = dispatcher.on_connect(&conn_id);

    let outbound = tokio::spawn(write_loop(
        ws_tx,
        send_rx,
        Arc::clone(&connection),
        options,
        closed.clone(),
    ));

    loop {
        let frame = tokio::select! {
            () = closed.cancelled() => break,
            frame = ws_rx.next() => frame,
        };
        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(error)) => {
                debug!(%error, "websocket read failed");
                break;
            }
            None => break,
        };

        let handled = match &msg {
            Message::Text(text) => {
                dispatcher.on_message(&conn_id, &mut state, text.as_str().as_bytes())
            }
            Message::Binary(data) => dispatcher.on_message(&conn_id, &mut state, data),
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
        };
        counter!(RELAY_COMMANDS_TOTAL, "outcome" => handled.as_str()).increment(1);
        if let Handled::Assigned(_) = handled {
            gauge!(RELAY_ROLES_ACTIVE).increment(1.0);
        }
    }

    broadcast.remove(&conn_id);
    if dispatcher.on_disconnect(&conn_id, &mut state).is_some() {
        gauge!(RELAY_ROLES_ACTIVE).decrement(1.0);
    }
    closed.cancel();
    if outbound.await.is_err() {
        debug!("writer task panicked");
    }

    info!(
        dropped = connection.drop_count(),
        secs = connection.age().as_secs(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

/// Forward queued messages to the socket and keep the heartbeat.
///
/// Cancels `closed` when it stops so the reader exits too.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Arc<str>>,
    connection: Arc<ClientConnection>,
    options: SessionOptions,
    closed: CancellationToken,
) {
    let mut ping_interval = tokio::time::interval(options.heartbeat_interval);
    // The first tick fires immediately.
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            () = closed.cancelled() => break,
            msg = send_rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if !connection.check_alive()
                    && connection.last_pong_elapsed() > options.heartbeat_timeout
                {
                    warn!(
                        timeout_secs = options.heartbeat_timeout.as_secs(),
                        connected_secs = connection.age().as_secs(),
                        "client unresponsive, disconnecting"
                    );
                    break;
                }
                if ws_tx.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    closed.cancel();
    let _ = ws_tx.send(Message::Close(None)).await;
}
