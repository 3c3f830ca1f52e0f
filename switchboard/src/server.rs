//! Control-channel server
//!
//! One websocket route accepts peers, runs the signaling handshake, and
//! hands discovered media streams to the relay. Admission is checked
//! before any transport resources exist; a full room answers 403.

use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use switchboard_relay::{
    attach_inbound, webrtc_transport::WebRtcTransport, PeerId, PeerSession, RelayConfig, Room,
    SignalMessage, Transport,
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    room: Arc<Room>,
    next_id: Arc<AtomicU32>,
}

impl AppState {
    fn new(config: RelayConfig) -> Self {
        let room = Arc::new(Room::new(config.room_capacity));
        Self {
            config: Arc::new(config),
            room,
            next_id: Arc::new(AtomicU32::new(0)),
        }
    }
}

pub async fn run(config: RelayConfig) -> Result<()> {
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(&state.config.listen_addr).await?;
    info!(addr = %state.config.listen_addr, "control channel listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install shutdown handler");
        return;
    }
    info!("shutting down");
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    // Reject before any transport resources are allocated.
    if state.room.is_full() {
        warn!("rejecting connection: room is full");
        return (StatusCode::FORBIDDEN, "room full").into_response();
    }

    ws.max_message_size(64 * 1024)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let peer_id = PeerId::new(state.next_id.fetch_add(1, Ordering::Relaxed) + 1);
    info!(peer = %peer_id, "peer connected");

    let (ws_sink, mut ws_stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<Message>(state.config.outbound_message_buffer);
    let pump = tokio::spawn(write_pump(ws_sink, out_rx));

    let transport = match WebRtcTransport::connect(&state.config).await {
        Ok(transport) => transport,
        Err(e) => {
            error!(peer = %peer_id, error = %e, "failed to create transport");
            pump.abort();
            return;
        }
    };

    let session = match PeerSession::connect(
        peer_id,
        Arc::clone(&transport) as Arc<dyn Transport>,
        &state.config,
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            error!(peer = %peer_id, error = %e, "failed to set up session");
            let _ = transport.close().await;
            pump.abort();
            return;
        }
    };

    // The admission check above can race concurrent upgrades; the room
    // re-checks under its lock.
    if let Err(e) = state.room.add(Arc::clone(&session)) {
        warn!(peer = %peer_id, error = %e, "admission lost the race");
        session.close().await;
        pump.abort();
        return;
    }

    // Locally gathered candidates trickle out as `ice` messages.
    {
        let out_tx = out_tx.clone();
        session.transport().on_candidate(Box::new(move |candidate| {
            match SignalMessage::Ice(candidate).encode() {
                Ok(text) => {
                    if out_tx.try_send(Message::Text(text.into())).is_err() {
                        warn!("control channel unavailable, dropping local candidate");
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode local candidate"),
            }
        }));
    }

    // Discovered inbound streams go to the relay. The handler looks the
    // session up by id so the transport's callbacks never keep it alive
    // past its removal from the room.
    {
        let room = Arc::clone(&state.room);
        session.transport().on_inbound_stream(Box::new(move |media| {
            match room.get(peer_id) {
                Some(from) => {
                    attach_inbound(Arc::clone(&room), from, media);
                }
                None => debug!(peer = %peer_id, "stream discovered after teardown, dropping"),
            }
        }));
    }

    while let Some(frame) = ws_stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(peer = %peer_id, error = %e, "control channel read failed");
                break;
            }
        };

        let message = match SignalMessage::decode(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                // Protocol error: drop the message, keep the peer.
                warn!(peer = %peer_id, error = %e, "dropping malformed control message");
                continue;
            }
        };

        debug!(peer = %peer_id, kind = message.kind(), "control message");
        match session.handle_signal(message).await {
            Ok(Some(reply)) => match reply.encode() {
                Ok(text) => {
                    if out_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!(peer = %peer_id, error = %e, "failed to encode reply"),
            },
            Ok(None) => {}
            Err(e) => {
                error!(peer = %peer_id, error = %e, "negotiation failed, closing session");
                break;
            }
        }
    }

    info!(peer = %peer_id, "peer disconnected");
    session.close().await;
    state.room.remove(peer_id);
    pump.abort();
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = sink.send(message).await {
            debug!(error = %e, "control channel write failed");
            break;
        }
    }
}
