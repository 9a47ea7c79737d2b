// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! One physical websocket connection: the lifecycle state machine, the shared
//! write handle handed to the player session, and the pump that moves frames
//! in both directions until the transport goes away.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use cardroom_common::{Frame, PONG};

use crate::logic::GameLogic;
use crate::registry::PlayerSession;

/// Lifecycle of a connection. `Closed` is terminal and reachable from every
/// other state; the forward path never skips a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Open,
    Closed,
}

impl ConnectionState {
    fn may_advance_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Authenticating, Open)
                | (Connecting, Closed)
                | (Authenticating, Closed)
                | (Open, Closed)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The connection is not open. Routine when the remote end has gone
    /// away; callers are free to discard this.
    #[error("connection closed")]
    Closed,
    #[error("packet encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The shared side of a connection: what the player session (and through it,
/// the game logic) holds to push frames out. The read loop owns everything
/// else.
pub struct ConnectionHandle {
    connection_id: Uuid,
    state: Mutex<ConnectionState>,
    outbound: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub(crate) fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let handle = Arc::new(Self {
            connection_id: Uuid::new_v4(),
            state: Mutex::new(ConnectionState::Connecting),
            outbound,
        });
        (handle, outbound_rx)
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Drive the state machine forward. Returns false (and leaves the state
    /// untouched) for a transition the machine does not allow.
    pub(crate) fn advance(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.may_advance_to(next) {
            error!(
                connection_id = %self.connection_id,
                from = ?*state,
                to = ?next,
                "illegal connection state transition"
            );
            return false;
        }
        trace!(connection_id = %self.connection_id, from = ?*state, to = ?next, "connection state");
        *state = next;
        true
    }

    /// Terminal transition. Idempotent; returns true only for the call that
    /// actually closed the connection, so teardown work runs once.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == ConnectionState::Closed {
            return false;
        }
        trace!(connection_id = %self.connection_id, from = ?*state, "connection closed");
        *state = ConnectionState::Closed;
        true
    }

    /// Queue one already-encoded text frame for the socket. Writing to a
    /// connection that is not open is a guarded no-op reported as a checked
    /// result. A close racing the state check just makes the channel reject
    /// the frame, which reports the same way.
    pub fn send_text(&self, frame: String) -> Result<(), WriteError> {
        {
            let state = self.state.lock().unwrap();
            if *state != ConnectionState::Open {
                return Err(WriteError::Closed);
            }
        }
        self.outbound.send(frame).map_err(|_| WriteError::Closed)
    }
}

/// The task side of one websocket connection, bound to exactly one player for
/// its entire lifetime.
pub struct WsConnection {
    handle: Arc<ConnectionHandle>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    player: Arc<PlayerSession>,
    game: Arc<dyn GameLogic>,
    peer_addr: SocketAddr,
}

impl WsConnection {
    pub(crate) fn new(
        handle: Arc<ConnectionHandle>,
        outbound_rx: mpsc::UnboundedReceiver<String>,
        player: Arc<PlayerSession>,
        game: Arc<dyn GameLogic>,
        peer_addr: SocketAddr,
    ) -> Self {
        Self {
            handle,
            outbound_rx,
            player,
            game,
            peer_addr,
        }
    }

    /// Pump the connection until the transport closes. Runs as the
    /// connection's own task; inbound frames are dispatched strictly in
    /// arrival order, outbound frames arrive from any task via the handle.
    pub async fn run(self, stream: WebSocket) {
        let Self {
            handle,
            mut outbound_rx,
            player,
            game,
            peer_addr,
        } = self;
        let uid = player.uid();

        if !handle.advance(ConnectionState::Open) {
            return;
        }
        // This connection becomes the player's route. A previous attachment
        // is orphaned, not force-closed; its own loop notices the stale
        // transport in its own time.
        if let Some(stale) = player.attach(handle.clone()) {
            info!(uid, stale = %stale.connection_id(), "superseding previous connection");
        }
        info!(uid, connection_id = %handle.connection_id(), peer = %peer_addr, "socket open");

        let (mut ws_sender, mut ws_receiver) = stream.split();
        loop {
            select! {
                inbound = ws_receiver.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            if !dispatch_frame(&game, &player, text.as_str(), &mut ws_sender).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(uid, "remote closed connection");
                            break;
                        }
                        Some(Ok(_)) => {
                            debug!(uid, "ignoring non-text frame");
                        }
                        Some(Err(e)) => {
                            // Routine transport death, not a server error.
                            info!(uid, error = ?e, "error receiving frame, closing");
                            break;
                        }
                    }
                }
                outbound = outbound_rx.recv() => {
                    let Some(frame) = outbound else { break };
                    if let Err(e) = ws_sender.send(Message::Text(frame.into())).await {
                        info!(uid, error = ?e, "write to closing transport dropped");
                        break;
                    }
                }
            }
        }

        if handle.close() {
            player.detach(handle.connection_id());
            game.on_disconnect(&player).await;
            info!(uid, connection_id = %handle.connection_id(), "socket close");
        }
    }
}

/// Handle one inbound text frame. Returns false when the connection must
/// close (malformed payload or a dead sink).
async fn dispatch_frame(
    game: &Arc<dyn GameLogic>,
    player: &Arc<PlayerSession>,
    raw: &str,
    ws_sender: &mut SplitSink<WebSocket, Message>,
) -> bool {
    match Frame::parse(raw) {
        Ok(Frame::Ping) => {
            // Cheap liveness path; never touches the game logic.
            trace!(uid = player.uid(), "ping");
            if let Err(e) = ws_sender
                .send(Message::Text(Utf8Bytes::from_static(PONG)))
                .await
            {
                info!(uid = player.uid(), error = ?e, "pong write failed, closing");
                return false;
            }
            true
        }
        Ok(Frame::Packet(packet)) => {
            info!(uid = player.uid(), payload = %raw, "REQ");
            game.on_message(player, packet).await;
            true
        }
        Err(e) => {
            warn!(uid = player.uid(), payload = %raw, error = %e, "malformed packet, closing connection");
            false
        }
    }
}
