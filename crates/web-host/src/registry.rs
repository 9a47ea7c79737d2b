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

//! The process-wide player registry: one long-lived `PlayerSession` per
//! application user, found or created at handshake time and surviving every
//! reconnect. The registry owns the sessions; connections only borrow a route
//! to them.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use cardroom_common::{Identity, encode_packet};

use crate::host::ws_connection::{ConnectionHandle, WriteError};
use crate::logic::RoomContext;

/// One logical player. Holds at most one *currently attached* connection at a
/// time; attaching a new one supersedes (never destroys) the old route.
pub struct PlayerSession {
    uid: i64,
    username: String,
    /// Routing back-reference only. The session never drives the connection's
    /// lifecycle; the connection's own task does that.
    connection: Mutex<Option<Arc<ConnectionHandle>>>,
    /// Whatever table the player is seated at, if any. Opaque here.
    room: Mutex<Option<Arc<dyn RoomContext>>>,
}

impl PlayerSession {
    fn new(uid: i64, username: String) -> Self {
        Self {
            uid,
            username,
            connection: Mutex::new(None),
            room: Mutex::new(None),
        }
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Make `conn` this player's current route, returning the superseded
    /// connection if there was one.
    pub(crate) fn attach(&self, conn: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        self.connection.lock().unwrap().replace(conn)
    }

    /// Clear the back-reference, but only if `connection_id` is still the
    /// current attachment. A stale connection closing after the player has
    /// reattached must not take the live route down with it.
    pub(crate) fn detach(&self, connection_id: uuid::Uuid) -> bool {
        let mut connection = self.connection.lock().unwrap();
        match connection.as_ref() {
            Some(current) if current.connection_id() == connection_id => {
                *connection = None;
                true
            }
            _ => {
                debug!(uid = self.uid, "stale connection detached after supersession");
                false
            }
        }
    }

    pub fn connection(&self) -> Option<Arc<ConnectionHandle>> {
        self.connection.lock().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some_and(|c| !c.is_closed())
    }

    pub fn room(&self) -> Option<Arc<dyn RoomContext>> {
        self.room.lock().unwrap().clone()
    }

    pub fn set_room(&self, room: Option<Arc<dyn RoomContext>>) {
        *self.room.lock().unwrap() = room;
    }

    /// Push one packet to the player's current connection. A detached or
    /// closed route reports a checked error the caller may discard; it never
    /// panics and never reaches a dead socket.
    pub fn write(&self, values: &[Value]) -> Result<(), WriteError> {
        let Some(conn) = self.connection() else {
            trace!(uid = self.uid, "write with no attached connection");
            return Err(WriteError::Closed);
        };
        let frame = encode_packet(values)?;
        match conn.send_text(frame.clone()) {
            Ok(()) => {
                info!(uid = self.uid, payload = %frame, "RSP");
                Ok(())
            }
            Err(e) => {
                warn!(uid = self.uid, payload = %frame, "dropped write to closed connection");
                Err(e)
            }
        }
    }
}

/// uid → session map shared by every connection task. The map's entry locking
/// makes same-uid handshake races resolve to a single session.
pub struct PlayerRegistry {
    players: DashMap<i64, Arc<PlayerSession>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: DashMap::new(),
        }
    }

    /// Look up the session for `identity.uid`, creating and registering it on
    /// first sight. An existing session is returned unchanged; in particular
    /// the stored username is the one from first registration.
    pub fn find_or_create(&self, identity: &Identity) -> Arc<PlayerSession> {
        let entry = self.players.entry(identity.uid).or_insert_with(|| {
            info!(uid = identity.uid, username = %identity.username, "registering player");
            Arc::new(PlayerSession::new(identity.uid, identity.username.clone()))
        });
        let player = entry.value().clone();
        drop(entry);

        if player.username() != identity.username {
            debug!(
                uid = identity.uid,
                registered = %player.username(),
                presented = %identity.username,
                "handshake username differs from registered; keeping registered"
            );
        }
        player
    }

    pub fn get(&self, uid: i64) -> Option<Arc<PlayerSession>> {
        self.players.get(&uid).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
