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

//! The seam between the session layer and the game rules engine. The host
//! dispatches decoded packets through this trait and never interprets their
//! contents; the engine pushes responses back through
//! [`PlayerSession::write`](crate::registry::PlayerSession::write).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::registry::PlayerSession;

/// Consumer of decoded application packets.
///
/// `on_message` calls are awaited inline by the connection's read loop, so for
/// any one connection they arrive strictly in frame order. Calls for
/// different connections run concurrently.
#[async_trait]
pub trait GameLogic: Send + Sync {
    /// One decoded packet from the player's current connection.
    async fn on_message(&self, player: &Arc<PlayerSession>, packet: Value);

    /// The player's attached connection has closed. The player session itself
    /// survives for a later reattachment.
    async fn on_disconnect(&self, player: &Arc<PlayerSession>);
}

/// Whatever room or table a player is currently seated at. Opaque to the
/// session layer; the rules engine supplies the implementation.
pub trait RoomContext: Send + Sync {
    fn room_id(&self) -> u64;
}
