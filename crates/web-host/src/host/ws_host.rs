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

//! The websocket handshake: authenticate before upgrading, bind the
//! connection to its player, and hand the socket to the connection's pump.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use tracing::{debug, warn};

use crate::host::auth::{AuthParams, require_identity};
use crate::host::web_host::WebHost;
use crate::host::ws_connection::{ConnectionHandle, ConnectionState, WsConnection};

/// Handles `GET /ws`: upgrade one authenticated client into a live session.
///
/// Authentication happens here, before the upgrade completes, so a rejected
/// client gets a plain 401 and no connection ever reaches the dispatcher in a
/// partially-authenticated state. Browser `Origin` headers are deliberately
/// not checked; the host serves arbitrary origins.
pub async fn ws_attach_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(host): State<WebHost>,
    Query(params): Query<AuthParams>,
    headers: HeaderMap,
) -> Response {
    let (handle, outbound_rx) = ConnectionHandle::pair();
    handle.advance(ConnectionState::Authenticating);

    let identity = match require_identity(host.credentials(), params.token.as_deref(), &headers) {
        Ok(identity) => identity,
        Err(rejection) => {
            warn!(peer = %addr, "handshake rejected, no valid credential");
            return rejection;
        }
    };
    debug!(peer = %addr, uid = identity.uid, "handshake authenticated");

    let player = host.registry().find_or_create(&identity);
    let game = host.game();
    ws.on_upgrade(move |socket| async move {
        WsConnection::new(handle, outbound_rx, player, game, addr)
            .run(socket)
            .await
    })
}
