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

//! End-to-end session behavior, driven over a real loopback listener with a
//! real websocket client: handshake rejection, keep-alive, dispatch ordering,
//! reattachment routing, disconnect notification, and the admin resource.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use cardroom_common::{Identity, SessionKey};
use cardroom_web_host::host::CredentialResolver;
use cardroom_web_host::registry::{PlayerRegistry, PlayerSession};
use cardroom_web_host::{GameLogic, WebHost, mk_routes};

const SECRET: &[u8] = b"session-test-secret";

/// Records every dispatch and disconnect notification on channels the test
/// can await.
struct RecordingGame {
    packets: mpsc::UnboundedSender<(i64, Value)>,
    disconnects: mpsc::UnboundedSender<i64>,
}

#[async_trait]
impl GameLogic for RecordingGame {
    async fn on_message(&self, player: &Arc<PlayerSession>, packet: Value) {
        let _ = self.packets.send((player.uid(), packet));
    }

    async fn on_disconnect(&self, player: &Arc<PlayerSession>) {
        let _ = self.disconnects.send(player.uid());
    }
}

struct TestServer {
    addr: SocketAddr,
    host: WebHost,
    packets: mpsc::UnboundedReceiver<(i64, Value)>,
    disconnects: mpsc::UnboundedReceiver<i64>,
}

async fn spawn_host() -> TestServer {
    let (packets_tx, packets) = mpsc::unbounded_channel();
    let (disconnects_tx, disconnects) = mpsc::unbounded_channel();
    let game = Arc::new(RecordingGame {
        packets: packets_tx,
        disconnects: disconnects_tx,
    });
    let host = WebHost::new(
        Arc::new(PlayerRegistry::new()),
        game,
        CredentialResolver::new(SessionKey::new(SECRET)),
    );
    let router = mk_routes(host.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    TestServer {
        addr,
        host,
        packets,
        disconnects,
    }
}

fn token_for(uid: i64, username: &str) -> String {
    SessionKey::new(SECRET)
        .sign(&Identity {
            uid,
            username: username.to_string(),
        })
        .0
}

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr, uid: i64) -> WsClient {
    let url = format!("ws://{addr}/ws?token={}", token_for(uid, "player"));
    let (ws, _response) = connect_async(url).await.expect("handshake should succeed");
    ws
}

async fn recv_dispatch(rx: &mut mpsc::UnboundedReceiver<(i64, Value)>) -> (i64, Value) {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for dispatch")
        .expect("dispatch channel closed")
}

async fn recv_frame(ws: &mut WsClient) -> String {
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for frame")
        .expect("connection ended")
        .expect("frame error");
    msg.into_text().expect("text frame").to_string()
}

#[tokio::test]
async fn handshake_without_credential_is_rejected() {
    let server = spawn_host().await;
    let result = connect_async(format!("ws://{}/ws", server.addr)).await;
    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
    assert_eq!(server.host.registry().len(), 0, "no session may be created");
}

#[tokio::test]
async fn handshake_with_bad_token_is_rejected() {
    let server = spawn_host().await;
    let result = connect_async(format!("ws://{}/ws?token=forged.credential", server.addr)).await;
    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn ping_yields_literal_pong_and_never_reaches_game_logic() {
    let mut server = spawn_host().await;
    let mut ws = connect(server.addr, 11).await;

    ws.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(recv_frame(&mut ws).await, "pong");

    // A follow-up real packet proves the probe was not dispatched: the first
    // thing game logic sees is the packet, not the ping.
    ws.send(Message::Text(r#"{"seq":1}"#.into())).await.unwrap();
    let (uid, packet) = recv_dispatch(&mut server.packets).await;
    assert_eq!(uid, 11);
    assert_eq!(packet, json!({"seq": 1}));
}

#[tokio::test]
async fn packets_dispatch_in_arrival_order() {
    let mut server = spawn_host().await;
    let mut ws = connect(server.addr, 7).await;

    for seq in 1..=20 {
        ws.send(Message::Text(format!(r#"{{"seq":{seq}}}"#).into()))
            .await
            .unwrap();
    }
    for seq in 1..=20 {
        let (uid, packet) = recv_dispatch(&mut server.packets).await;
        assert_eq!(uid, 7);
        assert_eq!(packet, json!({"seq": seq}));
    }
}

#[tokio::test]
async fn reattachment_routes_to_the_new_connection() {
    let mut server = spawn_host().await;

    let mut first = connect(server.addr, 9).await;
    first
        .send(Message::Text(r#"{"seq":1}"#.into()))
        .await
        .unwrap();
    recv_dispatch(&mut server.packets).await;

    // Same credential, new connection: the player's route moves here.
    let mut second = connect(server.addr, 9).await;
    second
        .send(Message::Text(r#"{"seq":2}"#.into()))
        .await
        .unwrap();
    recv_dispatch(&mut server.packets).await;

    let player = server.host.registry().get(9).expect("player registered");
    player.write(&[json!("deal")]).unwrap();
    assert_eq!(recv_frame(&mut second).await, r#"["deal"]"#);

    // The superseded connection stays silent.
    let nothing = timeout(Duration::from_millis(200), first.next()).await;
    assert!(nothing.is_err(), "orphaned connection must receive nothing");

    // Closing the orphaned connection must not take down the live route.
    first.close(None).await.ok();
    let gone = timeout(Duration::from_secs(5), server.disconnects.recv())
        .await
        .expect("timed out waiting for disconnect")
        .unwrap();
    assert_eq!(gone, 9);

    player.write(&[json!("again")]).unwrap();
    assert_eq!(recv_frame(&mut second).await, r#"["again"]"#);
}

#[tokio::test]
async fn same_credential_resolves_to_same_player_session() {
    let mut server = spawn_host().await;

    let mut ws = connect(server.addr, 5).await;
    ws.send(Message::Text(r#"{"seq":1}"#.into())).await.unwrap();
    recv_dispatch(&mut server.packets).await;
    let before = server.host.registry().get(5).unwrap();

    ws.close(None).await.ok();
    timeout(Duration::from_secs(5), server.disconnects.recv())
        .await
        .expect("timed out waiting for disconnect")
        .unwrap();

    let mut ws = connect(server.addr, 5).await;
    ws.send(Message::Text(r#"{"seq":2}"#.into())).await.unwrap();
    recv_dispatch(&mut server.packets).await;
    let after = server.host.registry().get(5).unwrap();

    assert!(
        Arc::ptr_eq(&before, &after),
        "player session must survive reconnects"
    );
    assert_eq!(server.host.registry().len(), 1);
}

#[tokio::test]
async fn malformed_packet_closes_the_connection() {
    let mut server = spawn_host().await;
    let mut ws = connect(server.addr, 13).await;

    ws.send(Message::Text(r#"{"seq":1}"#.into())).await.unwrap();
    recv_dispatch(&mut server.packets).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    let gone = timeout(Duration::from_secs(5), server.disconnects.recv())
        .await
        .expect("timed out waiting for disconnect")
        .unwrap();
    assert_eq!(gone, 13);
}

#[tokio::test]
async fn admin_resource_gates_on_the_privileged_uid() {
    let server = spawn_host().await;
    let client = reqwest::Client::new();
    let base = format!("http://{}/api/admin", server.addr);

    // No credential: challenged.
    let response = client.get(&base).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Mortal uid: refused, flag untouched.
    let mortal = format!("{base}?token={}", token_for(2, "mortal"));
    let response = client.get(&mortal).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let response = client
        .post(&mortal)
        .form(&[("allow_robot", "true")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    assert!(!server.host.allow_robot());

    // Privileged uid: set then read back.
    let admin = format!("{base}?token={}", token_for(1, "admin"));
    let response = client
        .post(&admin)
        .form(&[("allow_robot", "true")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"allow_robot": true})
    );
    let body = client
        .get(&admin)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(body, json!({"allow_robot": true}));
}

#[tokio::test]
async fn admin_resource_accepts_the_session_cookie() {
    let server = spawn_host().await;
    let client = reqwest::Client::new();
    let base = format!("http://{}/api/admin", server.addr);

    let body = client
        .get(&base)
        .header(reqwest::header::COOKIE, format!("user={}", token_for(1, "admin")))
        .send()
        .await
        .unwrap();
    assert_eq!(body.status().as_u16(), 200);
    assert_eq!(
        body.json::<Value>().await.unwrap(),
        json!({"allow_robot": false})
    );
}
