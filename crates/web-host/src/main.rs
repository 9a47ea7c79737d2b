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

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use clap_derive::Parser;
use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
};
use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use cardroom_common::SessionKey;
use cardroom_web_host::host::CredentialResolver;
use cardroom_web_host::registry::{PlayerRegistry, PlayerSession};
use cardroom_web_host::{GameLogic, WebHost, mk_routes};

#[derive(Parser, Debug, Serialize, Deserialize)]
struct Args {
    #[arg(
        long,
        value_name = "listen-address",
        help = "HTTP/WebSocket listen address",
        default_value = "0.0.0.0:8888"
    )]
    listen_address: String,

    #[arg(
        long,
        help = "Secret used to sign and verify session credentials. Minted at \
                random (and useless across restarts) when not set."
    )]
    session_secret: Option<String>,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    debug: bool,

    #[arg(long, help = "Yaml config file to use, overrides values in CLI args")]
    config_file: Option<String>,
}

/// Stand-in packet consumer: echoes every packet back to its sender. Keeps
/// the host drivable end-to-end on its own.
// TODO: replace with the table/rules engine once it lands in-tree.
struct LoopbackGame;

#[async_trait]
impl GameLogic for LoopbackGame {
    async fn on_message(&self, player: &Arc<PlayerSession>, packet: Value) {
        let _ = player.write(&[json!("echo"), packet]);
    }

    async fn on_disconnect(&self, player: &Arc<PlayerSession>) {
        info!(uid = player.uid(), "player connection lost");
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;
    let cli_args = Args::parse();
    let config_file = cli_args.config_file.clone();
    let mut args_figment = Figment::new().merge(Serialized::defaults(cli_args));
    if let Some(config_file) = config_file {
        args_figment = args_figment.merge(Yaml::file(config_file));
    }
    let args = args_figment.extract::<Args>()?;

    let main_subscriber = tracing_subscriber::fmt()
        .compact()
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(main_subscriber)
        .expect("Unable to set configure logging");

    let secret = match args.session_secret {
        Some(secret) => secret.into_bytes(),
        None => {
            warn!("No session secret configured; minting a random one. Credentials will not verify across restarts.");
            rand::rng().random::<[u8; 32]>().to_vec()
        }
    };

    let host = WebHost::new(
        Arc::new(PlayerRegistry::new()),
        Arc::new(LoopbackGame),
        CredentialResolver::new(SessionKey::new(&secret)),
    );
    let main_router = mk_routes(host);

    let mut hup_signal =
        signal(SignalKind::hangup()).expect("Unable to register HUP signal handler");
    let mut stop_signal =
        signal(SignalKind::interrupt()).expect("Unable to register STOP signal handler");

    let listen_sockaddr = args.listen_address.parse::<SocketAddr>()?;
    let listener = TcpListener::bind(listen_sockaddr).await?;
    info!("Host started, listening @ {}...", args.listen_address);

    let serve = axum::serve(
        listener,
        main_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .into_future();

    select! {
        result = serve => {
            result?;
            info!("Server loop exited, stopping...");
        }
        _ = hup_signal.recv() => {
            info!("HUP received, stopping...");
        }
        _ = stop_signal.recv() => {
            info!("STOP received, stopping...");
        }
    }
    info!("Done.");

    Ok(())
}
