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

//! The shared host context and the route table. `WebHost` is handed to every
//! handler as router state; there is no module-level mutable state anywhere
//! in the session layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::host::auth::CredentialResolver;
use crate::host::{admin, ws_host};
use crate::logic::GameLogic;
use crate::registry::PlayerRegistry;

/// Everything a handler needs: the player registry, the game-logic consumer,
/// the credential resolver, and the administrative flag.
#[derive(Clone)]
pub struct WebHost {
    registry: Arc<PlayerRegistry>,
    game: Arc<dyn GameLogic>,
    credentials: Arc<CredentialResolver>,
    allow_robot: Arc<AtomicBool>,
}

impl WebHost {
    pub fn new(
        registry: Arc<PlayerRegistry>,
        game: Arc<dyn GameLogic>,
        credentials: CredentialResolver,
    ) -> Self {
        Self {
            registry,
            game,
            credentials: Arc::new(credentials),
            allow_robot: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    pub fn game(&self) -> Arc<dyn GameLogic> {
        self.game.clone()
    }

    pub(crate) fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    pub fn allow_robot(&self) -> bool {
        self.allow_robot.load(Ordering::Relaxed)
    }

    pub fn set_allow_robot(&self, value: bool) {
        self.allow_robot.store(value, Ordering::Relaxed);
    }
}

/// Build the host's route table. The permissive CORS layer is deliberate:
/// the service accepts clients from arbitrary origins.
pub fn mk_routes(web_host: WebHost) -> Router {
    Router::new()
        .route("/ws", get(ws_host::ws_attach_handler))
        .route(
            "/api/admin",
            get(admin::admin_get_handler).post(admin::admin_set_handler),
        )
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(web_host)
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "up"}))
}
