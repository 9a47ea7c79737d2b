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

//! The administrative resource: read and write the process-wide "allow
//! automated opponents" flag. Gated to the single privileged uid; everyone
//! else gets a structured 403 and no state change.

use axum::Form;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_derive::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use cardroom_common::{ADMIN_UID, Identity};

use crate::host::auth::{AuthParams, require_identity};
use crate::host::web_host::WebHost;

#[derive(Debug, Serialize)]
struct RobotFlag {
    allow_robot: bool,
}

#[derive(Debug, Deserialize)]
pub struct RobotFlagUpdate {
    allow_robot: String,
}

/// `GET /api/admin` -- current flag value, for the privileged uid only.
pub async fn admin_get_handler(
    State(host): State<WebHost>,
    Query(params): Query<AuthParams>,
    headers: HeaderMap,
) -> Response {
    let identity = match require_admin(&host, params.token.as_deref(), &headers) {
        Ok(identity) => identity,
        Err(rejection) => return rejection,
    };

    info!(uid = identity.uid, "admin flag read");
    Json(RobotFlag {
        allow_robot: host.allow_robot(),
    })
    .into_response()
}

/// `POST /api/admin` -- replace the flag and echo the new value. The form
/// field is boolean-coercible; anything unrecognizable is a 400, not a
/// silent truthy coercion.
pub async fn admin_set_handler(
    State(host): State<WebHost>,
    Query(params): Query<AuthParams>,
    headers: HeaderMap,
    Form(update): Form<RobotFlagUpdate>,
) -> Response {
    let identity = match require_admin(&host, params.token.as_deref(), &headers) {
        Ok(identity) => identity,
        Err(rejection) => return rejection,
    };

    let Some(value) = coerce_bool(&update.allow_robot) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "allow_robot must be a boolean"})),
        )
            .into_response();
    };

    host.set_allow_robot(value);
    info!(uid = identity.uid, allow_robot = value, "admin flag updated");
    Json(RobotFlag { allow_robot: value }).into_response()
}

/// Authentication guard plus the privileged-uid gate. Returns the rejection
/// response to hand straight back: 401 with no credential, 403 for anyone
/// who is not the privileged identity.
fn require_admin(
    host: &WebHost,
    token: Option<&str>,
    headers: &HeaderMap,
) -> Result<Identity, Response> {
    let identity = require_identity(host.credentials(), token, headers)?;
    if identity.uid != ADMIN_UID {
        warn!(uid = identity.uid, "admin access refused");
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "forbidden"})),
        )
            .into_response());
    }
    Ok(identity)
}

fn coerce_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
