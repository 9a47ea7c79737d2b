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

//! Credential resolution for handshakes and HTTP requests: a bearer token in
//! the query string first, then the signed session cookie. Pure
//! verify-and-decode; no state is touched here.

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_derive::Deserialize;

use cardroom_common::{CredentialError, Identity, SessionKey};

/// Name of the signed cookie carrying the `{uid, username}` payload.
pub const SESSION_COOKIE: &str = "user";

/// Query arguments shared by every authenticated resource.
#[derive(Debug, Deserialize)]
pub struct AuthParams {
    pub token: Option<String>,
}

pub struct CredentialResolver {
    key: SessionKey,
}

impl CredentialResolver {
    pub fn new(key: SessionKey) -> Self {
        Self { key }
    }

    /// Resolve a verified identity from a request. A presented token that
    /// fails verification is `InvalidToken`; a cookie that fails
    /// verification counts as absent (tampering yields "no user", it does
    /// not get its own distinguishable rejection).
    pub fn resolve(
        &self,
        token: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<Identity, CredentialError> {
        if let Some(token) = token {
            return self.key.verify(token);
        }
        if let Some(cookie) = session_cookie(headers) {
            return self
                .key
                .verify(&cookie)
                .map_err(|_| CredentialError::Missing);
        }
        Err(CredentialError::Missing)
    }
}

/// The explicit guard invoked at the top of every authenticated handler:
/// either a verified identity, or the 401 to hand straight back.
pub(crate) fn require_identity(
    resolver: &CredentialResolver,
    token: Option<&str>,
    headers: &HeaderMap,
) -> Result<Identity, Response> {
    resolver.resolve(token, headers).map_err(|e| {
        (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
    })
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookie_header.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            if name == SESSION_COOKIE {
                return Some(urlencoding::decode(value).ok()?.into_owned());
            }
        }
    }
    None
}
