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

//! The credential codec: a player identity signed into a compact,
//! tamper-evident token. The same encoding is used for the `token` query
//! argument on the websocket handshake and for the value of the `user`
//! cookie, so one verify path serves both.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde_derive::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The authenticated identity of an application user. Resolved once per
/// handshake and immutable for the life of that connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: i64,
    pub username: String,
}

/// A signed, base64url-encoded `Identity`, in the form
/// `b64(payload) "." b64(hmac-sha256(payload))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// No usable credential was presented at all.
    #[error("authentication required")]
    Missing,
    /// A token was presented but failed decoding or signature verification.
    #[error("invalid token")]
    InvalidToken,
}

/// The process-wide signing key for session credentials.
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    pub fn new(secret: &[u8]) -> Self {
        Self(secret.to_vec())
    }

    /// Mint a signed token for `identity`.
    pub fn sign(&self, identity: &Identity) -> AuthToken {
        let payload = serde_json::to_vec(identity).expect("identity always serializes");
        let mut mac =
            HmacSha256::new_from_slice(&self.0).expect("hmac accepts any key length");
        mac.update(&payload);
        let sig = mac.finalize().into_bytes();
        AuthToken(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig)
        ))
    }

    /// Verify a presented token and decode the identity it carries. All
    /// failure modes -- malformed encoding, bad signature, unparseable
    /// payload -- collapse to `InvalidToken`; callers get no detail to leak.
    pub fn verify(&self, token: &str) -> Result<Identity, CredentialError> {
        let Some((payload_b64, sig_b64)) = token.split_once('.') else {
            return Err(CredentialError::InvalidToken);
        };
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| CredentialError::InvalidToken)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| CredentialError::InvalidToken)?;
        let mut mac =
            HmacSha256::new_from_slice(&self.0).expect("hmac accepts any key length");
        mac.update(&payload);
        mac.verify_slice(&sig)
            .map_err(|_| CredentialError::InvalidToken)?;
        serde_json::from_slice(&payload).map_err(|_| CredentialError::InvalidToken)
    }
}
