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

//! Types shared between the session host and anything else that needs to mint
//! credentials or speak the wire framing: the player identity, the signed
//! credential codec, and the frame vocabulary.

pub mod auth;
pub mod packet;

pub use auth::{AuthToken, CredentialError, Identity, SessionKey};
pub use packet::{Frame, FrameError, PING, PONG, encode_packet};

/// The one uid permitted to read or mutate administrative state.
pub const ADMIN_UID: i64 = 1;
