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

//! Wire framing. Every exchange is a single text frame: outbound frames carry
//! a JSON array of heterogeneous values, inbound frames carry either the
//! literal keep-alive probe or one JSON-encoded packet.

use serde_json::Value;

/// Literal keep-alive probe sent by clients.
pub const PING: &str = "ping";
/// Literal reply to [`PING`].
pub const PONG: &str = "pong";

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The keep-alive probe, matched on the raw payload before any JSON
    /// decoding is attempted.
    Ping,
    /// A decoded application packet, opaque to the session layer.
    Packet(Value),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Frame {
    pub fn parse(raw: &str) -> Result<Frame, FrameError> {
        if raw == PING {
            return Ok(Frame::Ping);
        }
        Ok(Frame::Packet(serde_json::from_str(raw)?))
    }
}

/// Encode one outbound packet -- an ordered sequence of values -- as the text
/// payload of a single frame.
pub fn encode_packet(values: &[Value]) -> Result<String, serde_json::Error> {
    serde_json::to_string(values)
}
