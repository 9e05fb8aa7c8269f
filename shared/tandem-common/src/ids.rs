//! Identifier and role types.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short opaque room code: 3 random bytes rendered as 6 uppercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

/// Room code parse failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid room code: expected 6 hex characters, got {0:?}")]
pub struct InvalidRoomCode(pub String);

impl RoomCode {
    /// Generate a fresh random room code.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self(format!("{:06X}", rng.gen_range(0u32..=0x00FF_FFFF)))
    }

    /// Parse a code, normalizing to uppercase.
    pub fn parse(s: &str) -> Result<Self, InvalidRoomCode> {
        if s.len() == 6 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_uppercase()))
        } else {
            Err(InvalidRoomCode(s.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = InvalidRoomCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = InvalidRoomCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Client-generated opaque peer identifier.
///
/// The coordinator never interprets it; it only has to be stable for the
/// lifetime of one browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-page-load session identifier. A refresh always mints a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Mint a fresh session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-session role. The first member of a room is the controller; the
/// second is the follower. The controller alone detects the connection mode
/// and triggers relay fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Decides the connection mode, drives fallback.
    Controller,
    /// Mirrors the controller's decisions.
    Follower,
}

impl Role {
    #[must_use]
    pub const fn is_controller(self) -> bool {
        matches!(self, Self::Controller)
    }
}

/// Established transport path, locked once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Direct or NAT-traversed path.
    P2p,
    /// Relayed via TURN.
    Turn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_code_format() {
        for _ in 0..64 {
            let code = RoomCode::generate();
            assert_eq!(code.as_str().len(), 6);
            assert!(code
                .as_str()
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn room_code_parse_normalizes_case() {
        let code = RoomCode::parse("a1b2c3").expect("valid code");
        assert_eq!(code.as_str(), "A1B2C3");
    }

    #[test]
    fn room_code_rejects_bad_input() {
        assert!(RoomCode::parse("A1B2").is_err());
        assert!(RoomCode::parse("A1B2C3D4").is_err());
        assert!(RoomCode::parse("A1B2GZ").is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Controller).unwrap(),
            "\"controller\""
        );
        assert_eq!(
            serde_json::to_string(&ConnectionMode::P2p).unwrap(),
            "\"p2p\""
        );
    }
}
