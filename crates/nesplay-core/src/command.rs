//! Command codec for the `{"cmd": string, "data": string}` wire format.
//!
//! Every WebSocket frame carries exactly one command. Inbound kinds are
//! `screen`, `player`, `keyup` and `keydown`; everything the server emits is
//! built through the constructors below so the vocabulary lives in one place.

use serde::{Deserialize, Serialize};

use crate::errors::DecodeError;
use crate::role::{Role, RoleRequest};

/// Outbound kind: comma-joined list of active roles.
pub const STATUS: &str = "status";
/// Outbound kind: the recipient's role or rejection reason.
pub const WHOAMI: &str = "whoami";
/// Outbound kind: a role was filled.
pub const JOIN: &str = "join";
/// Outbound kind: a role was vacated.
pub const PART: &str = "part";

/// A decoded or to-be-encoded command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command kind.
    pub cmd: String,
    /// Free-form payload. Absent on the wire means empty.
    #[serde(default)]
    pub data: String,
}

/// Controller button transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// Button released.
    Up,
    /// Button pressed.
    Down,
}

impl KeyAction {
    /// Wire name (`keyup` / `keydown`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "keyup",
            Self::Down => "keydown",
        }
    }
}

/// Classification of a decoded inbound command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// `screen` or `player`.
    Claim(RoleRequest),
    /// `keyup` / `keydown` with an opaque key identifier.
    Key {
        /// Press or release.
        action: KeyAction,
        /// Key identifier, forwarded untouched.
        key: &'a str,
    },
    /// Anything outside the inbound vocabulary.
    Unknown(&'a str),
}

impl Command {
    /// Build a command from its two fields.
    pub fn new(cmd: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            data: data.into(),
        }
    }

    /// Parse one wire frame.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Serialize to the wire format. Two strings always encode.
    pub fn encode(&self) -> String {
        serde_json::json!({ "cmd": self.cmd, "data": self.data }).to_string()
    }

    /// Classify this command for dispatch.
    pub fn inbound(&self) -> Inbound<'_> {
        match self.cmd.as_str() {
            "screen" => Inbound::Claim(RoleRequest::Screen),
            "player" => Inbound::Claim(RoleRequest::Player),
            "keyup" => Inbound::Key {
                action: KeyAction::Up,
                key: &self.data,
            },
            "keydown" => Inbound::Key {
                action: KeyAction::Down,
                key: &self.data,
            },
            other => Inbound::Unknown(other),
        }
    }

    /// `status` with the given snapshot.
    pub fn status(snapshot: impl Into<String>) -> Self {
        Self::new(STATUS, snapshot)
    }

    /// `whoami` with a role name or rejection reason.
    pub fn whoami(payload: &str) -> Self {
        Self::new(WHOAMI, payload)
    }

    /// `join` for a freshly filled role.
    pub fn join(role: Role) -> Self {
        Self::new(JOIN, role.as_str())
    }

    /// `part` for a vacated role.
    pub fn part(role: Role) -> Self {
        Self::new(PART, role.as_str())
    }

    /// Input relayed to the screen: kind is the sender's role, payload is
    /// `"<keyup|keydown> <key>"`.
    pub fn input(from: Role, action: KeyAction, key: &str) -> Self {
        Self::new(from.as_str(), format!("{} {key}", action.as_str()))
    }
}
