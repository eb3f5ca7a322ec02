//! Session roles and claim outcomes.

use std::fmt;
use std::str::FromStr;

/// One of the three mutually exclusive session slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The emulator display.
    Screen,
    /// First controller.
    Player1,
    /// Second controller.
    Player2,
}

impl Role {
    /// All roles in status order.
    pub const ALL: [Self; 3] = [Self::Screen, Self::Player1, Self::Player2];

    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Player1 => "player1",
            Self::Player2 => "player2",
        }
    }

    /// Whether this role sends controller input.
    pub fn is_player(self) -> bool {
        matches!(self, Self::Player1 | Self::Player2)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "screen" => Ok(Self::Screen),
            "player1" => Ok(Self::Player1),
            "player2" => Ok(Self::Player2),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// What a client asks for. Players never pick their number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleRequest {
    /// `{"cmd": "screen"}`
    Screen,
    /// `{"cmd": "player"}`
    Player,
}

impl RoleRequest {
    /// The rejection sent back when this request cannot be granted.
    pub fn rejection(self) -> Rejection {
        match self {
            Self::Screen => Rejection::NotScreen,
            Self::Player => Rejection::NotPlayer,
        }
    }
}

/// Why a claim was refused. Sent verbatim as the `whoami` payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Screen slot is taken.
    NotScreen,
    /// Both player slots are taken.
    NotPlayer,
}

impl Rejection {
    /// Wire payload.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotScreen => "notscreen",
            Self::NotPlayer => "notplayer",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`Session::try_claim`](crate::session::Session::try_claim).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClaimResult {
    /// The handle now occupies this slot.
    Assigned(Role),
    /// Nothing changed.
    Rejected(Rejection),
}

impl ClaimResult {
    /// Payload of the `whoami` reply for this outcome.
    pub fn whoami_payload(self) -> &'static str {
        match self {
            Self::Assigned(role) => role.as_str(),
            Self::Rejected(reason) => reason.as_str(),
        }
    }

    /// The assigned role, if any.
    pub fn role(self) -> Option<Role> {
        match self {
            Self::Assigned(role) => Some(role),
            Self::Rejected(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(Role::Screen.as_str(), "screen");
        assert_eq!(Role::Player1.as_str(), "player1");
        assert_eq!(Role::Player2.as_str(), "player2");
    }

    #[test]
    fn role_parse() {
        assert_eq!("player2".parse::<Role>(), Ok(Role::Player2));
        assert!("player".parse::<Role>().is_err());
        assert!("Screen".parse::<Role>().is_err());
    }

    #[test]
    fn only_players_are_players() {
        assert!(!Role::Screen.is_player());
        assert!(Role::Player1.is_player());
        assert!(Role::Player2.is_player());
    }

    #[test]
    fn all_is_in_status_order() {
        let names: Vec<_> = Role::ALL.iter().map(|r| r.as_str()).collect();
        assert_eq!(names, ["screen", "player1", "player2"]);
    }

    #[test]
    fn rejection_matches_request() {
        assert_eq!(RoleRequest::Screen.rejection(), Rejection::NotScreen);
        assert_eq!(RoleRequest::Player.rejection(), Rejection::NotPlayer);
        assert_eq!(Rejection::NotScreen.to_string(), "notscreen");
        assert_eq!(Rejection::NotPlayer.to_string(), "notplayer");
    }

    #[test]
    fn whoami_payloads() {
        assert_eq!(ClaimResult::Assigned(Role::Player1).whoami_payload(), "player1");
        assert_eq!(
            ClaimResult::Rejected(Rejection::NotPlayer).whoami_payload(),
            "notplayer"
        );
        assert_eq!(ClaimResult::Rejected(Rejection::NotScreen).role(), None);
    }
}
