//! Relay dispatcher: per-event behavior of one connection.
//!
//! The transport owns the socket and a [`ConnectionState`] per connection,
//! and calls [`RelayDispatcher::on_connect`], [`RelayDispatcher::on_message`]
//! and [`RelayDispatcher::on_disconnect`]. Outbound traffic goes through a
//! [`FanOut`], which the transport implements over its connection table.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::command::{Command, Inbound, KeyAction};
use crate::ids::ConnectionId;
use crate::role::{ClaimResult, Rejection, Role, RoleRequest};
use crate::session::Session;

/// Outbound delivery provided by the connection layer.
///
/// Both methods must be non-blocking. Delivery to a handle that is gone is
/// a silent no-op.
pub trait FanOut: Send + Sync {
    /// Queue `message` for one connection. Returns `false` if it was not
    /// queued (unknown handle, closed or full channel).
    fn send(&self, to: &ConnectionId, message: &str) -> bool;

    /// Queue `message` for every registered connection except `excluded`.
    /// Returns the number of connections it was queued for.
    fn broadcast_except(&self, message: &str, excluded: &ConnectionId) -> usize;
}

/// Where a connection is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, no role yet.
    #[default]
    Unassigned,
    /// Holds a role.
    Assigned(Role),
    /// Gone. Further events are ignored.
    Disconnected,
}

impl ConnectionState {
    /// The held role, if any.
    pub fn role(self) -> Option<Role> {
        match self {
            Self::Assigned(role) => Some(role),
            Self::Unassigned | Self::Disconnected => None,
        }
    }
}

/// Outcome of one inbound message, for metrics and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handled {
    /// A claim succeeded.
    Assigned(Role),
    /// A claim was refused.
    Rejected(Rejection),
    /// Input was relayed to the screen.
    Forwarded {
        /// Sending player.
        from: Role,
    },
    /// Input from a non-player, or with no screen to receive it.
    InputDropped,
    /// Well-formed command of an unknown kind.
    Unrecognized,
    /// Frame did not decode.
    Malformed,
    /// Connection already disconnected.
    Ignored,
}

impl Handled {
    /// Label used for the `outcome` metric dimension.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned(_) => "assigned",
            Self::Rejected(_) => "rejected",
            Self::Forwarded { .. } => "forwarded",
            Self::InputDropped => "input_dropped",
            Self::Unrecognized => "unrecognized",
            Self::Malformed => "malformed",
            Self::Ignored => "ignored",
        }
    }
}

/// Interprets commands against the shared [`Session`] and notifies peers.
pub struct RelayDispatcher<F> {
    session: Arc<Session>,
    fanout: Arc<F>,
}

impl<F> Clone for RelayDispatcher<F> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            fanout: Arc::clone(&self.fanout),
        }
    }
}

impl<F: FanOut> RelayDispatcher<F> {
    /// Create a dispatcher over a session and a fan-out.
    pub fn new(session: Arc<Session>, fanout: Arc<F>) -> Self {
        Self { session, fanout }
    }

    /// The shared session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The fan-out used for delivery.
    pub fn fanout(&self) -> &Arc<F> {
        &self.fanout
    }

    /// A new connection arrived. Sends it the current `status`.
    ///
    /// `conn` must already be registered with the fan-out.
    pub fn on_connect(&self, conn: &ConnectionId) -> ConnectionState {
        let snapshot = self.session.status_snapshot();
        let _ = self
            .fanout
            .send(conn, &Command::status(snapshot.as_str()).encode());
        drop(snapshot);
        debug!(conn_id = %conn, "connection registered");
        ConnectionState::Unassigned
    }

    /// Handle one inbound frame.
    pub fn on_message(
        &self,
        conn: &ConnectionId,
        state: &mut ConnectionState,
        raw: &[u8],
    ) -> Handled {
        if *state == ConnectionState::Disconnected {
            return Handled::Ignored;
        }
        let command = match Command::decode(raw) {
            Ok(command) => command,
            Err(error) => {
                warn!(conn_id = %conn, %error, "dropping frame");
                return Handled::Malformed;
            }
        };
        match command.inbound() {
            Inbound::Claim(request) => self.claim(conn, state, request),
            Inbound::Key { action, key } => self.forward_input(conn, *state, action, key),
            Inbound::Unknown(kind) => {
                warn!(conn_id = %conn, cmd = kind, "unrecognized command");
                Handled::Unrecognized
            }
        }
    }

    /// The connection closed. Frees its role and announces the `part`.
    ///
    /// Returns the vacated role. Safe to call more than once.
    pub fn on_disconnect(&self, conn: &ConnectionId, state: &mut ConnectionState) -> Option<Role> {
        *state = ConnectionState::Disconnected;
        let released = self.session.release(conn);
        let role = *released;
        if let Some(role) = role {
            let reached = self
                .fanout
                .broadcast_except(&Command::part(role).encode(), conn);
            info!(conn_id = %conn, role = %role, reached, "role vacated");
        }
        drop(released);
        role
    }

    fn claim(&self, conn: &ConnectionId, state: &mut ConnectionState, request: RoleRequest) -> Handled {
        let claimed = self.session.try_claim(request, conn);
        let result = *claimed;
        let _ = self
            .fanout
            .send(conn, &Command::whoami(result.whoami_payload()).encode());
        match result {
            ClaimResult::Assigned(role) => {
                let reached = self
                    .fanout
                    .broadcast_except(&Command::join(role).encode(), conn);
                drop(claimed);
                *state = ConnectionState::Assigned(role);
                info!(conn_id = %conn, role = %role, reached, "role claimed");
                Handled::Assigned(role)
            }
            ClaimResult::Rejected(reason) => {
                drop(claimed);
                debug!(conn_id = %conn, %reason, "claim rejected");
                Handled::Rejected(reason)
            }
        }
    }

    fn forward_input(
        &self,
        conn: &ConnectionId,
        state: ConnectionState,
        action: KeyAction,
        key: &str,
    ) -> Handled {
        let Some(from) = state.role().filter(|role| role.is_player()) else {
            trace!(conn_id = %conn, "input from non-player dropped");
            return Handled::InputDropped;
        };
        let Some(screen) = self.session.screen_handle() else {
            trace!(conn_id = %conn, role = %from, "no screen, input dropped");
            return Handled::InputDropped;
        };
        let message = Command::input(from, action, key).encode();
        if !self.fanout.send(&screen, &message) {
            debug!(conn_id = %conn, screen = %screen, "screen gone, input dropped");
        }
        Handled::Forwarded { from }
    }
}
