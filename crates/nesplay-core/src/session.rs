//! Shared role registry.
//!
//! A [`Session`] holds the three role slots behind one mutex so that every
//! check-then-set sees all slots together. Only two operations write the
//! slots: [`Session::try_claim`] and [`Session::release`].
//!
//! Notifications describing a mutation must reach other connections in
//! mutation order, but the slot mutex must not be held while sending. Each
//! mutating (or snapshotting) operation therefore takes a second
//! "announcement" lock before it lets go of the slots and hands it to the
//! caller inside an [`Ordered`]. Sends happen while the `Ordered` is alive;
//! the next operation cannot announce until it is dropped. Lock order is
//! always slots → announcement.

use std::ops::Deref;

use parking_lot::{Mutex, MutexGuard};

use crate::ids::ConnectionId;
use crate::role::{ClaimResult, Role, RoleRequest};

#[derive(Debug, Default)]
struct Slots {
    screen: Option<ConnectionId>,
    player1: Option<ConnectionId>,
    player2: Option<ConnectionId>,
}

impl Slots {
    fn get(&self, role: Role) -> Option<&ConnectionId> {
        match role {
            Role::Screen => self.screen.as_ref(),
            Role::Player1 => self.player1.as_ref(),
            Role::Player2 => self.player2.as_ref(),
        }
    }

    fn get_mut(&mut self, role: Role) -> &mut Option<ConnectionId> {
        match role {
            Role::Screen => &mut self.screen,
            Role::Player1 => &mut self.player1,
            Role::Player2 => &mut self.player2,
        }
    }

    fn role_of(&self, handle: &ConnectionId) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| self.get(*role) == Some(handle))
    }

    fn claim(&mut self, request: RoleRequest, handle: &ConnectionId) -> ClaimResult {
        // A handle never occupies two slots.
        if self.role_of(handle).is_some() {
            return ClaimResult::Rejected(request.rejection());
        }
        let candidates: &[Role] = match request {
            RoleRequest::Screen => &[Role::Screen],
            RoleRequest::Player => &[Role::Player1, Role::Player2],
        };
        for &role in candidates {
            let slot = self.get_mut(role);
            if slot.is_none() {
                *slot = Some(handle.clone());
                return ClaimResult::Assigned(role);
            }
        }
        ClaimResult::Rejected(request.rejection())
    }

    fn filled(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.get(*role).is_some())
            .collect()
    }
}

/// An operation outcome that also holds the announcement turn.
///
/// Perform the sends describing the outcome while this value is alive, then
/// drop it. Do not call back into the [`Session`] while holding it.
#[must_use = "the announcement turn is released as soon as this is dropped"]
pub struct Ordered<'a, T> {
    outcome: T,
    _turn: MutexGuard<'a, ()>,
}

impl<T> Ordered<'_, T> {
    /// Borrow the outcome.
    pub fn outcome(&self) -> &T {
        &self.outcome
    }
}

impl<T> Deref for Ordered<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.outcome
    }
}

/// The single screen/player-pair session.
///
/// Created once per server and shared with every connection task through an
/// `Arc`.
#[derive(Default)]
pub struct Session {
    slots: Mutex<Slots>,
    announce: Mutex<()>,
}

impl Session {
    /// Create a session with all slots empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically try to give `handle` the requested role.
    ///
    /// `screen` succeeds only when the screen slot is empty. `player` takes
    /// `player1` if empty, else `player2` if empty. A handle that already
    /// holds a role is rejected and keeps its role.
    pub fn try_claim(&self, request: RoleRequest, handle: &ConnectionId) -> Ordered<'_, ClaimResult> {
        let mut slots = self.slots.lock();
        let outcome = slots.claim(request, handle);
        let turn = self.announce.lock();
        drop(slots);
        Ordered { outcome, _turn: turn }
    }

    /// Atomically vacate whatever slot `handle` occupies.
    ///
    /// Returns the vacated role, or `None` when the handle held nothing.
    pub fn release(&self, handle: &ConnectionId) -> Ordered<'_, Option<Role>> {
        let mut slots = self.slots.lock();
        let outcome = slots.role_of(handle);
        if let Some(role) = outcome {
            *slots.get_mut(role) = None;
        }
        let turn = self.announce.lock();
        drop(slots);
        Ordered { outcome, _turn: turn }
    }

    /// Comma-joined names of the filled roles (`screen,player1,player2`
    /// order, no trailing separator), taken as one consistent view.
    pub fn status_snapshot(&self) -> Ordered<'_, String> {
        let slots = self.slots.lock();
        let outcome = slots
            .filled()
            .into_iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let turn = self.announce.lock();
        drop(slots);
        Ordered { outcome, _turn: turn }
    }

    /// Current screen handle. It may disconnect before the caller sends.
    pub fn screen_handle(&self) -> Option<ConnectionId> {
        self.slots.lock().screen.clone()
    }

    /// Role currently held by `handle`.
    pub fn role_of(&self, handle: &ConnectionId) -> Option<Role> {
        self.slots.lock().role_of(handle)
    }

    /// Filled roles in status order.
    pub fn roles(&self) -> Vec<Role> {
        self.slots.lock().filled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::role::Rejection;

    fn id(name: &str) -> ConnectionId {
        ConnectionId::from_raw(name)
    }

    #[test]
    fn fresh_session_is_empty() {
        let session = Session::new();
        assert_eq!(*session.status_snapshot(), "");
        assert!(session.screen_handle().is_none());
        assert!(session.roles().is_empty());
    }

    #[test]
    fn screen_claim_then_rejection() {
        let session = Session::new();
        let first = *session.try_claim(RoleRequest::Screen, &id("a"));
        assert_eq!(first, ClaimResult::Assigned(Role::Screen));
        let second = *session.try_claim(RoleRequest::Screen, &id("b"));
        assert_eq!(second, ClaimResult::Rejected(Rejection::NotScreen));
        assert_eq!(session.screen_handle(), Some(id("a")));
    }

    #[test]
    fn players_fill_in_order_then_reject() {
        let session = Session::new();
        assert_eq!(
            *session.try_claim(RoleRequest::Player, &id("b")),
            ClaimResult::Assigned(Role::Player1)
        );
        assert_eq!(
            *session.try_claim(RoleRequest::Player, &id("c")),
            ClaimResult::Assigned(Role::Player2)
        );
        assert_eq!(
            *session.try_claim(RoleRequest::Player, &id("d")),
            ClaimResult::Rejected(Rejection::NotPlayer)
        );
    }

    #[test]
    fn holder_cannot_take_second_slot() {
        let session = Session::new();
        let _ = *session.try_claim(RoleRequest::Player, &id("b"));
        assert_eq!(
            *session.try_claim(RoleRequest::Player, &id("b")),
            ClaimResult::Rejected(Rejection::NotPlayer)
        );
        assert_eq!(
            *session.try_claim(RoleRequest::Screen, &id("b")),
            ClaimResult::Rejected(Rejection::NotScreen)
        );
        assert_eq!(session.role_of(&id("b")), Some(Role::Player1));
        assert_eq!(session.roles(), vec![Role::Player1]);
    }

    #[test]
    fn release_without_role_is_noop() {
        let session = Session::new();
        let _ = *session.try_claim(RoleRequest::Screen, &id("a"));
        assert_eq!(*session.release(&id("spectator")), None);
        assert_eq!(session.screen_handle(), Some(id("a")));
    }

    #[test]
    fn release_is_idempotent() {
        let session = Session::new();
        let _ = *session.try_claim(RoleRequest::Player, &id("b"));
        assert_eq!(*session.release(&id("b")), Some(Role::Player1));
        assert_eq!(*session.release(&id("b")), None);
    }

    #[test]
    fn freed_slot_is_reusable_by_another_handle() {
        let session = Session::new();
        let _ = *session.try_claim(RoleRequest::Screen, &id("a"));
        assert_eq!(*session.release(&id("a")), Some(Role::Screen));
        assert_eq!(
            *session.try_claim(RoleRequest::Screen, &id("z")),
            ClaimResult::Assigned(Role::Screen)
        );
    }

    #[test]
    fn player1_refills_before_player2() {
        let session = Session::new();
        let _ = *session.try_claim(RoleRequest::Player, &id("b"));
        let _ = *session.try_claim(RoleRequest::Player, &id("c"));
        let _ = *session.release(&id("b"));
        assert_eq!(
            *session.try_claim(RoleRequest::Player, &id("d")),
            ClaimResult::Assigned(Role::Player1)
        );
    }

    #[test]
    fn snapshot_order_and_no_trailing_comma() {
        let session = Session::new();
        let _ = *session.try_claim(RoleRequest::Player, &id("b"));
        assert_eq!(*session.status_snapshot(), "player1");
        let _ = *session.try_claim(RoleRequest::Screen, &id("a"));
        assert_eq!(*session.status_snapshot(), "screen,player1");
        let _ = *session.try_claim(RoleRequest::Player, &id("c"));
        assert_eq!(*session.status_snapshot(), "screen,player1,player2");
        let _ = *session.release(&id("b"));
        assert_eq!(*session.status_snapshot(), "screen,player2");
    }

    #[test]
    fn concurrent_player_claims_split_the_slots() {
        for _ in 0..50 {
            let session = Arc::new(Session::new());
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = ["x", "y"]
                .into_iter()
                .map(|name| {
                    let session = Arc::clone(&session);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        let _ = barrier.wait();
                        *session.try_claim(RoleRequest::Player, &id(name))
                    })
                })
                .collect();
            let results: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let expected: HashSet<_> = [
                ClaimResult::Assigned(Role::Player1),
                ClaimResult::Assigned(Role::Player2),
            ]
            .into_iter()
            .collect();
            assert_eq!(results, expected);
        }
    }

    #[test]
    fn concurrent_claims_keep_slots_exclusive() {
        let session = Arc::new(Session::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    let me = id(&format!("c{i}"));
                    let request = if i % 2 == 0 {
                        RoleRequest::Screen
                    } else {
                        RoleRequest::Player
                    };
                    let won = *session.try_claim(request, &me);
                    (me, won)
                })
            })
            .collect();
        let winners: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter_map(|(me, result)| result.role().map(|role| (me, role)))
            .collect();

        assert_eq!(winners.len(), 3);
        let roles: HashSet<_> = winners.iter().map(|(_, role)| *role).collect();
        assert_eq!(roles.len(), 3);
        let holders: HashSet<_> = winners.iter().map(|(me, _)| me.clone()).collect();
        assert_eq!(holders.len(), 3);
        for (me, role) in &winners {
            assert_eq!(session.role_of(me), Some(*role));
        }
    }

    #[test]
    fn snapshot_never_lists_a_role_twice() {
        let session = Arc::new(Session::new());
        let writer = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..500 {
                    let me = id(&format!("w{i}"));
                    let _ = *session.try_claim(RoleRequest::Player, &me);
                    let _ = *session.try_claim(RoleRequest::Screen, &me);
                    let _ = *session.release(&me);
                }
            })
        };
        for _ in 0..500 {
            let snapshot = session.status_snapshot().outcome().clone();
            let parts: Vec<_> = snapshot.split(',').filter(|p| !p.is_empty()).collect();
            let unique: HashSet<_> = parts.iter().collect();
            assert_eq!(parts.len(), unique.len(), "duplicate in {snapshot:?}");
            assert!(!snapshot.ends_with(','));
            for part in parts {
                assert!(part.parse::<Role>().is_ok(), "bad role {part:?}");
            }
        }
        writer.join().unwrap();
    }
}
