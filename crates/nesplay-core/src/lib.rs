//! # nesplay-core
//!
//! Session role coordinator and message relay for the nesplay server.
//!
//! - [`ids::ConnectionId`]: opaque identity of one live client connection
//! - [`command::Command`]: `{"cmd", "data"}` wire codec
//! - [`role`]: the three session roles and claim outcomes
//! - [`session::Session`]: the shared role registry (claim / release / snapshot)
//! - [`dispatcher::RelayDispatcher`]: per-event behavior on top of a [`dispatcher::FanOut`]
//!
//! The crate knows nothing about sockets. The transport registers each
//! connection with its fan-out, then drives the dispatcher with connect,
//! message and disconnect events.

#![deny(unsafe_code)]

pub mod command;
pub mod dispatcher;
pub mod errors;
pub mod ids;
pub mod role;
pub mod session;

pub use command::{Command, Inbound, KeyAction};
pub use dispatcher::{ConnectionState, FanOut, Handled, RelayDispatcher};
pub use errors::DecodeError;
pub use ids::ConnectionId;
pub use role::{ClaimResult, Rejection, Role, RoleRequest};
pub use session::{Ordered, Session};
