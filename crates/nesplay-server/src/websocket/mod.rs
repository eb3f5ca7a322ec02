//! WebSocket connection management, heartbeat and fan-out.

pub mod broadcast;
pub mod connection;
pub mod session;
