//! # nesplay-server
//!
//! Axum HTTP + `WebSocket` front end for the nesplay relay.
//!
//! - `/ws`: one task pair per client (reader + heartbeat writer) driving a
//!   [`nesplay_core::RelayDispatcher`] over the [`BroadcastManager`] fan-out
//! - `/romlist`, `/roms/*`: ROM directory listing and downloads
//! - `/`, `/public/*`: bundled browser client, or an assets directory that
//!   also provides `/jsnes/*`
//! - `/health`, `/metrics`: liveness and Prometheus exposition
//! - Graceful shutdown via [`ShutdownCoordinator`]

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod roms;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ServerError;
pub use roms::{RomEntry, RomLibrary};
pub use server::{AppState, NesplayServer};
pub use shutdown::ShutdownCoordinator;
pub use websocket::broadcast::BroadcastManager;
