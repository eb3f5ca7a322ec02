//! Listener settings.

use std::fmt::Display;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Accepted `maxConnections`.
pub const MAX_CONNECTIONS_RANGE: RangeInclusive<usize> = 1..=10_000;
/// Accepted heartbeat interval and timeout, in seconds.
pub const HEARTBEAT_SECS_RANGE: RangeInclusive<u64> = 1..=3600;
/// Accepted `maxMessageSize`, in bytes.
pub const MAX_MESSAGE_SIZE_RANGE: RangeInclusive<usize> = 1024..=16 * 1024 * 1024;
/// Accepted `sendQueueCapacity`.
pub const SEND_QUEUE_RANGE: RangeInclusive<usize> = 1..=65_536;

/// HTTP and WebSocket listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Upgrades beyond this many open WebSocket connections get a 503.
    pub max_connections: usize,
    /// Seconds between pings sent to each client.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a client is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted WebSocket frame, in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_connections: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
        }
    }
}

impl ServerSettings {
    /// Pull numeric limits back into their accepted ranges.
    ///
    /// Applied after the file and env layers so a stray `0` cannot refuse
    /// every upgrade or every frame.
    pub fn clamp_limits(&mut self) {
        clamp("maxConnections", &mut self.max_connections, &MAX_CONNECTIONS_RANGE);
        clamp(
            "heartbeatIntervalSecs",
            &mut self.heartbeat_interval_secs,
            &HEARTBEAT_SECS_RANGE,
        );
        clamp(
            "heartbeatTimeoutSecs",
            &mut self.heartbeat_timeout_secs,
            &HEARTBEAT_SECS_RANGE,
        );
        clamp("maxMessageSize", &mut self.max_message_size, &MAX_MESSAGE_SIZE_RANGE);
        clamp("sendQueueCapacity", &mut self.send_queue_capacity, &SEND_QUEUE_RANGE);
    }
}

fn clamp<T>(key: &str, value: &mut T, range: &RangeInclusive<T>)
where
    T: Copy + PartialOrd + Display,
{
    let bound = if *value < *range.start() {
        *range.start()
    } else if *value > *range.end() {
        *range.end()
    } else {
        return;
    };
    warn!(key, from = %value, to = %bound, "setting out of range, clamped");
    *value = bound;
}
