//! Shutdown of the listener and the WebSocket sessions it spawned.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Stops the HTTP listener and every client session.
///
/// Sessions are wrapped with [`ShutdownCoordinator::track_session`] so
/// [`ShutdownCoordinator::graceful_shutdown`] can wait for them to release
/// their roles and announce the `part`.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not fired yet.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: TaskTracker::new(),
        }
    }

    /// A token that is cancelled on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a client session so shutdown waits for it.
    pub fn track_session<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Sessions that have not finished yet.
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Fire the shutdown signal. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal shutdown, then wait up to `timeout` for `handles` (the serving
    /// task) and every tracked session to finish.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        self.sessions.close();
        info!(
            sessions = self.sessions.len(),
            timeout_secs = timeout.as_secs(),
            "draining client sessions"
        );

        let drain = async {
            let _ = futures::future::join_all(handles).await;
            self.sessions.wait().await;
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                sessions = self.sessions.len(),
                "shutdown timed out after {timeout:?} with sessions still open"
            );
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn shutdown_cancels_all_tokens() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        assert!(!coord.is_shutting_down());
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    #[tokio::test]
    async fn graceful_shutdown_waits_for_sessions_to_release() {
        let coord = ShutdownCoordinator::new();
        let released = Arc::new(AtomicBool::new(false));

        let token = coord.token();
        let flag = Arc::clone(&released);
        let session = coord.track_session(async move {
            token.cancelled().await;
            tokio::task::yield_now().await;
            flag.store(true, Ordering::SeqCst);
        });
        let _ = tokio::spawn(session);
        assert_eq!(coord.open_sessions(), 1);

        coord
            .graceful_shutdown(Vec::new(), Some(Duration::from_secs(5)))
            .await;
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(coord.open_sessions(), 0);
    }

    #[tokio::test]
    async fn graceful_shutdown_waits_for_the_serving_task() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let server = tokio::spawn(async move { token.cancelled().await });

        coord
            .graceful_shutdown(vec![server], Some(Duration::from_secs(5)))
            .await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_gives_up_on_a_stuck_session() {
        let coord = ShutdownCoordinator::new();
        let _ = tokio::spawn(coord.track_session(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));

        let started = tokio::time::Instant::now();
        coord
            .graceful_shutdown(Vec::new(), Some(Duration::from_millis(100)))
            .await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(coord.open_sessions(), 1);
    }
}
