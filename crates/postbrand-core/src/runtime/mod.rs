//! Task supervisor for the background worker pools and periodic ticks.
//!
//! Submodules:
//! - [`scheduler`]: Loop scheduler with configurable interval and jitter.

pub mod scheduler;

pub use scheduler::{scheduler_from_config, LoopScheduler};

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Task supervisor that manages concurrent background task lifecycles.
///
/// The runtime owns a `CancellationToken` shared by all spawned tasks
/// and collects their `JoinHandle`s for graceful shutdown. It does not
/// own specific business dependencies -- those are passed when spawning
/// individual tasks.
pub struct Runtime {
    cancel: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
    shutdown_grace: Duration,
}

impl Runtime {
    /// Create a new runtime with a fresh cancellation token and the given
    /// shutdown grace period.
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: Vec::new(),
            shutdown_grace,
        }
    }

    /// Return a clone of the cancellation token for passing to tasks.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn a background task with a descriptive name.
    ///
    /// The task's `JoinHandle` is tracked for shutdown. The task should
    /// check `CancellationToken::is_cancelled()` in its loop to exit
    /// gracefully when shutdown is initiated.
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        tracing::info!(task = %name, "spawning background task");
        let handle = tokio::spawn(future);
        self.handles.push((name, handle));
    }

    /// Return the number of spawned tasks.
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Initiate graceful shutdown.
    ///
    /// 1. Cancels the token, signaling all tasks to stop.
    /// 2. Awaits all `JoinHandle`s up to the configured grace period.
    /// 3. If the grace period is exceeded, logs a warning (caller decides whether to force-exit).
    pub async fn shutdown(&mut self) {
        tracing::info!("initiating graceful shutdown");
        self.cancel.cancel();

        let handles: Vec<_> = self.handles.drain(..).collect();

        let shutdown = async {
            for (name, handle) in handles {
                match handle.await {
                    Ok(()) => tracing::info!(task = %name, "task completed cleanly"),
                    Err(e) => {
                        tracing::warn!(task = %name, error = %e, "task panicked during shutdown")
                    }
                }
            }
        };

        if tokio::time::timeout(self.shutdown_grace, shutdown)
            .await
            .is_err()
        {
            tracing::warn!(
                grace_secs = self.shutdown_grace.as_secs(),
                "shutdown grace period exceeded, some tasks may still be running"
            );
        } else {
            tracing::info!("graceful shutdown complete");
        }
    }

    /// Block until a shutdown signal is received, then gracefully stop all tasks.
    pub async fn run_until_shutdown(mut self) {
        wait_for_shutdown_signal().await;
        self.shutdown().await;
    }
}

/// Wait for an OS shutdown signal (Ctrl+C or SIGTERM).
///
/// On Unix, listens for both Ctrl+C and SIGTERM. On Windows, listens
/// for Ctrl+C only (SIGTERM is not available).
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to register SIGTERM handler, using Ctrl+C only"
                );
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for Ctrl+C");
                } else {
                    tracing::info!("received Ctrl+C");
                }
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Ctrl+C handler error");
                }
                tracing::info!("received Ctrl+C");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
        } else {
            tracing::info!("received Ctrl+C");
        }
    }
}
