//! Operator cancellation.
//!
//! The signal listener is installed once, before the sweep starts, so an
//! interrupt that lands during a tool run, a storage command or a retry
//! wait all end the sweep the same way: with [`SweepError::Interrupted`].

use std::future::Future;
use tokio::sync::watch;

use crate::error::{Result, SweepError};

/// Trips the [`Cancellation`] it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Cancellation { rx })
    }

    /// A cancellation nothing can trip.
    pub fn never() -> Self {
        Self::new().1
    }

    /// Tripped by the first SIGINT (Ctrl-C) or, on unix, SIGTERM.
    ///
    /// Must be called from inside the runtime. The handlers are registered
    /// before this returns.
    pub fn on_shutdown_signal() -> Result<Self> {
        let (handle, cancel) = Self::new();
        let signal = shutdown_signal().map_err(SweepError::SignalHandler)?;
        tokio::spawn(async move {
            let name = signal.await;
            tracing::warn!("{} received, stopping the sweep", name);
            handle.cancel();
        });
        Ok(cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; never resolves if the handle is gone unused.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Drive `fut` to completion unless cancellation comes first.
    ///
    /// The future is dropped on cancellation; a child process owned by it is
    /// killed with it.
    pub async fn guard<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let interrupted = || SweepError::Interrupted {
            operation: operation.to_string(),
        };
        if self.is_cancelled() {
            return Err(interrupted());
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => {
                tracing::warn!("Interrupted during {}", operation);
                Err(interrupted())
            }
            result = fut => result,
        }
    }
}

#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => "Ctrl-C",
            _ = terminate.recv() => "SIGTERM",
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl-C listener failed: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_passes_results_through() {
        let cancel = Cancellation::never();
        let value = cancel.guard("mkdir", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = cancel
            .guard::<(), _>("mkdir", async {
                Err(SweepError::Config("bad".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::Config(_)));
    }

    #[tokio::test]
    async fn test_cancel_stops_a_pending_operation() {
        let (handle, cancel) = Cancellation::new();
        let (result, ()) = tokio::join!(
            cancel.guard("upload", std::future::pending::<Result<()>>()),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                handle.cancel();
            }
        );
        let err = result.unwrap_err();
        assert!(matches!(err, SweepError::Interrupted { ref operation } if operation == "upload"));
        assert_eq!(err.exit_code(), 130);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_the_operation() {
        let (handle, cancel) = Cancellation::new();
        handle.cancel();
        drop(handle);
        assert!(cancel.is_cancelled());

        let started = std::cell::Cell::new(false);
        let result = cancel
            .guard("tool", async {
                started.set(true);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(SweepError::Interrupted { .. })));
        assert!(!started.get());
    }

    #[tokio::test]
    async fn test_never_stays_pending() {
        let cancel = Cancellation::never();
        let waited = tokio::time::timeout(Duration::from_millis(20), cancel.cancelled()).await;
        assert!(waited.is_err());
        assert!(!cancel.is_cancelled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigint_trips_cancellation_and_keeps_process_alive() {
        let cancel = Cancellation::on_shutdown_signal().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-INT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let tripped = tokio::time::timeout(Duration::from_secs(5), cancel.cancelled()).await;
        assert!(tripped.is_ok());
        assert!(cancel.is_cancelled());
    }
}
