//! Cancellable background jobs
//!
//! Admin-triggered distributions run in the background: the caller gets an
//! immediate acknowledgement while the batch continues. [`BackgroundJob`]
//! pairs the task handle with a cancellation signal so an operator can stop
//! a long-running batch between transfers.

use crate::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Sending side of a job cancellation signal
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        // Receivers may already be gone if the job finished
        let _ = self.tx.send(true);
    }
}

/// Receiving side of a job cancellation signal, checked inside the job
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    // Keeps a detached token's sender alive so `changed` never errors
    _keepalive: Option<std::sync::Arc<watch::Sender<bool>>>,
}

impl CancelToken {
    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancellation is requested
    pub async fn cancelled(&mut self) {
        // An Err means the sender dropped without cancelling; park forever
        // and let the job finish on its own.
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// A token that is never cancelled
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(std::sync::Arc::new(tx)),
        }
    }
}

/// Create a linked cancel handle/token pair
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        CancelToken {
            rx,
            _keepalive: None,
        },
    )
}

/// A spawned batch with its cancellation handle
pub struct BackgroundJob<T> {
    handle: JoinHandle<Result<T>>,
    cancel: CancelHandle,
}

impl<T> BackgroundJob<T> {
    /// Wrap a spawned task and its cancel handle
    pub fn new(handle: JoinHandle<Result<T>>, cancel: CancelHandle) -> Self {
        Self { handle, cancel }
    }

    /// Request cancellation of the running job
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the job to finish
    pub async fn join(self) -> Result<T> {
        self.handle
            .await
            .map_err(|e| crate::Error::ExternalService(format!("Background job panicked: {e}")))?
    }
}
