//! Shutdown signalling.
//!
//! The server stops for one of two reasons: the process receives SIGTERM or
//! Ctrl-C, or a handler returns [`Error::Shutdown`](crate::Error::Shutdown).
//! The second path runs through the channel built by [`channel`]: the
//! [`ShutdownSender`] goes into the [`App`](crate::App), the
//! [`ShutdownReceiver`] into [`Server::serve`](crate::Server::serve).
//!
//! The channel carries at most one signal for its whole life. Request tasks
//! never block on it; when several requests fail at once only the first one
//! gets through and the rest are no-ops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::error;

/// Why the server is shutting down.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signal {
    /// Ctrl-C / SIGINT.
    Interrupt,
    /// SIGTERM, or a handler that reported a condition the process cannot
    /// serve through.
    Terminate,
}

/// Creates a connected sender / receiver pair.
pub fn channel() -> (ShutdownSender, ShutdownReceiver) {
    let (tx, rx) = mpsc::channel(1);
    let sender = ShutdownSender { tx, fired: Arc::new(AtomicBool::new(false)) };
    (sender, ShutdownReceiver { rx })
}

/// Write side. Cheap to clone; every clone shares the same one-shot latch.
#[derive(Clone, Debug)]
pub struct ShutdownSender {
    tx: mpsc::Sender<Signal>,
    fired: Arc<AtomicBool>,
}

impl ShutdownSender {
    /// Sends `signal` unless a signal was already sent. Never blocks.
    ///
    /// Returns `true` only for the call that actually delivered a signal.
    pub fn signal(&self, signal: Signal) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Capacity 1 and a single winner: this can only fail when the
        // receiver is gone, in which case nobody is serving anyway.
        self.tx.try_send(signal).is_ok()
    }

    pub fn is_signalled(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Read side, owned by the server.
#[derive(Debug)]
pub struct ShutdownReceiver {
    rx: mpsc::Receiver<Signal>,
}

impl ShutdownReceiver {
    /// Waits for the signal. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }

    /// The signal, if one has already been sent.
    pub fn try_recv(&mut self) -> Option<Signal> {
        self.rx.try_recv().ok()
    }
}

/// Resolves on the first SIGINT / SIGTERM the process receives.
///
/// On Windows only Ctrl-C is available. If a handler cannot be installed the
/// failure is logged and that source is ignored.
pub(crate) async fn os_signal() -> Signal {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => Signal::Interrupt,
        () = sigterm => Signal::Terminate,
    }
}
