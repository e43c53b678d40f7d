//! Shutdown signal coordination.
//!
//! The first SIGINT or SIGTERM cancels the process-wide
//! [`CancellationToken`], which lets the service drain and stop. A second
//! signal while draining terminates the process immediately.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Exit status used when a second signal forces termination.
pub const FORCED_EXIT_CODE: i32 = 1;

/// Termination signals the coordinator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// Two-stage shutdown state machine: active, then cancelled.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled on the first signal.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Consume signals until the second one arrives.
    ///
    /// Returns the signal that asked for immediate termination, or `None`
    /// if the signal source closed first.
    pub async fn run(self, mut signals: mpsc::Receiver<Signal>) -> Option<Signal> {
        let first = signals.recv().await?;
        warn!(signal = ?first, "Received signal, shutting down gracefully");
        self.token.cancel();

        let second = signals.recv().await?;
        error!(signal = ?second, "Received second signal, terminating immediately");
        Some(second)
    }
}

/// Hook SIGINT/SIGTERM and return the shutdown token.
///
/// A second signal exits the process with [`FORCED_EXIT_CODE`]. Must be
/// called from within a Tokio runtime.
pub fn install() -> std::io::Result<CancellationToken> {
    let signals = os_signals()?;
    let coordinator = ShutdownCoordinator::new();
    let token = coordinator.token();

    tokio::spawn(async move {
        if coordinator.run(signals).await.is_some() {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    Ok(token)
}

#[cfg(unix)]
fn os_signals() -> std::io::Result<mpsc::Receiver<Signal>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = mpsc::channel(2);

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => Signal::Interrupt,
                Some(()) = terminate.recv() => Signal::Terminate,
                else => break,
            };
            if tx.send(received).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
fn os_signals() -> std::io::Result<mpsc::Receiver<Signal>> {
    let (tx, rx) = mpsc::channel(2);

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(Signal::Interrupt).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
