//! Cancellation propagated into registry calls.
//!
//! A [`CancelToken`] is handed to every population, start and complete call
//! and forwarded untouched to the bucket, which aborts in-flight registry work
//! once the token is tripped.
//!
//! Interrupt handling:
//! - First SIGINT/SIGTERM: trip the token, let running builds finish
//! - Second signal: exit immediately with [`EXIT_CODE_CANCELLED`]

use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code for cancelled runs
pub const EXIT_CODE_CANCELLED: i32 = 80;

/// Error reported when an operation stops because of cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    signal_count: AtomicU8,
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation has been requested
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Record an interrupt and decide what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.state.signal_count.fetch_add(1, Ordering::SeqCst);
        match count {
            0 => {
                self.cancel();
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: cancel and let in-flight calls wind down
    InitiateCancellation,
    /// Second signal: exit now
    ImmediateExit,
    /// Third+ signal
    Ignore,
}

/// Install a SIGINT/SIGTERM handler that trips `token`.
///
/// Must be called at most once per process.
pub fn install_interrupt_handler(token: CancelToken) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || match token.handle_signal() {
        SignalAction::InitiateCancellation => {
            tracing::warn!("Received interrupt signal, cancelling registry operations");
        }
        SignalAction::ImmediateExit => {
            tracing::warn!("Received second interrupt, exiting immediately");
            std::process::exit(EXIT_CODE_CANCELLED);
        }
        SignalAction::Ignore => {}
    })
}

/// Whether `err`, or anything in its source chain, is a [`Cancelled`]
pub fn is_cancellation(err: &(dyn Error + 'static)) -> bool {
    let mut current: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.is::<Cancelled>() {
            return true;
        }
        current = e.source();
    }
    false
}
