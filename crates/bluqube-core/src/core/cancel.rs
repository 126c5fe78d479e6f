// crates/bluqube-core/src/core/cancel.rs
// ============================================================================
// Module: BluQube Cancellation
// Description: Cooperative cancellation signal for dispatches.
// Purpose: Let callers abort in-flight work at any stage.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! A [`CancelSignal`] is a cloneable flag backed by a `tokio::sync::watch`
//! channel. Clones observe the same state. Once cancelled it stays
//! cancelled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

// ============================================================================
// SECTION: Cancel Signal
// ============================================================================

/// Shared cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    /// Broadcast flag; `true` once cancelled.
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Creates an uncancelled signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signals cancellation to every clone.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns true once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender lives as long as self, so this branch never resolves.
            std::future::pending::<()>().await;
        }
    }

    /// Cancels after `timeout` elapses. Requires a running tokio runtime.
    pub fn cancel_after(&self, timeout: Duration) {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            signal.cancel();
        });
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
