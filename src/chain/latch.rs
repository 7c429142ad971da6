// src/chain/latch.rs

//! One-shot release latch used as a cohort's trigger.
//!
//! The latch is created unreleased; [`Latch::release`] is separate from
//! construction so the chain can hand the latch to member units before the
//! previous group has drained. Waiting is a subscription, so members that
//! start waiting after the release resolve immediately.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Latch {
    tx: Arc<watch::Sender<bool>>,
}

impl Latch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn release(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_released(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the latch is released.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // `self` keeps the sender alive, so this cannot observe a closed channel.
        let _ = rx.wait_for(|released| *released).await;
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}
