// src/cancel.rs

//! Cancellation sources and signals.
//!
//! A [`CancelSource`] owns a cancellation flag; a [`CancelSignal`] observes
//! one or more flags. Signals can be linked so that firing *any* of the
//! underlying sources cancels the combined signal. The chain links every
//! per-submission signal with its own shutdown source this way.

use std::sync::Arc;

use futures::future::{select_all, BoxFuture, FutureExt};
use tokio::sync::watch;

/// Owning half of a cancellation flag.
///
/// Cloning a source yields another handle to the same flag.
#[derive(Debug, Clone)]
pub struct CancelSource {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the flag. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A signal observing this source only.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            sources: vec![self.tx.subscribe()],
        }
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing half of one or more cancellation flags.
///
/// A signal is cancelled as soon as any of its sources has fired. A signal
/// whose source was dropped without firing simply never cancels.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    sources: Vec<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that is never cancelled.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.sources.iter().any(|rx| *rx.borrow())
    }

    /// Combine two signals: the result is cancelled when either is.
    pub fn linked_with(&self, other: &CancelSignal) -> CancelSignal {
        let mut sources = self.sources.clone();
        sources.extend(other.sources.iter().cloned());
        CancelSignal { sources }
    }

    /// Resolve once any underlying source fires.
    ///
    /// Never resolves for [`CancelSignal::none`].
    pub async fn cancelled(&self) {
        if self.sources.is_empty() {
            return std::future::pending().await;
        }

        let waits: Vec<BoxFuture<'static, ()>> = self
            .sources
            .iter()
            .cloned()
            .map(|mut rx| {
                async move {
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        // Source dropped without firing.
                        std::future::pending::<()>().await;
                    }
                }
                .boxed()
            })
            .collect();

        select_all(waits).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn none_is_never_cancelled() {
        let signal = CancelSignal::none();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn linked_signal_fires_when_either_source_fires() {
        let a = CancelSource::new();
        let b = CancelSource::new();
        let linked = a.signal().linked_with(&b.signal());

        assert!(!linked.is_cancelled());
        b.cancel();
        assert!(linked.is_cancelled());
        assert!(!a.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let source = CancelSource::new();
        source.cancel();
        source.cancel();
        assert!(source.is_cancelled());
        assert!(source.signal().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_fire() {
        let source = CancelSource::new();
        let signal = source.signal().linked_with(&CancelSignal::none());

        let waiter = tokio::spawn(async move { signal.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        source.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("signal did not resolve")
            .expect("waiter panicked");
    }

    #[tokio::test]
    async fn dropped_source_never_cancels() {
        let source = CancelSource::new();
        let signal = source.signal();
        drop(source);

        let res = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(res.is_err());
        assert!(!signal.is_cancelled());
    }
}
