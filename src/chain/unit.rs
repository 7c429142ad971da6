// src/chain/unit.rs

//! Scheduled units and their completion handles.

use std::fmt;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;
use tracing::warn;

use crate::cancel::CancelSignal;

/// Identifier of a unit, unique per chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub(crate) u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Lifecycle of a single unit.
///
/// - `Pending`: waiting on its predecessor group or cohort trigger.
/// - `Running`: the action is executing.
/// - `Completed`: the action returned.
/// - `Faulted`: the action panicked.
/// - `Cancelled`: the combined cancellation signal fired before the action
///   started, or while an async action was in flight.
/// - `Rejected`: submitted after shutdown; never scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Running,
    Completed,
    Faulted,
    Cancelled,
    Rejected,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, UnitState::Pending | UnitState::Running)
    }
}

/// Cloneable, observe-only handle to a unit's completion state.
#[derive(Debug, Clone)]
pub struct UnitHandle {
    id: UnitId,
    rx: watch::Receiver<UnitState>,
}

impl UnitHandle {
    /// A handle that is already in a terminal state.
    pub(crate) fn resolved(id: UnitId, state: UnitState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { id, rx }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Current state without waiting.
    pub fn state(&self) -> UnitState {
        *self.rx.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Wait until the unit reaches a terminal state and return it.
    ///
    /// A unit whose driver disappeared without resolving (e.g. the runtime
    /// was shut down underneath it) is reported as `Cancelled`.
    pub async fn wait(&self) -> UnitState {
        let mut rx = self.rx.clone();
        let res = rx.wait_for(|state| state.is_terminal()).await.map(|state| *state);
        match res {
            Ok(state) => state,
            Err(_) => {
                let last = *rx.borrow();
                if last.is_terminal() {
                    last
                } else {
                    UnitState::Cancelled
                }
            }
        }
    }
}

/// Writing half of a unit, held by the task that drives it.
#[derive(Debug)]
pub(crate) struct UnitCompleter {
    id: UnitId,
    tx: watch::Sender<UnitState>,
}

impl UnitCompleter {
    pub(crate) fn id(&self) -> UnitId {
        self.id
    }

    pub(crate) fn start(&self) {
        self.tx.send_replace(UnitState::Running);
    }

    pub(crate) fn finish(self, state: UnitState) {
        self.tx.send_replace(state);
    }
}

/// Create a pending unit: the completer drives it, the handle observes it.
pub(crate) fn pending(id: UnitId) -> (UnitCompleter, UnitHandle) {
    let (tx, rx) = watch::channel(UnitState::Pending);
    (UnitCompleter { id, tx }, UnitHandle { id, rx })
}

/// A caller-supplied action.
pub enum Action {
    /// Runs on the blocking thread pool.
    Blocking(Box<dyn FnOnce() + Send + 'static>),
    /// Runs as its own task; dropped if cancelled while in flight.
    Async(BoxFuture<'static, ()>),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Blocking(_) => f.write_str("Action::Blocking"),
            Action::Async(_) => f.write_str("Action::Async"),
        }
    }
}

impl Action {
    pub fn blocking<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Action::Blocking(Box::new(f))
    }

    pub fn future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Action::Async(fut.boxed())
    }

    /// Run the action to completion and map the result to a terminal state.
    ///
    /// Panics surface as `Faulted`. Async actions are aborted when `cancel`
    /// fires mid-flight; blocking actions cannot be interrupted and always
    /// run to completion once started.
    pub(crate) async fn invoke(self, unit: UnitId, cancel: &CancelSignal) -> UnitState {
        let joined = match self {
            Action::Blocking(f) => tokio::task::spawn_blocking(f).await,
            Action::Async(fut) => {
                let mut task = tokio::spawn(fut);
                tokio::select! {
                    res = &mut task => res,
                    _ = cancel.cancelled() => {
                        task.abort();
                        task.await
                    }
                }
            }
        };

        match joined {
            Ok(()) => UnitState::Completed,
            Err(err) if err.is_panic() => {
                warn!(unit = %unit, "action panicked; unit faulted");
                UnitState::Faulted
            }
            Err(_) => UnitState::Cancelled,
        }
    }
}
