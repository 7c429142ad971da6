// src/chain/controller.rs

//! The task-chaining controller.
//!
//! Every submission runs the same short decision under the chain lock:
//!
//! - sequential: append a barrier whose continuation waits for the current
//!   last group, removes it, then runs the action;
//! - concurrent, last group is an open cohort: append a member that waits
//!   for the cohort's trigger, then runs the action;
//! - concurrent otherwise: append a new cohort whose first continuation
//!   waits for the current last group, removes it, releases the trigger,
//!   then runs the action.
//!
//! The continuations themselves are spawned on the bound Tokio runtime after
//! the lock is released. No caller action ever runs while the lock is held.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tracing::debug;

use crate::cancel::{CancelSignal, CancelSource};
use crate::chain::latch::Latch;
use crate::chain::state::{ChainState, GroupId, Predecessor};
use crate::chain::unit::{self, Action, UnitCompleter, UnitHandle, UnitState};
use crate::errors::{ChainError, Result};
use crate::types::SubmitMode;

/// State shared between the controller and its in-flight continuations.
#[derive(Debug)]
struct Shared {
    state: Mutex<ChainState>,
    shutdown: CancelSource,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ChainState> {
        // Plain bookkeeping; a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a drained group. A no-op after shutdown (already cleared).
    fn seal(&self, group: GroupId) {
        let mut state = self.lock();
        if state.is_shut_down() {
            return;
        }
        if state.remove(group) {
            debug!(group = %group, remaining = state.len(), "group drained and removed");
        }
    }
}

/// What the submission decided; spawned once the lock is released.
enum Scheduled {
    /// Wait for `previous`, remove it, optionally release `trigger`, run.
    Transition {
        previous: Predecessor,
        trigger: Option<Latch>,
    },
    /// Wait for the cohort trigger, run.
    Member { trigger: Latch },
}

/// Controller that chains sequential and concurrent actions.
///
/// Sequential actions run strictly after everything submitted before them.
/// Concurrent actions submitted back to back form a cohort: they all become
/// eligible at the same moment, once the preceding group has drained, and
/// the next sequential action waits for every one of them.
///
/// Submissions never fail. After [`TaskChain::shutdown`] they are accepted
/// and silently dropped: the returned handle is [`UnitState::Rejected`] and
/// the action never runs.
///
/// Dropping the controller shuts it down.
pub struct TaskChain {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl fmt::Debug for TaskChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskChain")
            .field("groups", &self.group_count())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl TaskChain {
    /// Bind a new controller to the current Tokio runtime.
    pub fn new() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| ChainError::NoRuntime)?;
        Ok(Self::with_handle(runtime))
    }

    /// Bind a new controller to an explicit runtime handle. Submissions may
    /// then come from any thread.
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ChainState::new()),
                shutdown: CancelSource::new(),
            }),
            runtime,
        }
    }

    /// Run `action` after everything submitted so far has finished.
    pub fn submit_sequential<F>(&self, action: F, cancel: CancelSignal) -> UnitHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(SubmitMode::Sequential, Action::blocking(action), cancel)
    }

    /// Run `action` as part of the current cohort, starting a new one if the
    /// last submission was sequential.
    pub fn submit_concurrent<F>(&self, action: F, cancel: CancelSignal) -> UnitHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(SubmitMode::Concurrent, Action::blocking(action), cancel)
    }

    /// Like [`TaskChain::submit_sequential`] for an async action.
    pub fn submit_sequential_async<Fut>(&self, action: Fut, cancel: CancelSignal) -> UnitHandle
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.submit(SubmitMode::Sequential, Action::future(action), cancel)
    }

    /// Like [`TaskChain::submit_concurrent`] for an async action.
    pub fn submit_concurrent_async<Fut>(&self, action: Fut, cancel: CancelSignal) -> UnitHandle
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.submit(SubmitMode::Concurrent, Action::future(action), cancel)
    }

    /// Submit with an explicit mode.
    pub fn submit(&self, mode: SubmitMode, action: Action, cancel: CancelSignal) -> UnitHandle {
        let mut state = self.shared.lock();

        let id = state.next_unit_id();
        if state.is_shut_down() {
            debug!(unit = %id, ?mode, "chain is shut down; dropping submission");
            return UnitHandle::resolved(id, UnitState::Rejected);
        }

        let (completer, handle) = unit::pending(id);

        let scheduled = match mode {
            SubmitMode::Sequential => {
                let previous = state.anchor();
                let group = state.push_barrier(handle.clone());
                debug!(unit = %id, group = %group, after = %previous.id, "appended barrier");
                Scheduled::Transition {
                    previous,
                    trigger: None,
                }
            }
            SubmitMode::Concurrent => match state.join_cohort(handle.clone()) {
                Some((group, trigger)) => {
                    debug!(unit = %id, group = %group, "joined open cohort");
                    Scheduled::Member { trigger }
                }
                None => {
                    let previous = state.anchor();
                    let trigger = Latch::new();
                    let group = state.push_cohort(trigger.clone(), handle.clone());
                    debug!(unit = %id, group = %group, after = %previous.id, "opened cohort");
                    Scheduled::Transition {
                        previous,
                        trigger: Some(trigger),
                    }
                }
            },
        };

        let cancel = cancel.linked_with(&self.shared.shutdown.signal());
        drop(state);

        let shared = Arc::clone(&self.shared);
        match scheduled {
            Scheduled::Transition { previous, trigger } => {
                self.runtime.spawn(run_transition(
                    shared, previous, trigger, action, cancel, completer,
                ));
            }
            Scheduled::Member { trigger } => {
                self.runtime
                    .spawn(run_member(shared, trigger, action, cancel, completer));
            }
        }

        handle
    }

    /// Stop the controller. Idempotent.
    ///
    /// Sets the shutdown flag, fires the controller-wide cancellation signal
    /// (cancelling every pending unit and aborting in-flight async actions)
    /// and forgets all groups. Pending units resolve as `Cancelled`.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        if !state.shut_down() {
            return;
        }
        self.shared.shutdown.cancel();
        debug!("task chain shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().is_shut_down()
    }

    /// Signal fired when the controller shuts down. Running actions can
    /// watch it to stop cooperatively.
    pub fn shutdown_signal(&self) -> CancelSignal {
        self.shared.shutdown.signal()
    }

    /// Number of groups currently tracked, including the already-drained
    /// group that the open group is anchored on.
    pub fn group_count(&self) -> usize {
        self.shared.lock().len()
    }
}

impl Drop for TaskChain {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Barrier continuation, or the first member of a new cohort.
async fn run_transition(
    shared: Arc<Shared>,
    previous: Predecessor,
    trigger: Option<Latch>,
    action: Action,
    cancel: CancelSignal,
    completer: UnitCompleter,
) {
    let shutdown = shared.shutdown.signal();
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            debug!(unit = %completer.id(), "shutdown while waiting for previous group");
            completer.finish(UnitState::Cancelled);
            return;
        }
        _ = previous.drained() => {}
    }

    shared.seal(previous.id);
    if let Some(trigger) = trigger {
        trigger.release();
    }

    execute(action, &cancel, completer).await;
}

/// Cohort member: waits for the shared trigger.
async fn run_member(
    shared: Arc<Shared>,
    trigger: Latch,
    action: Action,
    cancel: CancelSignal,
    completer: UnitCompleter,
) {
    let shutdown = shared.shutdown.signal();
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            debug!(unit = %completer.id(), "shutdown while waiting for cohort trigger");
            completer.finish(UnitState::Cancelled);
            return;
        }
        _ = trigger.wait() => {}
    }

    execute(action, &cancel, completer).await;
}

/// Run the action unless the combined signal already fired.
async fn execute(action: Action, cancel: &CancelSignal, completer: UnitCompleter) {
    let id = completer.id();
    if cancel.is_cancelled() {
        debug!(unit = %id, "cancelled before start; skipping action");
        completer.finish(UnitState::Cancelled);
        return;
    }

    completer.start();
    let outcome = action.invoke(id, cancel).await;
    debug!(unit = %id, ?outcome, "unit finished");
    completer.finish(outcome);
}
