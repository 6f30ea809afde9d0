//! One-shot result cell bridging a push-style callback into a pollable,
//! cancelable deferred-result handle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use duorpc_common::CallError;

/// Push-style consumer of a request outcome. Invoked at most once, from the
/// proxy's reader task (or its send path on a send failure).
pub type Callback = Box<dyn FnOnce(Result<i64, CallError>) + Send + 'static>;

#[derive(Debug, Clone)]
enum CellState {
    Pending,
    Resolved(i64),
    Failed(CallError),
    Canceled,
}

/// The shared one-shot state cell.
///
/// Transitions out of `Pending` happen exactly once; any transition
/// attempted on a terminal cell is a no-op. Waiters are woken through a
/// [`Notify`] rather than a polling loop.
struct ResultCell {
    state: Mutex<CellState>,
    notify: Notify,
}

impl ResultCell {
    fn new() -> Self {
        Self {
            state: Mutex::new(CellState::Pending),
            notify: Notify::new(),
        }
    }

    /// Moves `Pending` into `next`; returns whether the transition happened.
    fn transition(&self, next: CellState) -> bool {
        let mut state = self.state.lock().expect("result cell lock poisoned");
        if !matches!(*state, CellState::Pending) {
            return false;
        }
        *state = next;
        drop(state);
        self.notify.notify_waiters();
        true
    }

    fn resolve(&self, value: i64) {
        self.transition(CellState::Resolved(value));
    }

    fn fail(&self, error: CallError) {
        self.transition(CellState::Failed(error));
    }

    fn cancel(&self) {
        self.transition(CellState::Canceled);
    }

    /// Snapshot of the terminal outcome, `None` while pending.
    fn terminal(&self) -> Option<Result<i64, CallError>> {
        match &*self.state.lock().expect("result cell lock poisoned") {
            CellState::Pending => None,
            CellState::Resolved(value) => Some(Ok(*value)),
            CellState::Failed(error) => Some(Err(error.clone())),
            CellState::Canceled => Some(Err(CallError::Canceled)),
        }
    }

    fn is_done(&self) -> bool {
        self.terminal().is_some()
    }

    async fn wait(&self) -> Result<i64, CallError> {
        loop {
            // Arm the notification before checking state, so a transition
            // between the check and the await still wakes us.
            let notified = self.notify.notified();
            if let Some(outcome) = self.terminal() {
                return outcome;
            }
            notified.await;
        }
    }
}

/// Pull-style deferred-result handle for one outstanding request.
///
/// Cloning yields another view of the same underlying cell.
#[derive(Clone)]
pub struct ResultHandle {
    cell: Arc<ResultCell>,
}

impl ResultHandle {
    /// Creates a fresh pending handle together with the push-side callback
    /// that resolves or fails it. Both adapters share the same one-shot
    /// cell.
    pub fn new() -> (Self, Callback) {
        let cell = Arc::new(ResultCell::new());
        let push = Arc::clone(&cell);
        let callback: Callback = Box::new(move |outcome| match outcome {
            Ok(value) => push.resolve(value),
            Err(error) => push.fail(error),
        });
        (Self { cell }, callback)
    }

    /// True once the cell is resolved, failed, or canceled.
    pub fn is_done(&self) -> bool {
        self.cell.is_done()
    }

    /// Cancels the handle locally. A later `get` fails with
    /// [`CallError::Canceled`] even if the real reply arrives afterwards;
    /// the in-flight network request is not retracted. No-op once the cell
    /// is already terminal.
    pub fn cancel(&self) {
        self.cell.cancel();
    }

    /// Waits until the cell is terminal and returns the value or the stored
    /// error. May be called repeatedly.
    pub async fn get(&self) -> Result<i64, CallError> {
        self.cell.wait().await
    }

    /// Like [`get`](Self::get) but bounded. An elapsed timeout fails with
    /// [`CallError::Timeout`] without resolving the cell; the request stays
    /// pending and a later `get` can still succeed.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<i64, CallError> {
        match tokio::time::timeout(timeout, self.cell.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallError::Timeout(timeout)),
        }
    }
}
