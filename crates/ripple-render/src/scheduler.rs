#![forbid(unsafe_code)]

//! Single-threaded executor for async and streaming components.
//!
//! Tasks run on a [`LocalPool`] owned by the engine. The host drives it with
//! [`Scheduler::run_until_stalled`]; nothing is polled on a background thread.
//! Every task is wrapped in [`Abortable`], and the engine aborts it when the
//! subtree that spawned it is disposed.
//!
//! # Failure Modes
//!
//! - **Re-entrant drive**: calling `run_until_stalled` from inside a task
//!   panics (the pool is already borrowed).

use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{AbortHandle, Abortable};
use futures::task::LocalSpawnExt;

pub struct Scheduler {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool: RefCell::new(pool),
            spawner,
        }
    }

    /// Spawn `fut`, returning the handle that cancels it.
    ///
    /// `None` when the pool can no longer accept tasks.
    pub fn spawn_abortable(&self, fut: impl Future<Output = ()> + 'static) -> Option<AbortHandle> {
        let (handle, registration) = AbortHandle::new_pair();
        let task = Abortable::new(fut, registration).map(|_| ());
        match self.spawner.spawn_local(task) {
            Ok(()) => Some(handle),
            Err(err) => {
                tracing::error!(error = %err, "failed to spawn component task");
                None
            }
        }
    }

    /// Poll every task until none can make progress.
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    #[must_use]
    pub fn spawner(&self) -> LocalSpawner {
        self.spawner.clone()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn spawned_task_runs_when_driven() {
        let sched = Scheduler::new();
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let _handle = sched.spawn_abortable(async move { d.set(true) });
        assert!(!done.get());
        sched.run_until_stalled();
        assert!(done.get());
    }

    #[test]
    fn aborted_task_never_completes() {
        let sched = Scheduler::new();
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let handle = sched
            .spawn_abortable(async move { d.set(true) })
            .expect("pool alive");
        handle.abort();
        sched.run_until_stalled();
        assert!(!done.get());
    }
}
