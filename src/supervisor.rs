//! Supervisor for long-running blocking operations (the rename workflow).
//!
//! Work is pushed onto tokio's blocking pool and observed by cooperative
//! polling, so the caller never blocks on a join and no particular UI event
//! model is assumed. There is no cancellation: the underlying tool
//! operations are not safely interruptible, so a submitted task always runs
//! to completion even if the handle is dropped.

use std::sync::{Arc, Mutex};

/// Status reported by [`TaskHandle::poll`].
#[derive(Debug)]
pub enum TaskStatus<T> {
    Pending,
    /// The task finished; the result is yielded exactly once.
    Finished(T),
}

enum Slot<T> {
    Pending,
    Done(T),
    Taken,
}

pub struct TaskHandle<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> TaskHandle<T> {
    /// Non-blocking completion check. The first poll after completion
    /// yields the result; later polls report `Pending` forever, so callers
    /// must act on the yielded value.
    pub fn poll(&self) -> TaskStatus<T> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Done(value) => TaskStatus::Finished(value),
            other => {
                *slot = other;
                TaskStatus::Pending
            }
        }
    }
}

/// Runs `work` on the blocking pool and returns a pollable handle.
pub fn submit<T, F>(work: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Slot::Pending));
    let worker_slot = Arc::clone(&slot);
    tokio::task::spawn_blocking(move || {
        let value = work();
        let mut guard = worker_slot.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Slot::Done(value);
    });
    TaskHandle { slot }
}
