//! Cancellable background timers.
//!
//! Every timer owned by the session manager or the media controller is a
//! [`ScheduledTask`]; dropping it aborts the underlying tokio task.

use std::{future::Future, ops::ControlFlow, time::Duration};

use parking_lot::Mutex;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

pub struct ScheduledTask {
    label: &'static str,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn spawn<F>(label: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            label,
            handle: tokio::spawn(future),
        }
    }

    /// Run `future` once after `delay`.
    pub fn after<F>(label: &'static str, delay: Duration, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        log::trace!("[Scheduler] {label} armed for {delay:?}");
        Self::spawn(label, async move {
            tokio::time::sleep(delay).await;
            future.await;
        })
    }

    /// Run `tick` every `period`, first after one full period, until it
    /// returns `ControlFlow::Break`.
    pub fn every<F, Fut>(label: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        Self::spawn(label, async move {
            let mut interval =
                tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tick().await.is_break() {
                    log::trace!("[Scheduler] {label} stopped");
                    break;
                }
            }
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        // A task replacing or cancelling its own slot is already on its way
        // out; aborting it would cut off the work that re-armed it.
        if tokio::task::try_id() == Some(self.handle.id()) {
            return;
        }
        if !self.handle.is_finished() {
            log::trace!("[Scheduler] {} cancelled", self.label);
            self.handle.abort();
        }
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("label", &self.label)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

/// Holds at most one live task; arming replaces and cancels the previous.
#[derive(Debug, Default)]
pub struct TaskSlot {
    task: Mutex<Option<ScheduledTask>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, task: ScheduledTask) {
        let previous = self.task.lock().replace(task);
        drop(previous);
    }

    pub fn cancel(&self) {
        let previous = self.task.lock().take();
        drop(previous);
    }

    pub fn is_armed(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
