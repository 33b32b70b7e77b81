//! Task Scheduling
//!
//! The store never calls subscribers directly. Every change callback,
//! tracker invalidation and deferred write-back goes through a
//! [`Scheduler`] together with the name of the queue it should run on.
//!
//! # Queues
//!
//! - `Sync`: runs before `schedule` returns
//! - `Micro`: runs at the end of the current turn
//! - `Macro`: runs on the next frame
//! - `AfterMacro`: runs after the next frame's macro work
//!
//! [`QueueScheduler`] is the in-process implementation. Hosts with their
//! own event loop can implement the trait directly.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::reactive::{HookId, OwnerId};

/// Logical queue a task is scheduled on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Queue {
    #[default]
    Sync,
    Micro,
    Macro,
    AfterMacro,
}

/// Identity used to collapse duplicate tasks scheduled in the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    Hook(HookId),
    Owner(OwnerId),
}

/// A unit of deferred work.
pub struct Task {
    key: Option<TaskKey>,
    run: Box<dyn FnOnce() + Send>,
}

impl Task {
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            key: None,
            run: Box::new(run),
        }
    }

    /// A task that replaces any pending task with the same key.
    pub fn keyed<F>(key: TaskKey, run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            key: Some(key),
            run: Box::new(run),
        }
    }

    pub fn key(&self) -> Option<TaskKey> {
        self.key
    }

    pub fn run(self) {
        (self.run)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Turns a queue name into an actual deferred call.
pub trait Scheduler: Send + Sync {
    /// Schedule `task` on `queue`. A `Sync` task must have run by the time
    /// this returns.
    fn schedule(&self, task: Task, queue: Queue);
}

/// Buffers deferred queues until they are flushed.
#[derive(Default)]
pub struct QueueScheduler {
    micro: Mutex<VecDeque<Task>>,
    macro_: Mutex<VecDeque<Task>>,
    after_macro: Mutex<VecDeque<Task>>,
}

impl QueueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, queue: Queue) -> Option<&Mutex<VecDeque<Task>>> {
        match queue {
            Queue::Sync => None,
            Queue::Micro => Some(&self.micro),
            Queue::Macro => Some(&self.macro_),
            Queue::AfterMacro => Some(&self.after_macro),
        }
    }

    /// Number of tasks waiting on `queue`.
    pub fn pending(&self, queue: Queue) -> usize {
        self.queue(queue).map_or(0, |q| q.lock().len())
    }

    /// Run the next task, preferring earlier queues. The lock is released
    /// before the task runs, so tasks may schedule more work.
    fn run_next(&self) -> bool {
        let task = [&self.micro, &self.macro_, &self.after_macro]
            .into_iter()
            .find_map(|q| q.lock().pop_front());
        match task {
            Some(task) => {
                task.run();
                true
            }
            None => false,
        }
    }

    /// Drain every queue. Micro work created along the way runs before any
    /// further macro work. Returns how many tasks ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Drain micro work only.
    pub fn flush_micro(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = self.micro.lock().pop_front() else { break };
            task.run();
            ran += 1;
        }
        ran
    }

    /// Flush once per `frame` until the scheduler is the only owner left.
    pub async fn run_frames(self: Arc<Self>, frame: Duration) {
        let mut ticker = tokio::time::interval(frame);
        loop {
            ticker.tick().await;
            let ran = self.flush();
            if ran > 0 {
                tracing::trace!(ran, "frame flushed");
            }
            if Arc::strong_count(&self) == 1 {
                break;
            }
        }
    }
}

impl Scheduler for QueueScheduler {
    fn schedule(&self, task: Task, queue: Queue) {
        let Some(slot) = self.queue(queue) else {
            task.run();
            return;
        };
        let mut pending = slot.lock();
        if let Some(key) = task.key {
            if let Some(existing) = pending.iter_mut().find(|t| t.key == Some(key)) {
                existing.run = task.run;
                return;
            }
        }
        pending.push_back(task);
    }
}

impl fmt::Debug for QueueScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("micro", &self.pending(Queue::Micro))
            .field("macro", &self.pending(Queue::Macro))
            .field("after_macro", &self.pending(Queue::AfterMacro))
            .finish()
    }
}
