//! Cancelable recurring tasks driven by the host's clocks.
//!
//! The scheduler never runs code itself. Hosts pump it with the current time
//! and it answers which task kinds are due; the owner dispatches them with
//! full mutable access to its own state. Handles carry a generation so a
//! stale handle cannot cancel a task that later reused its slot.

use slab::Slab;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    key: usize,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Runs on every animation-frame tick.
    AnimationFrame,
    /// Runs on wall-clock ticks once `period` has elapsed since the last run.
    Interval(Duration),
}

#[derive(Debug, Clone)]
struct ScheduledTask<K> {
    kind: K,
    cadence: Cadence,
    generation: u64,
    next_due: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    tasks: Slab<ScheduledTask<K>>,
    next_generation: u64,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            tasks: Slab::new(),
            next_generation: 1,
        }
    }
}

impl<K: Copy + std::fmt::Debug> Scheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_animation_frame(&mut self, kind: K) -> TaskHandle {
        self.insert(kind, Cadence::AnimationFrame, None)
    }

    pub fn schedule_interval(&mut self, kind: K, period: Duration, now: Instant) -> TaskHandle {
        let period = period.max(Duration::from_millis(1));
        self.insert(kind, Cadence::Interval(period), Some(now + period))
    }

    fn insert(&mut self, kind: K, cadence: Cadence, next_due: Option<Instant>) -> TaskHandle {
        let generation = self.next_generation;
        self.next_generation += 1;
        let key = self.tasks.insert(ScheduledTask {
            kind,
            cadence,
            generation,
            next_due,
        });
        tracing::trace!(?kind, ?cadence, key, "task scheduled");
        TaskHandle { key, generation }
    }

    /// Returns false when the handle was already canceled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        if !self.is_scheduled(handle) {
            return false;
        }
        let task = self.tasks.remove(handle.key);
        tracing::trace!(kind = ?task.kind, key = handle.key, "task canceled");
        true
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.tasks
            .get(handle.key)
            .is_some_and(|task| task.generation == handle.generation)
    }

    pub fn animation_frame_tasks(&self) -> Vec<(TaskHandle, K)> {
        self.tasks
            .iter()
            .filter(|(_, task)| task.cadence == Cadence::AnimationFrame)
            .map(|(key, task)| {
                (
                    TaskHandle {
                        key,
                        generation: task.generation,
                    },
                    task.kind,
                )
            })
            .collect()
    }

    /// Interval tasks due at `now`. Each fires at most once per call; a task
    /// that fell more than a period behind is re-anchored on `now` instead of
    /// firing a burst of catch-up runs.
    pub fn due_intervals(&mut self, now: Instant) -> Vec<(TaskHandle, K)> {
        let mut due = Vec::new();
        for (key, task) in self.tasks.iter_mut() {
            let Cadence::Interval(period) = task.cadence else {
                continue;
            };
            let Some(next_due) = task.next_due else {
                continue;
            };
            if now < next_due {
                continue;
            }
            let mut following = next_due + period;
            if following <= now {
                following = now + period;
            }
            task.next_due = Some(following);
            due.push((
                TaskHandle {
                    key,
                    generation: task.generation,
                },
                task.kind,
            ));
        }
        due
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
