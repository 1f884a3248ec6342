//! Cooperative, host driven one-shot and repeating timers.

use std::{collections::VecDeque, time::Duration};

// -------------------------------------------------------------------------------------------------

/// Identifies a task in a [`TimerQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ScheduledTask<T> {
    id: TaskId,
    due: Duration,
    interval: Option<Duration>,
    payload: T,
}

// -------------------------------------------------------------------------------------------------

/// A set of cancellable one-shot and repeating tasks, sorted by due time.
///
/// The queue does not run on its own: the owner polls due tasks with [`Self::pop_due`] from its
/// main context, passing in its notion of "now". Tasks with the same due time fire in the order
/// they were scheduled. Repeating tasks stay on their initial time grid, so they don't drift.
/// When polled late, they fire once for the latest missed slot instead of catching up on all
/// missed slots in a burst.
#[derive(Debug)]
pub struct TimerQueue<T> {
    tasks: VecDeque<ScheduledTask<T>>,
    next_id: usize,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Number of scheduled tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Due time of the next pending task, if any.
    pub fn next_due(&self) -> Option<Duration> {
        self.tasks.front().map(|task| task.due)
    }

    /// True when the task with the given id still is scheduled.
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|task| task.id == id)
    }

    /// Schedule a task which fires once at the given time.
    pub fn schedule_once(&mut self, due: Duration, payload: T) -> TaskId {
        self.insert(due, None, payload)
    }

    /// Schedule a task which first fires at `first_due`, then every `interval` until cancelled.
    pub fn schedule_repeating(&mut self, first_due: Duration, interval: Duration, payload: T) -> TaskId {
        assert!(!interval.is_zero(), "Repeating timers need a non zero interval");
        self.insert(first_due, Some(interval), payload)
    }

    /// Cancel the task with the given id. Returns false when the task was no longer scheduled,
    /// so cancelling a task multiple times is fine.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        if let Some(index) = self.tasks.iter().position(|task| task.id == id) {
            self.tasks.remove(index);
            true
        } else {
            false
        }
    }

    /// Remove all tasks, returning their payloads in due order.
    pub fn drain(&mut self) -> impl Iterator<Item = (TaskId, T)> + '_ {
        self.tasks.drain(..).map(|task| (task.id, task.payload))
    }

    /// Remove all tasks.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    fn insert(&mut self, due: Duration, interval: Option<Duration>, payload: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.insert_task(ScheduledTask {
            id,
            due,
            interval,
            payload,
        });
        id
    }

    fn insert_task(&mut self, task: ScheduledTask<T>) {
        let insert_pos = self
            .tasks
            .make_contiguous()
            .partition_point(|t| t.due <= task.due);
        self.tasks.insert(insert_pos, task);
    }
}

impl<T: Clone> TimerQueue<T> {
    /// Pop the next task which is due at or before `now`, returning its id, due time and payload.
    ///
    /// One-shot tasks get removed. Repeating tasks report their latest slot at or before `now`
    /// as due time and get rescheduled at the following slot.
    /// Call this in a loop until it returns `None` to run all due tasks.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TaskId, Duration, T)> {
        if !self.tasks.front().is_some_and(|task| task.due <= now) {
            return None;
        }
        let task = self.tasks.pop_front()?;
        let id = task.id;
        match task.interval {
            Some(interval) => {
                let behind = (now - task.due).as_nanos() % interval.as_nanos();
                let due = now - Duration::from_nanos(behind as u64);
                let payload = task.payload.clone();
                self.insert_task(ScheduledTask {
                    due: due + interval,
                    ..task
                });
                Some((id, due, payload))
            }
            None => Some((id, task.due, task.payload)),
        }
    }
}

// -------------------------------------------------------------------------------------------------
