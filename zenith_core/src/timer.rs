//! Deadline-based timer queue with cancellable handles.
//!
//! The queue never sleeps or spawns anything. An owner schedules timers,
//! keeps the returned [`TimerHandle`]s, and periodically asks for whatever is
//! due. Cancelling a handle removes the timer immediately, so nothing fires
//! into state that has already been torn down.

use chrono::{DateTime, Duration, Utc};

/// Opaque reference to a scheduled timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Entry<T> {
    handle: TimerHandle,
    due: DateTime<Utc>,
    every: Option<Duration>,
    payload: T,
}

/// A timer that came due
#[derive(Clone, Debug, PartialEq)]
pub struct Fired<T> {
    pub handle: TimerHandle,
    pub due: DateTime<Utc>,
    pub payload: T,
}

/// Pending one-shot and repeating timers, ordered by deadline
///
/// Timers with the same deadline fire in the order they were scheduled.
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, due: DateTime<Utc>, every: Option<Duration>, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            handle,
            due,
            every,
            payload,
        });
        handle
    }

    /// Fire once at `due`
    pub fn schedule_once(&mut self, due: DateTime<Utc>, payload: T) -> TimerHandle {
        self.push(due, None, payload)
    }

    /// Fire at `first` and then every `every` until cancelled
    ///
    /// Non-positive intervals are bumped to one millisecond so the timer can
    /// never fire forever at a single instant.
    pub fn schedule_repeating(
        &mut self,
        first: DateTime<Utc>,
        every: Duration,
        payload: T,
    ) -> TimerHandle {
        let every = every.max(Duration::milliseconds(1));
        self.push(first, Some(every), payload)
    }

    /// Remove a timer; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn earliest(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| (e.due, e.handle.0))
            .map(|(i, _)| i)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.earliest().map(|i| self.entries[i].due)
    }

    /// Take the earliest timer due at or before `now`
    ///
    /// Repeating timers are re-armed for their next occurrence.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<Fired<T>> {
        let idx = self.earliest()?;
        if self.entries[idx].due > now {
            return None;
        }

        match self.entries[idx].every {
            Some(every) => {
                let entry = &mut self.entries[idx];
                let fired = Fired {
                    handle: entry.handle,
                    due: entry.due,
                    payload: entry.payload.clone(),
                };
                entry.due += every;
                Some(fired)
            }
            None => {
                let entry = self.entries.swap_remove(idx);
                Some(Fired {
                    handle: entry.handle,
                    due: entry.due,
                    payload: entry.payload,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::from_epoch_ms;

    fn at(secs: i64) -> DateTime<Utc> {
        from_epoch_ms(secs * 1000).unwrap()
    }

    fn drain(queue: &mut TimerQueue<&'static str>, now: DateTime<Utc>) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Some(fired) = queue.pop_due(now) {
            out.push(fired.payload);
        }
        out
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_once(at(5), "late");
        queue.schedule_once(at(1), "early");
        queue.schedule_once(at(3), "middle");

        assert_eq!(queue.next_deadline(), Some(at(1)));
        assert_eq!(drain(&mut queue, at(10)), vec!["early", "middle", "late"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_nothing_fires_early() {
        let mut queue = TimerQueue::new();
        queue.schedule_once(at(2), "a");
        assert!(queue.pop_due(at(1)).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_once(at(4), "first");
        queue.schedule_once(at(4), "second");
        assert_eq!(drain(&mut queue, at(4)), vec!["first", "second"]);
    }

    #[test]
    fn test_repeating_rearms() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule_repeating(at(1), Duration::seconds(1), "tick");

        assert_eq!(drain(&mut queue, at(3)), vec!["tick", "tick", "tick"]);
        assert!(queue.is_pending(handle));
        assert_eq!(queue.next_deadline(), Some(at(4)));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let mut queue = TimerQueue::new();
        let once = queue.schedule_once(at(1), "once");
        let tick = queue.schedule_repeating(at(1), Duration::seconds(1), "tick");

        assert!(queue.cancel(once));
        assert!(queue.cancel(tick));
        assert!(!queue.cancel(tick));
        assert!(drain(&mut queue, at(100)).is_empty());
        assert!(queue.next_deadline().is_none());
    }

    #[test]
    fn test_fired_one_shot_cannot_be_cancelled() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule_once(at(0), "now");
        assert_eq!(queue.pop_due(at(0)).unwrap().handle, handle);
        assert!(!queue.cancel(handle));
    }

    #[test]
    fn test_zero_interval_still_advances() {
        let mut queue = TimerQueue::new();
        queue.schedule_repeating(at(0), Duration::zero(), "spin");
        let fired = queue.pop_due(at(0)).unwrap();
        assert_eq!(fired.due, at(0));
        assert!(queue.next_deadline().unwrap() > at(0));
    }
}
