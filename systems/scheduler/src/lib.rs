#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic queue of one-shot tasks fired after a delay measured in ticks.
//!
//! The queue keeps its own notion of "now", advanced by the owner once per
//! tick. Tasks are released in `(fire tick, insertion order)` order. A task
//! scheduled while due tasks are being drained always lands at least one tick
//! after the current one, so a dispatch pass can never feed itself.

use std::collections::BTreeMap;

use outpost_core::{Tick, Ticks};
use tracing::trace;

/// Task released by the queue together with the tick it was due at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledEvent<T> {
    /// Tick the task became due at.
    pub fire_tick: Tick,
    /// Payload supplied when the task was scheduled.
    pub task: T,
}

/// One-shot delayed task queue.
#[derive(Debug)]
pub struct ScheduledEventQueue<T> {
    now: Tick,
    next_sequence: u64,
    pending: BTreeMap<(Tick, u64), T>,
}

impl<T> Default for ScheduledEventQueue<T> {
    fn default() -> Self {
        Self::new(Tick::ZERO)
    }
}

impl<T> ScheduledEventQueue<T> {
    /// Creates an empty queue whose clock starts at `now`.
    #[must_use]
    pub fn new(now: Tick) -> Self {
        Self {
            now,
            next_sequence: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Tick the queue currently considers to be "now".
    #[must_use]
    pub const fn now(&self) -> Tick {
        self.now
    }

    /// Moves the clock forward to `now`. The clock never runs backwards.
    pub fn advance(&mut self, now: Tick) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Schedules `task` to fire `delay` ticks after the current tick.
    ///
    /// A zero delay is treated as one tick so that a task scheduled during a
    /// dispatch pass is never released by that same pass. Returns the tick at
    /// which the task becomes due.
    pub fn schedule(&mut self, delay: Ticks, task: T) -> Tick {
        let delay = if delay.is_zero() {
            Ticks::new(1)
        } else {
            delay
        };
        let fire_tick = self.now.saturating_add(delay);
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        let _ = self.pending.insert((fire_tick, sequence), task);
        trace!(now = self.now.get(), fire_tick = fire_tick.get(), "task scheduled");
        fire_tick
    }

    /// Releases the earliest task whose fire tick is not after the current tick.
    pub fn pop_due(&mut self) -> Option<ScheduledEvent<T>> {
        let (&(fire_tick, _), _) = self.pending.first_key_value()?;
        if fire_tick > self.now {
            return None;
        }

        self.pending
            .pop_first()
            .map(|((fire_tick, _), task)| ScheduledEvent { fire_tick, task })
    }

    /// Tick at which the next pending task becomes due, if any.
    #[must_use]
    pub fn next_fire_tick(&self) -> Option<Tick> {
        self.pending.keys().next().map(|(tick, _)| *tick)
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Reports whether no task is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Iterator over pending tasks in firing order.
    pub fn iter(&self) -> impl Iterator<Item = (Tick, &T)> {
        self.pending.iter().map(|((tick, _), task)| (*tick, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut ScheduledEventQueue<&'static str>) -> Vec<&'static str> {
        let mut released = Vec::new();
        while let Some(event) = queue.pop_due() {
            released.push(event.task);
        }
        released
    }

    #[test]
    fn tasks_fire_once_their_delay_elapsed() {
        let mut queue = ScheduledEventQueue::new(Tick::new(10));
        assert_eq!(queue.schedule(Ticks::new(5), "late"), Tick::new(15));

        queue.advance(Tick::new(14));
        assert!(drain(&mut queue).is_empty());

        queue.advance(Tick::new(15));
        assert_eq!(drain(&mut queue), vec!["late"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_delay_means_next_tick() {
        let mut queue = ScheduledEventQueue::new(Tick::new(3));
        assert_eq!(queue.schedule(Ticks::ZERO, "soon"), Tick::new(4));
        assert!(drain(&mut queue).is_empty());

        queue.advance(Tick::new(4));
        assert_eq!(drain(&mut queue), vec!["soon"]);
    }

    #[test]
    fn same_tick_tasks_keep_insertion_order() {
        let mut queue = ScheduledEventQueue::default();
        let _ = queue.schedule(Ticks::new(2), "second");
        let _ = queue.schedule(Ticks::new(1), "first");
        let _ = queue.schedule(Ticks::new(2), "third");

        queue.advance(Tick::new(2));
        assert_eq!(drain(&mut queue), vec!["first", "second", "third"]);
    }

    #[test]
    fn rescheduling_while_draining_uses_current_tick() {
        let mut queue = ScheduledEventQueue::default();
        let _ = queue.schedule(Ticks::new(4), "chain");

        queue.advance(Tick::new(9));
        let released = queue.pop_due().expect("chain is overdue");
        assert_eq!(released.fire_tick, Tick::new(4));

        let next = queue.schedule(Ticks::ZERO, "successor");
        assert_eq!(next, Tick::new(10));
        assert!(queue.pop_due().is_none(), "successor must wait a tick");
        assert_eq!(queue.next_fire_tick(), Some(Tick::new(10)));
    }

    #[test]
    fn clock_never_runs_backwards() {
        let mut queue: ScheduledEventQueue<()> = ScheduledEventQueue::new(Tick::new(8));
        queue.advance(Tick::new(2));
        assert_eq!(queue.now(), Tick::new(8));
    }
}
