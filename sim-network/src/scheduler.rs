//! Virtual clock and time-ordered event queue
//!
//! Events are processed one at a time, in order of their scheduled time. Events scheduled for the
//! same instant are processed in insertion order, which keeps runs reproducible.

use crate::error::SimulationError;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

pub struct Scheduler<E> {
    now: Duration,
    next_sequence: u64,
    pending: BinaryHeap<PendingEvent<E>>,
    stop_requested: bool,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOutcome {
    pub processed_events: u64,
    pub discarded_events: u64,
    /// Whether the run ended because a handler called [`Scheduler::stop`]
    pub stopped_early: bool,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_sequence: 0,
            pending: BinaryHeap::new(),
            stop_requested: false,
        }
    }

    /// The current virtual time, relative to the start of the simulation
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// Enqueues an event at an absolute point in virtual time
    pub fn schedule(&mut self, time: Duration, event: E) -> Result<(), SimulationError> {
        if time < self.now {
            return Err(SimulationError::InvalidTime {
                requested: time,
                now: self.now,
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.push(PendingEvent {
            time,
            sequence,
            event,
        });

        Ok(())
    }

    pub fn schedule_in(&mut self, delay: Duration, event: E) -> Result<(), SimulationError> {
        self.schedule(self.now + delay, event)
    }

    /// Makes [`Scheduler::run`] return as soon as the current handler finishes
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// Processes events until the queue is empty, `stop_time` is reached or a handler calls
    /// [`Scheduler::stop`]
    ///
    /// Events scheduled after `stop_time` are discarded without being processed. A handler error
    /// aborts the run.
    pub fn run<F>(&mut self, stop_time: Duration, mut handler: F) -> Result<RunOutcome, SimulationError>
    where
        F: FnMut(&mut Self, E) -> Result<(), SimulationError>,
    {
        self.stop_requested = false;
        let mut outcome = RunOutcome::default();

        loop {
            if self.stop_requested {
                outcome.stopped_early = true;
                break;
            }

            let Some(next_time) = self.pending.peek().map(|e| e.time) else {
                // Nothing left to do
                break;
            };

            if next_time > stop_time {
                // Everything left in the queue lies beyond the horizon
                outcome.discarded_events += self.pending.len() as u64;
                self.pending.clear();
                self.now = self.now.max(stop_time);
                break;
            }

            let Some(next) = self.pending.pop() else {
                break;
            };

            self.now = next.time;
            handler(self, next.event)?;
            outcome.processed_events += 1;
        }

        self.stop_requested = false;
        Ok(outcome)
    }
}

struct PendingEvent<E> {
    time: Duration,
    sequence: u64,
    event: E,
}

impl<E> Eq for PendingEvent<E> {}

impl<E> PartialEq<Self> for PendingEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> PartialOrd<Self> for PendingEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for PendingEvent<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Note: the order is reversed, so the "max" event is the earliest one (and, among events
        // at the same time, the one that was scheduled first)
        other
            .time
            .cmp(&self.time)
            .then(other.sequence.cmp(&self.sequence))
    }
}
