//! Discrete-event queue.
//!
//! A min-heap of `(fire_time, payload)` entries ordered by time with a
//! monotonically increasing sequence number breaking ties, so events
//! scheduled for the same instant fire in insertion order. Simulated time
//! advances only by popping events and never decreases.

use fabricsim_topology::EventTime;
use std::collections::BinaryHeap;

/// A timestamped event for the priority queue.
#[derive(Debug, Clone)]
struct TimedEvent<E> {
    fire_time: EventTime,
    sequence: u64,
    payload: E,
}

impl<E> PartialEq for TimedEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time == other.fire_time && self.sequence == other.sequence
    }
}

impl<E> Eq for TimedEvent<E> {}

impl<E> PartialOrd for TimedEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for TimedEvent<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want min-heap
        other
            .fire_time
            .cmp(&self.fire_time)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// Event queue driving a single-threaded cooperative simulation.
#[derive(Debug)]
pub struct EventQueue<E> {
    current_time: EventTime,
    events: BinaryHeap<TimedEvent<E>>,
    sequence: u64,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            current_time: 0,
            events: BinaryHeap::new(),
            sequence: 0,
        }
    }

    /// Schedule an event. `fire_time` must not lie in the past.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `fire_time < current_time`.
    pub fn schedule_event(&mut self, fire_time: EventTime, payload: E) {
        debug_assert!(
            fire_time >= self.current_time,
            "cannot schedule into the past: current={}ns, requested={}ns",
            self.current_time,
            fire_time,
        );
        self.events.push(TimedEvent {
            fire_time,
            sequence: self.sequence,
            payload,
        });
        self.sequence += 1;
    }

    /// Pop the earliest event, advancing the clock to its fire time.
    /// Returns `None` once the queue is drained.
    pub fn proceed(&mut self) -> Option<(EventTime, E)> {
        let event = self.events.pop()?;
        self.current_time = event.fire_time;
        Some((event.fire_time, event.payload))
    }

    pub fn finished(&self) -> bool {
        self.events.is_empty()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn current_time(&self) -> EventTime {
        self.current_time
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
