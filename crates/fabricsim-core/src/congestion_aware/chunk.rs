//! A chunk is a byte payload in transit along a fixed route.
//!
//! Ownership moves with the chunk: topology -> link pending queue ->
//! scheduled event payload -> next device, until the completion callback
//! consumes it at the final hop.

use fabricsim_topology::{ChunkSize, DeviceId, EventTime, Route};
use std::fmt;

/// Invoked with the simulated completion time when the chunk reaches the
/// end of its route.
pub type CompletionCallback = Box<dyn FnOnce(EventTime)>;

pub struct Chunk {
    size: ChunkSize,
    route: Route,
    /// Index of the hop the chunk currently occupies.
    position: usize,
    on_complete: Option<CompletionCallback>,
}

impl Chunk {
    pub fn new(size: ChunkSize, route: Route, on_complete: CompletionCallback) -> Self {
        assert!(size > 0);
        assert!(!route.is_empty());
        Self {
            size,
            route,
            position: 0,
            on_complete: Some(on_complete),
        }
    }

    pub fn size(&self) -> ChunkSize {
        self.size
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Device the chunk currently sits on.
    pub fn current_device(&self) -> DeviceId {
        self.route[self.position]
    }

    /// Device the chunk is heading to next.
    pub fn next_device(&self) -> DeviceId {
        assert!(!self.arrived_at_destination());
        self.route[self.position + 1]
    }

    /// Record arrival at the next device on the route.
    pub fn advance(&mut self) {
        assert!(self.position + 1 < self.route.len());
        self.position += 1;
    }

    pub fn arrived_at_destination(&self) -> bool {
        self.position == self.route.len() - 1
    }

    /// Invoke the completion callback, consuming the chunk.
    pub fn complete(mut self, time: EventTime) {
        if let Some(callback) = self.on_complete.take() {
            callback(time);
        }
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("size", &self.size)
            .field("route", &self.route)
            .field("position", &self.position)
            .finish()
    }
}
