//! Per-edge link state.
//!
//! A link is a `Free <-> Busy` state machine with a pending-chunk queue.
//! Serialization delay (`size / bandwidth`) frees the link for the next
//! chunk; communication delay (`latency + size / bandwidth`) delivers the
//! chunk to the next device. Separating the two lets a downstream link
//! begin servicing a chunk while this one is still airborne
//! (store-and-forward).

use super::chunk::Chunk;
use fabricsim_topology::{bw_gbps_to_bpns, Bandwidth, ChunkSize, EventTime, Latency};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct Link {
    /// Bandwidth in bytes per nanosecond.
    bandwidth_bpns: f64,
    latency: Latency,
    pending: VecDeque<Chunk>,
    busy: bool,
}

impl Link {
    pub fn new(bandwidth: Bandwidth, latency: Latency) -> Self {
        assert!(bandwidth > 0.0);
        Self {
            bandwidth_bpns: bw_gbps_to_bpns(bandwidth),
            latency,
            pending: VecDeque::new(),
            busy: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self) {
        self.busy = true;
    }

    pub fn set_free(&mut self) {
        self.busy = false;
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn bandwidth_bpns(&self) -> f64 {
        self.bandwidth_bpns
    }

    /// Time to push the chunk's bytes onto the wire.
    pub fn serialization_delay(&self, size: ChunkSize) -> EventTime {
        assert!(size > 0);
        (size as f64 / self.bandwidth_bpns) as EventTime
    }

    /// Time until the chunk is fully received at the far end.
    pub fn communication_delay(&self, size: ChunkSize) -> EventTime {
        assert!(size > 0);
        (self.latency as f64 + size as f64 / self.bandwidth_bpns) as EventTime
    }

    pub fn push_pending(&mut self, chunk: Chunk) {
        self.pending.push_back(chunk);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Dequeue the chunk at `index` (0 is the queue head).
    pub fn take_pending(&mut self, index: usize) -> Chunk {
        self.pending.remove(index).expect("pending index in range")
    }
}
