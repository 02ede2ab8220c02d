//! fabricsim — analytical network simulator for accelerator interconnects.
//!
//! Given a topology description and byte-sized transfers between NPUs,
//! fabricsim answers: when does each transfer complete, and what is the
//! total elapsed simulated time?
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌─────────────────┐     ┌───────────────────┐
//! │  Config  │────▶│    Topology     │────▶│  route(src, dst)  │
//! │  (TOML)  │     │ (fabricsim-     │     └─────────┬─────────┘
//! └──────────┘     │  topology)      │               │
//!                  └─────────────────┘               ▼
//!                                        ┌───────────────────────┐
//!               congestion-aware         │  Network (event loop) │
//!               ─────────────────▶       │  Device ─ Link ─ Chunk│
//!                                        └───────────────────────┘
//!               congestion-unaware       ┌───────────────────────┐
//!               ─────────────────▶       │  AnalyticalNetwork    │
//!                                        │  hops·lat + size/bw   │
//!                                        └───────────────────────┘
//! ```
//!
//! The congestion-aware engine models per-link serialization with FIFO
//! (or randomized) queueing of chunks on busy links; the unaware engine
//! costs each transfer in isolation with no event loop.

pub mod config;
pub mod congestion_aware;
pub mod congestion_unaware;
pub mod event_queue;

pub use config::{build_ep_expander, ConfigError, NetworkConfig};
pub use congestion_aware::{Chunk, CompletionCallback, Network, QueueDiscipline};
pub use congestion_unaware::AnalyticalNetwork;
pub use event_queue::EventQueue;

use fabricsim_topology::{ChunkSize, DeviceId, EventTime, Topology};
use std::cell::Cell;
use std::rc::Rc;

/// Run a congestion-aware simulation of one transfer, returning its
/// simulated completion time.
pub fn simulate_transfer(
    topology: Topology,
    src: DeviceId,
    dest: DeviceId,
    size: ChunkSize,
) -> EventTime {
    let mut network = Network::new(topology);
    let route = network.route(src, dest);
    let completed = Rc::new(Cell::new(0));
    let observer = Rc::clone(&completed);
    network.send(Chunk::new(
        size,
        route,
        Box::new(move |time| observer.set(time)),
    ));
    network.run();
    completed.get()
}

/// Run a congestion-aware all-gather: every ordered NPU pair sends one
/// chunk. Returns the total simulated time and the completion count.
pub fn simulate_all_gather(network: &mut Network, size: ChunkSize) -> (EventTime, usize) {
    let npus = network.npus_count();
    let completions = Rc::new(Cell::new(0usize));
    for src in 0..npus {
        for dest in 0..npus {
            if src == dest {
                continue;
            }
            let route = network.route(src, dest);
            let observer = Rc::clone(&completions);
            network.send(Chunk::new(
                size,
                route,
                Box::new(move |_| observer.set(observer.get() + 1)),
            ));
        }
    }
    let finish = network.run();
    (finish, completions.get())
}
