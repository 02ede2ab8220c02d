//! Congestion-aware discrete-event engine.
//!
//! The [`Network`] owns an arena of [`Device`]s (links live inside their
//! source device, keyed by neighbour id), an [`EventQueue`], and the
//! topology that answers route queries. Chunks move by value: into a
//! link's pending queue, into a scheduled event, and finally into their
//! completion callback.
//!
//! Two event kinds drive the simulation: a chunk arriving at its next
//! device, and a link finishing serialization and becoming free. Only one
//! handler runs at a time; handlers never block, they only schedule
//! further events.

pub mod chunk;
pub mod device;
pub mod link;

pub use chunk::{Chunk, CompletionCallback};
pub use device::Device;
pub use link::Link;

use crate::event_queue::EventQueue;
use fabricsim_topology::{DeviceId, EventTime, Route, Topology};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// How a busy link picks the next chunk once it frees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueDiscipline {
    /// First in, first out.
    #[default]
    Fifo,
    /// Uniformly random over the current pending set.
    Random,
}

/// Engine events, dispatched centrally by [`Network::proceed`].
#[derive(Debug)]
enum NetEvent {
    /// The chunk has fully arrived at the next device on its route.
    ChunkArrived(Chunk),
    /// The link finished serializing and may take another chunk.
    LinkFreed { src: DeviceId, dst: DeviceId },
}

/// Congestion-aware network simulation.
pub struct Network {
    topology: Topology,
    devices: Vec<Device>,
    event_queue: EventQueue<NetEvent>,
    discipline: QueueDiscipline,
    rng: ChaCha8Rng,
}

impl Network {
    /// Build the device arena and install every link the topology
    /// declares. Multi-dim topologies start with no links; their routes
    /// materialize devices and links on first use.
    pub fn new(topology: Topology) -> Self {
        let arena_size = match &topology {
            Topology::Basic(basic) => basic.arena_size(),
            Topology::MultiDim(multi) => multi.npus_count(),
        };
        let mut devices: Vec<Device> = (0..arena_size).map(Device::new).collect();

        if let Topology::Basic(basic) = &topology {
            for edge in basic.edges() {
                devices[edge.a].connect(edge.b, edge.bandwidth, edge.latency);
                devices[edge.b].connect(edge.a, edge.bandwidth, edge.latency);
            }
        }

        Self {
            topology,
            devices,
            event_queue: EventQueue::new(),
            discipline: QueueDiscipline::Fifo,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Select the link queue discipline. Fixed before simulation starts.
    pub fn set_discipline(&mut self, discipline: QueueDiscipline) {
        self.discipline = discipline;
    }

    /// Fix the RNG used by the random queue discipline.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn npus_count(&self) -> usize {
        self.topology.npus_count()
    }

    pub fn devices_count(&self) -> usize {
        self.topology.devices_count()
    }

    /// Query a route. For multi-dim topologies this also materializes any
    /// auxiliary devices and links the route needs, so a chunk can
    /// traverse real link state.
    pub fn route(&mut self, src: DeviceId, dest: DeviceId) -> Route {
        match &self.topology {
            Topology::Basic(basic) => basic.route(src, dest),
            Topology::MultiDim(multi) => {
                let planned = multi.plan_route(src, dest);
                for edge in &planned.links {
                    let needed = edge.a.max(edge.b) + 1;
                    while self.devices.len() < needed {
                        self.devices.push(Device::new(self.devices.len()));
                    }
                    self.devices[edge.a].connect(edge.b, edge.bandwidth, edge.latency);
                    self.devices[edge.b].connect(edge.a, edge.bandwidth, edge.latency);
                }
                planned.path
            }
        }
    }

    /// Hand a chunk to the network at the head of its route. A one-device
    /// route (self-send) completes immediately.
    pub fn send(&mut self, chunk: Chunk) {
        if chunk.arrived_at_destination() {
            chunk.complete(self.event_queue.current_time());
            return;
        }
        self.forward(chunk);
    }

    /// Offer the chunk to the link toward its next device.
    fn forward(&mut self, chunk: Chunk) {
        let src = chunk.current_device();
        let dst = chunk.next_device();
        let Some(link) = self.devices[src].link_to(dst) else {
            panic!("route requires missing link {} -> {}", src, dst);
        };
        if link.is_busy() {
            self.devices[src]
                .link_to_mut(dst)
                .unwrap()
                .push_pending(chunk);
        } else {
            self.transmit(src, dst, chunk);
        }
    }

    /// Occupy a free link with a chunk: schedule its arrival at the far
    /// end after the communication delay and the link's release after the
    /// serialization delay.
    fn transmit(&mut self, src: DeviceId, dst: DeviceId, chunk: Chunk) {
        let now = self.event_queue.current_time();
        let (arrival_time, free_time) = {
            let link = self.devices[src].link_to_mut(dst).unwrap();
            assert!(!link.is_busy());
            link.set_busy();
            (
                now + link.communication_delay(chunk.size()),
                now + link.serialization_delay(chunk.size()),
            )
        };
        self.event_queue
            .schedule_event(arrival_time, NetEvent::ChunkArrived(chunk));
        self.event_queue
            .schedule_event(free_time, NetEvent::LinkFreed { src, dst });
    }

    fn handle_chunk_arrived(&mut self, time: EventTime, mut chunk: Chunk) {
        chunk.advance();
        if chunk.arrived_at_destination() {
            chunk.complete(time);
        } else {
            self.forward(chunk);
        }
    }

    fn handle_link_freed(&mut self, src: DeviceId, dst: DeviceId) {
        let pending = {
            let link = self.devices[src].link_to_mut(dst).unwrap();
            link.set_free();
            link.pending_count()
        };
        if pending == 0 {
            return;
        }
        let index = match self.discipline {
            QueueDiscipline::Fifo => 0,
            QueueDiscipline::Random => {
                if pending > 1 {
                    self.rng.gen_range(0..pending)
                } else {
                    0
                }
            }
        };
        let chunk = self.devices[src]
            .link_to_mut(dst)
            .unwrap()
            .take_pending(index);
        self.transmit(src, dst, chunk);
    }

    /// Pop and handle the earliest event. Returns `false` once drained.
    pub fn proceed(&mut self) -> bool {
        let Some((time, event)) = self.event_queue.proceed() else {
            return false;
        };
        match event {
            NetEvent::ChunkArrived(chunk) => self.handle_chunk_arrived(time, chunk),
            NetEvent::LinkFreed { src, dst } => self.handle_link_freed(src, dst),
        }
        true
    }

    pub fn finished(&self) -> bool {
        self.event_queue.finished()
    }

    pub fn current_time(&self) -> EventTime {
        self.event_queue.current_time()
    }

    /// Drain the event queue, returning the final simulated time.
    pub fn run(&mut self) -> EventTime {
        while self.proceed() {}
        self.current_time()
    }
}
