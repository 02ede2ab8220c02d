//! A device is any routable node: an NPU or a switch/auxiliary node.
//! Each device exclusively owns its outbound links, keyed by neighbour id.

use super::link::Link;
use fabricsim_topology::{Bandwidth, DeviceId, Latency};
use std::collections::HashMap;

#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    links: HashMap<DeviceId, Link>,
}

impl Device {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            links: HashMap::new(),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Install the outbound link to a neighbour. Requests for an already
    /// connected neighbour are ignored (the ring degenerates to a double
    /// edge at n = 2, and bidirectional installs visit each pair twice).
    pub fn connect(&mut self, neighbour: DeviceId, bandwidth: Bandwidth, latency: Latency) {
        if neighbour == self.id {
            log::warn!("ignoring self-link request on device {}", self.id);
            return;
        }
        self.links
            .entry(neighbour)
            .or_insert_with(|| Link::new(bandwidth, latency));
    }

    pub fn is_connected_to(&self, neighbour: DeviceId) -> bool {
        self.links.contains_key(&neighbour)
    }

    pub fn link_to(&self, neighbour: DeviceId) -> Option<&Link> {
        self.links.get(&neighbour)
    }

    pub fn link_to_mut(&mut self, neighbour: DeviceId) -> Option<&mut Link> {
        self.links.get_mut(&neighbour)
    }

    pub fn neighbour_count(&self) -> usize {
        self.links.len()
    }
}
