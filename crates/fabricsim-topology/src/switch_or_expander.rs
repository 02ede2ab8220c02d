//! Composite topology: a central switch and an expander over the same
//! NPUs, selected per query by the MoE flag of the endpoints.

use crate::descriptor::{DescriptorError, ExpanderDescriptor};
use crate::expander::{ExpanderGraph, ExpanderRouting};
use crate::registry::RoutingModeRegistry;
use crate::types::{Bandwidth, DeviceId, Edge, Latency, Route};

/// Switch-or-expander composite.
///
/// Device layout: NPUs in `[0, npus_count)`, expander spares (resiliency
/// only) in `[npus_count, npus_count + spares)`, and the switch hub on the
/// id just past the expander's node range. The reported `devices_count`
/// is `npus_count + spares` with resiliency and `npus_count + 1` without.
#[derive(Debug)]
pub struct SwitchOrExpander {
    npus_count: usize,
    resiliency: bool,
    bandwidth: Bandwidth,
    latency: Latency,
    expander: ExpanderGraph,
    modes: RoutingModeRegistry,
}

impl SwitchOrExpander {
    pub fn from_descriptor(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        descriptor: &ExpanderDescriptor,
        resiliency: bool,
        routing: ExpanderRouting,
        modes: RoutingModeRegistry,
    ) -> Result<Self, DescriptorError> {
        assert!(npus_count > 0);
        assert!(bandwidth > 0.0);

        let expander = ExpanderGraph::from_descriptor(
            npus_count,
            bandwidth,
            latency,
            descriptor,
            resiliency,
            routing,
        )?;
        log::info!(
            "switch-or-expander: {} NPUs, expander of {} nodes, hub at {}",
            npus_count,
            expander.devices_count(),
            expander.devices_count(),
        );

        Ok(Self {
            npus_count,
            resiliency,
            bandwidth,
            latency,
            expander,
            modes,
        })
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    pub fn devices_count(&self) -> usize {
        if self.resiliency {
            self.npus_count + self.npus_count / 8
        } else {
            self.npus_count + 1
        }
    }

    /// Engine arena size: expander nodes plus the switch hub.
    pub fn arena_size(&self) -> usize {
        self.expander.devices_count() + 1
    }

    /// Id of the central switch device.
    pub fn switch_id(&self) -> DeviceId {
        self.expander.devices_count()
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn expander(&self) -> &ExpanderGraph {
        &self.expander
    }

    pub fn modes(&self) -> &RoutingModeRegistry {
        &self.modes
    }

    /// Whether a query between these endpoints uses the expander. Both
    /// endpoints must agree on the mode.
    fn moe_query(&self, src: DeviceId, dest: DeviceId) -> bool {
        let src_moe = self.modes.is_moe(src);
        let dest_moe = self.modes.is_moe(dest);
        assert_eq!(
            src_moe, dest_moe,
            "endpoints {} and {} disagree on MoE routing mode",
            src, dest,
        );
        src_moe
    }

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        assert!(src < self.npus_count);
        assert!(dest < self.npus_count);
        assert_ne!(src, dest);

        if self.moe_query(src, dest) {
            self.expander.route(src, dest)
        } else {
            vec![src, self.switch_id(), dest]
        }
    }

    pub fn distance(&self, src: DeviceId, dest: DeviceId) -> usize {
        if src == dest {
            return 0;
        }
        if self.moe_query(src, dest) {
            self.expander.distance(src, dest)
        } else {
            2
        }
    }

    pub fn hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        assert_ne!(src, dest);
        if self.moe_query(src, dest) {
            self.expander.shortest_route(src, dest).len() - 1
        } else {
            2
        }
    }

    /// Adjacency of the inner topology the given device's mode selects.
    pub fn adjacency(&self, device: DeviceId) -> Vec<DeviceId> {
        if self.modes.is_moe(device) {
            self.expander.adjacency()[device].clone()
        } else {
            vec![self.switch_id()]
        }
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = self.expander.edges();
        for npu in 0..self.npus_count {
            edges.push(Edge {
                a: npu,
                b: self.switch_id(),
                bandwidth: self.bandwidth,
                latency: self.latency,
            });
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circulant(n: usize, offsets: &[usize]) -> Vec<Vec<DeviceId>> {
        (0..n)
            .map(|i| {
                let mut neighbours = Vec::new();
                for &o in offsets {
                    neighbours.push((i + o) % n);
                    neighbours.push((i + n - o) % n);
                }
                neighbours.sort_unstable();
                neighbours.dedup();
                neighbours
            })
            .collect()
    }

    fn resilient() -> SwitchOrExpander {
        let descriptor = ExpanderDescriptor {
            node_count: 18,
            degree: 8,
            connected_graph_adjacency: circulant(18, &[1, 2, 3, 4]),
            split_graph_adjacency: None,
            groups: None,
        };
        SwitchOrExpander::from_descriptor(
            16,
            50.0,
            500,
            &descriptor,
            true,
            ExpanderRouting::ShortestPath,
            RoutingModeRegistry::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_resiliency_device_count() {
        let t = resilient();
        assert_eq!(t.npus_count(), 16);
        assert_eq!(t.devices_count(), 18);
        assert_eq!(t.devices_count(), t.npus_count() + t.npus_count() / 8);
        assert_eq!(t.switch_id(), 18);
    }

    #[test]
    fn test_switch_mode_routes_via_hub() {
        let t = resilient();
        for src in 0..16 {
            for dest in 0..16 {
                if src == dest {
                    continue;
                }
                assert_eq!(t.route(src, dest), vec![src, t.switch_id(), dest]);
                assert_eq!(t.hops_count(src, dest), 2);
                assert_eq!(t.distance(src, dest), 2);
            }
        }
    }

    #[test]
    fn test_moe_mode_routes_over_expander() {
        let t = resilient();
        t.modes().set_all(t.arena_size(), true);
        for src in 0..16 {
            for dest in 0..16 {
                if src == dest {
                    continue;
                }
                let route = t.route(src, dest);
                assert_eq!(route[0], src);
                assert_eq!(*route.last().unwrap(), dest);
                assert!(route.len() <= 5);
                assert_eq!(t.hops_count(src, dest), route.len() - 1);
            }
        }
    }

    #[test]
    fn test_moe_adjacency_has_expander_degree() {
        let t = resilient();
        t.modes().set_all(t.arena_size(), true);
        for npu in 0..16 {
            assert_eq!(t.adjacency(npu).len(), 8);
        }
    }

    #[test]
    fn test_switch_adjacency_is_hub_only() {
        let t = resilient();
        assert_eq!(t.adjacency(0), vec![18]);
    }

    #[test]
    #[should_panic(expected = "disagree")]
    fn test_mixed_mode_query_panics() {
        let t = resilient();
        t.modes().set(0, true);
        t.route(0, 1);
    }

    #[test]
    fn test_without_resiliency_one_extra_device() {
        let descriptor = ExpanderDescriptor {
            node_count: 16,
            degree: 8,
            connected_graph_adjacency: circulant(16, &[1, 2, 3, 4]),
            split_graph_adjacency: None,
            groups: None,
        };
        let t = SwitchOrExpander::from_descriptor(
            16,
            50.0,
            500,
            &descriptor,
            false,
            ExpanderRouting::ShortestPath,
            RoutingModeRegistry::new(),
        )
        .unwrap();
        assert_eq!(t.devices_count(), 17);
        assert_eq!(t.switch_id(), 16);
        assert_eq!(t.arena_size(), 17);
    }
}
