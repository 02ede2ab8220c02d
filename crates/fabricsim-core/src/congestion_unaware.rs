//! Congestion-unaware analytical cost engine.
//!
//! No event loop and no link state: a transfer is costed in isolation as
//! `hops * latency + size / bandwidth` per dimension. The serialization
//! delay is charged once per dimension (links within a dimension cut
//! through), and dimensions add up store-and-forward.

use fabricsim_topology::{BasicTopology, ChunkSize, DeviceId, EventTime, Topology};

/// Analytical network: same topology variants as the congestion-aware
/// engine, exposing only a cost query.
#[derive(Debug)]
pub struct AnalyticalNetwork {
    topology: Topology,
}

impl AnalyticalNetwork {
    pub fn new(topology: Topology) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn npus_count(&self) -> usize {
        self.topology.npus_count()
    }

    fn dim_cost(dim: &BasicTopology, hops: usize, size: ChunkSize) -> EventTime {
        let serialization = size as f64 / dim.bandwidth();
        (hops as f64 * dim.latency() as f64 + serialization) as EventTime
    }

    /// Simulated completion time of a single transfer.
    pub fn send(&self, src: DeviceId, dest: DeviceId, size: ChunkSize) -> EventTime {
        assert!(size > 0);
        assert_ne!(src, dest);
        match &self.topology {
            Topology::Basic(basic) => {
                let hops = basic.hops_count(src, dest);
                Self::dim_cost(basic, hops, size)
            }
            Topology::MultiDim(multi) => {
                let src_address = multi.translate_address(src);
                let dest_address = multi.translate_address(dest);
                let mut total = 0;
                for (dim, (&a, &b)) in multi
                    .dims()
                    .iter()
                    .zip(src_address.iter().zip(dest_address.iter()))
                {
                    if a == b {
                        continue;
                    }
                    total += Self::dim_cost(dim, dim.hops_count(a, b), size);
                }
                total
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabricsim_topology::{FullyConnected, MultiDimTopology, Ring, Switch};

    const MIB: u64 = 1_048_576;

    fn basic(topology: BasicTopology) -> AnalyticalNetwork {
        AnalyticalNetwork::new(Topology::Basic(topology))
    }

    #[test]
    fn test_ring_cost() {
        let network = basic(BasicTopology::Ring(Ring::new(8, 50.0, 500)));
        // 3 hops: 3 * 500 + 1_048_576 / 50
        assert_eq!(network.send(1, 4, MIB), 22_471);
    }

    #[test]
    fn test_fully_connected_cost() {
        let network = basic(BasicTopology::FullyConnected(FullyConnected::new(
            8, 50.0, 500,
        )));
        assert_eq!(network.send(1, 4, MIB), 21_471);
    }

    #[test]
    fn test_switch_cost() {
        let network = basic(BasicTopology::Switch(Switch::new(8, 50.0, 500)));
        assert_eq!(network.send(1, 4, MIB), 21_971);
    }

    #[test]
    fn test_cost_is_stateless() {
        let network = basic(BasicTopology::Ring(Ring::new(8, 50.0, 500)));
        assert_eq!(network.send(1, 4, MIB), network.send(1, 4, MIB));
    }

    #[test]
    fn test_one_byte_chunk_is_latency_bound() {
        let network = basic(BasicTopology::Ring(Ring::new(8, 50.0, 500)));
        assert_eq!(network.send(1, 4, 1), 1_500);
    }

    fn three_dim() -> AnalyticalNetwork {
        AnalyticalNetwork::new(Topology::MultiDim(MultiDimTopology::from_dims(vec![
            BasicTopology::Ring(Ring::new(2, 200.0, 50)),
            BasicTopology::FullyConnected(FullyConnected::new(8, 100.0, 500)),
            BasicTopology::Switch(Switch::new(4, 50.0, 2000)),
        ])))
    }

    #[test]
    fn test_multi_dim_single_dim_transfers() {
        let network = three_dim();
        assert_eq!(network.send(0, 1, MIB), 5_292);
        assert_eq!(network.send(37, 41, MIB), 10_985);
        assert_eq!(network.send(26, 42, MIB), 24_971);
    }

    #[test]
    fn test_multi_dim_transfer_sums_dimensions() {
        let network = three_dim();
        // 0 -> 5 crosses the ring dim (1 hop) and the fc dim (1 hop)
        assert_eq!(network.send(0, 5, MIB), 5_292 + 10_985);
    }
}
