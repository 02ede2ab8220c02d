//! Topology and routing layer for fabricsim.
//!
//! This crate models interconnect topologies for accelerator clusters and
//! answers route queries over them. It holds no simulation state: the
//! congestion-aware engine in `fabricsim-core` materializes devices and
//! links from the topology's edge list, and the congestion-unaware engine
//! costs routes analytically.
//!
//! | Topology | Structure | Routing |
//! |----------|-----------|---------|
//! | [`Ring`] | `i <-> (i+1) mod n` | shorter arc, ties clockwise |
//! | [`FullyConnected`] | all pairs | direct |
//! | [`Switch`] | star around one hub | `[src, hub, dest]` |
//! | [`FatTree`] | 3-tier k-ary fat tree | deterministic or random up-routing |
//! | [`ExpanderGraph`] | descriptor-defined expander | BFS shortest path or random top-k |
//! | [`EpExpanderTopology`] | pre-weighted route table | weighted selection, layer permutation |
//! | [`SwitchOrExpander`] | switch + expander composite | per-device MoE flag dispatch |
//! | [`MultiDimTopology`] | stack of the above | dimension-ordered |

pub mod descriptor;
pub mod ep_expander;
pub mod expander;
pub mod fat_tree;
pub mod fully_connected;
pub mod multi_dim;
pub mod registry;
pub mod ring;
pub mod switch;
pub mod switch_or_expander;
pub mod types;

pub use descriptor::{
    DescriptorError, EpMetadata, EpRoutesDescriptor, ExpanderDescriptor, RouteInfo, SplitGroups,
};
pub use ep_expander::EpExpanderTopology;
pub use expander::{ExpanderGraph, ExpanderRouting, K_SHORTEST_MAX, RANDOM_WINDOW_START};
pub use fat_tree::{FatTree, FatTreeRouting};
pub use fully_connected::FullyConnected;
pub use multi_dim::{MultiDimTopology, PlannedRoute};
pub use registry::RoutingModeRegistry;
pub use ring::Ring;
pub use switch::Switch;
pub use switch_or_expander::SwitchOrExpander;
pub use types::{bw_gbps_to_bpns, Bandwidth, ChunkSize, DeviceId, Edge, EventTime, Latency, Route};

/// One-dimensional topology building block.
#[derive(Debug)]
pub enum BasicTopology {
    Ring(Ring),
    FullyConnected(FullyConnected),
    Switch(Switch),
    FatTree(FatTree),
    Expander(ExpanderGraph),
    EpExpander(EpExpanderTopology),
    SwitchOrExpander(SwitchOrExpander),
}

impl BasicTopology {
    pub fn npus_count(&self) -> usize {
        match self {
            BasicTopology::Ring(t) => t.npus_count(),
            BasicTopology::FullyConnected(t) => t.npus_count(),
            BasicTopology::Switch(t) => t.npus_count(),
            BasicTopology::FatTree(t) => t.npus_count(),
            BasicTopology::Expander(t) => t.npus_count(),
            BasicTopology::EpExpander(t) => t.npus_count(),
            BasicTopology::SwitchOrExpander(t) => t.npus_count(),
        }
    }

    pub fn devices_count(&self) -> usize {
        match self {
            BasicTopology::Ring(t) => t.devices_count(),
            BasicTopology::FullyConnected(t) => t.devices_count(),
            BasicTopology::Switch(t) => t.devices_count(),
            BasicTopology::FatTree(t) => t.devices_count(),
            BasicTopology::Expander(t) => t.devices_count(),
            BasicTopology::EpExpander(t) => t.devices_count(),
            BasicTopology::SwitchOrExpander(t) => t.devices_count(),
        }
    }

    /// Number of device slots the congestion-aware engine allocates.
    /// Matches `devices_count` except for the switch-or-expander hub.
    pub fn arena_size(&self) -> usize {
        match self {
            BasicTopology::SwitchOrExpander(t) => t.arena_size(),
            other => other.devices_count(),
        }
    }

    pub fn bandwidth(&self) -> Bandwidth {
        match self {
            BasicTopology::Ring(t) => t.bandwidth(),
            BasicTopology::FullyConnected(t) => t.bandwidth(),
            BasicTopology::Switch(t) => t.bandwidth(),
            BasicTopology::FatTree(t) => t.bandwidth(),
            BasicTopology::Expander(t) => t.bandwidth(),
            BasicTopology::EpExpander(t) => t.bandwidth(),
            BasicTopology::SwitchOrExpander(t) => t.bandwidth(),
        }
    }

    pub fn latency(&self) -> Latency {
        match self {
            BasicTopology::Ring(t) => t.latency(),
            BasicTopology::FullyConnected(t) => t.latency(),
            BasicTopology::Switch(t) => t.latency(),
            BasicTopology::FatTree(t) => t.latency(),
            BasicTopology::Expander(t) => t.latency(),
            BasicTopology::EpExpander(t) => t.latency(),
            BasicTopology::SwitchOrExpander(t) => t.latency(),
        }
    }

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        match self {
            BasicTopology::Ring(t) => t.route(src, dest),
            BasicTopology::FullyConnected(t) => t.route(src, dest),
            BasicTopology::Switch(t) => t.route(src, dest),
            BasicTopology::FatTree(t) => t.route(src, dest),
            BasicTopology::Expander(t) => t.route(src, dest),
            BasicTopology::EpExpander(t) => t.route(src, dest),
            BasicTopology::SwitchOrExpander(t) => t.route(src, dest),
        }
    }

    pub fn hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        match self {
            BasicTopology::Ring(t) => t.hops_count(src, dest),
            BasicTopology::FullyConnected(t) => t.hops_count(src, dest),
            BasicTopology::Switch(t) => t.hops_count(src, dest),
            BasicTopology::FatTree(t) => t.hops_count(src, dest),
            BasicTopology::Expander(t) => t.hops_count(src, dest),
            BasicTopology::EpExpander(t) => t.hops_count(src, dest),
            BasicTopology::SwitchOrExpander(t) => t.hops_count(src, dest),
        }
    }

    /// The links the congestion-aware engine installs at construction.
    pub fn edges(&self) -> Vec<Edge> {
        match self {
            BasicTopology::Ring(t) => t.edges(),
            BasicTopology::FullyConnected(t) => t.edges(),
            BasicTopology::Switch(t) => t.edges(),
            BasicTopology::FatTree(t) => t.edges(),
            BasicTopology::Expander(t) => t.edges(),
            BasicTopology::EpExpander(t) => t.edges(),
            BasicTopology::SwitchOrExpander(t) => t.edges(),
        }
    }
}

/// The full topology variant set: a single basic topology or a
/// multi-dimensional stack of them.
#[derive(Debug)]
pub enum Topology {
    Basic(BasicTopology),
    MultiDim(MultiDimTopology),
}

impl Topology {
    pub fn npus_count(&self) -> usize {
        match self {
            Topology::Basic(t) => t.npus_count(),
            Topology::MultiDim(t) => t.npus_count(),
        }
    }

    pub fn devices_count(&self) -> usize {
        match self {
            Topology::Basic(t) => t.devices_count(),
            Topology::MultiDim(t) => t.devices_count(),
        }
    }

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        match self {
            Topology::Basic(t) => t.route(src, dest),
            Topology::MultiDim(t) => t.route(src, dest),
        }
    }
}
