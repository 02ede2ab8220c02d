//! Expander topology for expert-parallel point-to-point traffic.
//!
//! Unlike [`ExpanderGraph`](crate::ExpanderGraph), which routes by graph
//! search, this topology replays a pre-computed weighted multi-path route
//! table. Adjacency is derived from the union of all route paths. Layer
//! permutations remap EP ranks onto expander nodes so successive layers
//! spread load across the fabric.

use crate::descriptor::{DescriptorError, EpRoutesDescriptor, RouteInfo};
use crate::types::{Bandwidth, DeviceId, Edge, Latency, Route};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug)]
pub struct EpExpanderTopology {
    node_count: usize,
    ep_node_count: usize,
    degree: usize,
    bandwidth: Bandwidth,
    latency: Latency,
    routes: HashMap<DeviceId, HashMap<DeviceId, Vec<RouteInfo>>>,
    adjacency: Vec<Vec<DeviceId>>,
    /// When > 0, permutations repeat every this many layers.
    num_permutation_layers: usize,
    layer_permutations: RefCell<HashMap<usize, Vec<DeviceId>>>,
    rng: RefCell<ChaCha8Rng>,
}

impl EpExpanderTopology {
    pub fn from_descriptor(
        descriptor: &EpRoutesDescriptor,
        bandwidth: Bandwidth,
        latency: Latency,
    ) -> Result<Self, DescriptorError> {
        assert!(bandwidth > 0.0);

        let node_count = descriptor.metadata.node_count;
        let ep_node_count = descriptor.metadata.ep_nodes.unwrap_or(node_count);
        let routes = descriptor.routes_by_id()?;

        // Derive adjacency from the union of all route paths.
        let mut adjacency: Vec<Vec<DeviceId>> = vec![Vec::new(); node_count];
        for destinations in routes.values() {
            for options in destinations.values() {
                for info in options {
                    for pair in info.path.windows(2) {
                        let (a, b) = (pair[0], pair[1]);
                        if !adjacency[a].contains(&b) {
                            adjacency[a].push(b);
                        }
                        if !adjacency[b].contains(&a) {
                            adjacency[b].push(a);
                        }
                    }
                }
            }
        }

        log::info!(
            "ep-expander: {} nodes, degree {}, routes for {} sources",
            node_count,
            descriptor.metadata.degree,
            routes.len(),
        );

        Ok(Self {
            node_count,
            ep_node_count,
            degree: descriptor.metadata.degree,
            bandwidth,
            latency,
            routes,
            adjacency,
            num_permutation_layers: 0,
            layer_permutations: RefCell::new(HashMap::new()),
            rng: RefCell::new(ChaCha8Rng::from_entropy()),
        })
    }

    /// Fix the route-selection RNG, for reproducible runs.
    pub fn set_seed(&self, seed: u64) {
        *self.rng.borrow_mut() = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn npus_count(&self) -> usize {
        self.node_count
    }

    pub fn devices_count(&self) -> usize {
        self.node_count
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn ep_node_count(&self) -> usize {
        self.ep_node_count
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn adjacency(&self) -> &[Vec<DeviceId>] {
        &self.adjacency
    }

    /// Limit the number of distinct layer permutations. `0` gives every
    /// layer its own permutation. Changing the limit invalidates the
    /// permutation cache.
    pub fn set_num_permutation_layers(&mut self, num_layers: usize) {
        self.num_permutation_layers = num_layers;
        self.layer_permutations.borrow_mut().clear();
    }

    pub fn num_permutation_layers(&self) -> usize {
        self.num_permutation_layers
    }

    fn select_route(&self, src: DeviceId, dest: DeviceId) -> RouteInfo {
        let options = self
            .routes
            .get(&src)
            .and_then(|destinations| destinations.get(&dest))
            .unwrap_or_else(|| panic!("no route table entry for ({}, {})", src, dest));
        assert!(!options.is_empty());

        if options.len() == 1 {
            return options[0].clone();
        }

        // Weighted pick: walk cumulative weights, residual mass lands on
        // the last bucket.
        let draw: f64 = self.rng.borrow_mut().gen();
        let mut cumulative = 0.0;
        for info in options {
            cumulative += info.weight;
            if draw < cumulative {
                return info.clone();
            }
        }
        options.last().unwrap().clone()
    }

    /// Route by weighted selection over the pre-computed options.
    /// Self-sends yield the one-device route.
    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        assert!(src < self.node_count);
        assert!(dest < self.node_count);
        if src == dest {
            return vec![src];
        }
        self.select_route(src, dest).path
    }

    /// The permutation of `[0, ep_node_count)` for a layer, generated on
    /// first use by shuffling with an RNG seeded from the effective layer
    /// id, so a given layer always maps ranks the same way.
    pub fn permutation(&self, layer: usize) -> Vec<DeviceId> {
        let effective = if self.num_permutation_layers > 0 {
            layer % self.num_permutation_layers
        } else {
            layer
        };
        if let Some(permutation) = self.layer_permutations.borrow().get(&effective) {
            return permutation.clone();
        }
        let mut permutation: Vec<DeviceId> = (0..self.ep_node_count).collect();
        let mut layer_rng = ChaCha8Rng::seed_from_u64(effective as u64);
        permutation.shuffle(&mut layer_rng);
        self.layer_permutations
            .borrow_mut()
            .insert(effective, permutation.clone());
        permutation
    }

    /// Route between the permuted images of `src` and `dest` for a layer.
    pub fn route_with_permutation(&self, src: DeviceId, dest: DeviceId, layer: usize) -> Route {
        assert!(src < self.node_count);
        assert!(dest < self.node_count);
        if src == dest {
            return vec![src];
        }
        let permutation = self.permutation(layer);
        self.route(permutation[src], permutation[dest])
    }

    /// Every pre-computed route option for the permuted pair, in declared
    /// order. Used for packet spraying.
    pub fn all_routes_with_permutation(
        &self,
        src: DeviceId,
        dest: DeviceId,
        layer: usize,
    ) -> Vec<Route> {
        assert!(src < self.node_count);
        assert!(dest < self.node_count);
        if src == dest {
            return vec![vec![src]];
        }
        let permutation = self.permutation(layer);
        let (permuted_src, permuted_dest) = (permutation[src], permutation[dest]);
        let options = self
            .routes
            .get(&permuted_src)
            .and_then(|destinations| destinations.get(&permuted_dest))
            .unwrap_or_else(|| {
                panic!("no route table entry for ({}, {})", permuted_src, permuted_dest)
            });
        options.iter().map(|info| info.path.clone()).collect()
    }

    pub fn hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        assert_ne!(src, dest);
        self.route(src, dest).len() - 1
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (node, neighbours) in self.adjacency.iter().enumerate() {
            for &neighbour in neighbours {
                if node < neighbour {
                    edges.push(Edge {
                        a: node,
                        b: neighbour,
                        bandwidth: self.bandwidth,
                        latency: self.latency,
                    });
                }
            }
        }
        edges
    }
}
