//! Three-tier k-ary fat tree.
//!
//! Device id layout, NPUs first, then the switch tiers bottom-up:
//!
//! ```text
//! [0, npus_count)                      NPUs
//! [npus_count, +k^2/2)                 leaf switches (k/2 per pod, k pods)
//! [.., +k^2/2)                         spine switches (k/2 per pod)
//! [.., +(k/2)^2)                       core switches, row-major (row, col)
//! ```
//!
//! Every leaf connects to every spine of its pod; the spine with in-pod
//! index `i` connects to every core in row `i`. NPUs are packed into
//! leaves in groups of `k/2`.

use crate::types::{Bandwidth, DeviceId, Edge, Latency, Route};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;

/// Up-routing choice for spine and core selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatTreeRouting {
    /// Spine row from the source leaf index, core column from the
    /// destination leaf index.
    #[default]
    Deterministic,
    /// Spine row and core column drawn uniformly from `[0, k/2)` at
    /// route time.
    Random,
}

impl FatTreeRouting {
    /// Parse a configured algorithm name. Unknown names fall back to
    /// deterministic routing with a warning.
    pub fn from_name(name: &str) -> Self {
        match name {
            "" | "Deterministic" => FatTreeRouting::Deterministic,
            "Random" => FatTreeRouting::Random,
            other => {
                log::warn!(
                    "unknown FatTree routing algorithm {:?}, defaulting to Deterministic",
                    other
                );
                FatTreeRouting::Deterministic
            }
        }
    }
}

#[derive(Debug)]
pub struct FatTree {
    npus_count: usize,
    k: usize,
    bandwidth: Bandwidth,
    latency: Latency,
    routing: FatTreeRouting,
    npu_to_leaf: Vec<usize>,
    npus_per_leaf: Vec<usize>,
    rng: RefCell<ChaCha8Rng>,
}

impl FatTree {
    pub fn new(
        npus_count: usize,
        k: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        routing: FatTreeRouting,
    ) -> Self {
        assert!(npus_count > 0);
        assert!(k > 0 && k % 2 == 0, "fat-tree radix must be even");
        assert!(
            npus_count <= k * k * k / 4,
            "a radix-{} fat tree hosts at most {} NPUs",
            k,
            k * k * k / 4,
        );
        assert!(bandwidth > 0.0);

        let leaves = k * k / 2;
        let half_k = k / 2;

        let mut npu_to_leaf = vec![0; npus_count];
        let mut npus_per_leaf = vec![0; leaves];
        let mut npu = 0;
        for leaf in 0..leaves {
            let group = half_k.min(npus_count - npu);
            npus_per_leaf[leaf] = group;
            for _ in 0..group {
                npu_to_leaf[npu] = leaf;
                npu += 1;
            }
            if npu == npus_count {
                break;
            }
        }

        Self {
            npus_count,
            k,
            bandwidth,
            latency,
            routing,
            npu_to_leaf,
            npus_per_leaf,
            rng: RefCell::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Fix the RNG used by random routing, for reproducible runs.
    pub fn set_seed(&self, seed: u64) {
        *self.rng.borrow_mut() = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    pub fn devices_count(&self) -> usize {
        // leaves + spines + cores
        self.npus_count + self.k * self.k + (self.k / 2) * (self.k / 2)
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    fn leaf_offset(&self) -> usize {
        self.npus_count
    }

    fn spine_offset(&self) -> usize {
        self.npus_count + self.k * self.k / 2
    }

    fn core_offset(&self) -> usize {
        self.npus_count + self.k * self.k
    }

    fn leaf_id(&self, leaf: usize) -> DeviceId {
        self.leaf_offset() + leaf
    }

    fn spine_id(&self, pod: usize, in_pod: usize) -> DeviceId {
        self.spine_offset() + pod * (self.k / 2) + in_pod
    }

    fn core_id(&self, row: usize, col: usize) -> DeviceId {
        self.core_offset() + row * (self.k / 2) + col
    }

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        assert!(src < self.npus_count);
        assert!(dest < self.npus_count);
        assert_ne!(src, dest);

        let half_k = self.k / 2;
        let src_leaf = self.npu_to_leaf[src];
        let dest_leaf = self.npu_to_leaf[dest];

        if src_leaf == dest_leaf {
            return vec![src, self.leaf_id(src_leaf), dest];
        }

        let src_pod = src_leaf / half_k;
        let dest_pod = dest_leaf / half_k;
        let src_leaf_in_pod = src_leaf % half_k;
        let dest_leaf_in_pod = dest_leaf % half_k;

        let spine_row = match self.routing {
            FatTreeRouting::Deterministic => src_leaf_in_pod,
            FatTreeRouting::Random => self.rng.borrow_mut().gen_range(0..half_k),
        };

        if src_pod == dest_pod {
            return vec![
                src,
                self.leaf_id(src_leaf),
                self.spine_id(src_pod, spine_row),
                self.leaf_id(dest_leaf),
                dest,
            ];
        }

        // Cross-pod: the core must sit in the chosen spine row, so the
        // destination-pod spine shares that row; only the column is free.
        let core_col = match self.routing {
            FatTreeRouting::Deterministic => dest_leaf_in_pod,
            FatTreeRouting::Random => self.rng.borrow_mut().gen_range(0..half_k),
        };

        vec![
            src,
            self.leaf_id(src_leaf),
            self.spine_id(src_pod, spine_row),
            self.core_id(spine_row, core_col),
            self.spine_id(dest_pod, spine_row),
            self.leaf_id(dest_leaf),
            dest,
        ]
    }

    pub fn hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        assert_ne!(src, dest);
        let half_k = self.k / 2;
        let src_leaf = self.npu_to_leaf[src];
        let dest_leaf = self.npu_to_leaf[dest];
        if src_leaf == dest_leaf {
            2
        } else if src_leaf / half_k == dest_leaf / half_k {
            4
        } else {
            6
        }
    }

    pub fn edges(&self) -> Vec<Edge> {
        let half_k = self.k / 2;
        let mut edges = Vec::new();
        let edge = |a, b| Edge {
            a,
            b,
            bandwidth: self.bandwidth,
            latency: self.latency,
        };

        // NPU <-> leaf
        let mut npu = 0;
        for (leaf, &count) in self.npus_per_leaf.iter().enumerate() {
            for _ in 0..count {
                edges.push(edge(npu, self.leaf_id(leaf)));
                npu += 1;
            }
        }

        // leaf <-> spine, full mesh within each pod
        for pod in 0..self.k {
            for leaf_in_pod in 0..half_k {
                for spine_in_pod in 0..half_k {
                    edges.push(edge(
                        self.leaf_id(pod * half_k + leaf_in_pod),
                        self.spine_id(pod, spine_in_pod),
                    ));
                }
            }
        }

        // spine <-> core: in-pod spine index selects the core row
        for pod in 0..self.k {
            for row in 0..half_k {
                for col in 0..half_k {
                    edges.push(edge(self.spine_id(pod, row), self.core_id(row, col)));
                }
            }
        }

        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn connected(tree: &FatTree, route: &[DeviceId]) -> bool {
        let mut pairs = HashSet::new();
        for e in tree.edges() {
            pairs.insert((e.a, e.b));
            pairs.insert((e.b, e.a));
        }
        route.windows(2).all(|w| pairs.contains(&(w[0], w[1])))
    }

    #[test]
    fn test_same_leaf_route() {
        let tree = FatTree::new(16, 4, 50.0, 500, FatTreeRouting::Deterministic);
        let route = tree.route(0, 1);
        assert_eq!(route.len(), 3);
        assert_eq!(route, vec![0, 16, 1]);
        assert_eq!(tree.hops_count(0, 1), 2);
    }

    #[test]
    fn test_same_pod_route() {
        let tree = FatTree::new(16, 4, 50.0, 500, FatTreeRouting::Deterministic);
        // NPUs 0..2 on leaf 0, NPUs 2..4 on leaf 1, both in pod 0
        let route = tree.route(0, 2);
        assert_eq!(route.len(), 5);
        assert!(connected(&tree, &route));
        assert_eq!(tree.hops_count(0, 2), 4);
    }

    #[test]
    fn test_cross_pod_route() {
        let tree = FatTree::new(16, 4, 50.0, 500, FatTreeRouting::Deterministic);
        let route = tree.route(0, 15);
        assert_eq!(route.len(), 7);
        assert_eq!(route[0], 0);
        assert_eq!(*route.last().unwrap(), 15);
        assert!(connected(&tree, &route));
        assert_eq!(tree.hops_count(0, 15), 6);
    }

    #[test]
    fn test_random_routes_stay_connected() {
        let tree = FatTree::new(16, 4, 50.0, 500, FatTreeRouting::Random);
        tree.set_seed(7);
        for src in 0..16 {
            for dest in 0..16 {
                if src == dest {
                    continue;
                }
                let route = tree.route(src, dest);
                assert_eq!(route[0], src);
                assert_eq!(*route.last().unwrap(), dest);
                assert!(connected(&tree, &route), "{:?}", route);
                assert!(matches!(route.len(), 3 | 5 | 7));
            }
        }
    }

    #[test]
    fn test_partially_populated_tree() {
        // 10 NPUs in a radix-4 tree: leaves 0..5 hold 2 each
        let tree = FatTree::new(10, 4, 50.0, 500, FatTreeRouting::Deterministic);
        let route = tree.route(0, 9);
        assert!(connected(&tree, &route));
    }

    #[test]
    #[should_panic]
    fn test_oversubscribed_npus_rejected() {
        FatTree::new(17, 4, 50.0, 500, FatTreeRouting::Deterministic);
    }

    #[test]
    fn test_routing_name_parsing() {
        assert_eq!(FatTreeRouting::from_name(""), FatTreeRouting::Deterministic);
        assert_eq!(FatTreeRouting::from_name("Random"), FatTreeRouting::Random);
        assert_eq!(
            FatTreeRouting::from_name("bogus"),
            FatTreeRouting::Deterministic
        );
    }
}
