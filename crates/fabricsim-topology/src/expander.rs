//! Expander-graph topology built from an external adjacency descriptor.
//!
//! Routing is either deterministic shortest-path (BFS, first-found under
//! the adjacency-list neighbour order) or randomized over Yen's k-shortest
//! loopless paths. Routes, path lists, and distances are cached per
//! (src, dest) pair; caches are interior-mutable and only written on miss
//! during single-threaded queries.

use crate::descriptor::{DescriptorError, ExpanderDescriptor};
use crate::types::{Bandwidth, DeviceId, Edge, Latency, Route};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// Upper bound on the number of paths Yen's enumeration caches per pair.
pub const K_SHORTEST_MAX: usize = 16;

/// When more than this many paths are cached, randomized selection
/// samples only from index `RANDOM_WINDOW_START` onward, biasing queries
/// toward the longer paths Yen produces later.
pub const RANDOM_WINDOW_START: usize = 4;

/// Route-selection policy for an expander graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpanderRouting {
    /// Always the BFS shortest path.
    #[default]
    ShortestPath,
    /// Uniform pick from the tail of the cached k-shortest list.
    RandomTopK,
}

impl ExpanderRouting {
    /// Parse a configured algorithm name. Unknown names fall back to
    /// shortest-path routing with a warning.
    pub fn from_name(name: &str) -> Self {
        match name {
            "" | "ShortestPath" => ExpanderRouting::ShortestPath,
            "RandomTopK" => ExpanderRouting::RandomTopK,
            other => {
                log::warn!(
                    "unknown expander routing algorithm {:?}, defaulting to ShortestPath",
                    other
                );
                ExpanderRouting::ShortestPath
            }
        }
    }
}

#[derive(Debug)]
pub struct ExpanderGraph {
    npus_count: usize,
    nodes_count: usize,
    degree: usize,
    bandwidth: Bandwidth,
    latency: Latency,
    routing: ExpanderRouting,
    adjacency: Vec<Vec<DeviceId>>,
    route_cache: RefCell<HashMap<(DeviceId, DeviceId), Route>>,
    top_k_cache: RefCell<HashMap<(DeviceId, DeviceId), Vec<Route>>>,
    distance_cache: RefCell<HashMap<(DeviceId, DeviceId), usize>>,
    rng: RefCell<ChaCha8Rng>,
}

impl ExpanderGraph {
    /// Build an expander over `npus_count` NPUs from a descriptor.
    ///
    /// With `resiliency`, `npus_count / 8` spare nodes join the graph as
    /// routable intermediates, so the node total is `npus_count +
    /// npus_count / 8`. The descriptor must describe exactly that many
    /// nodes (full mode) or twice as many (split mode, in which case the
    /// group-A half is renumbered densely from zero).
    pub fn from_descriptor(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        descriptor: &ExpanderDescriptor,
        resiliency: bool,
        routing: ExpanderRouting,
    ) -> Result<Self, DescriptorError> {
        assert!(npus_count > 0);
        assert!(bandwidth > 0.0);

        let spares = if resiliency { npus_count / 8 } else { 0 };
        let nodes_count = npus_count + spares;
        let mut adjacency = vec![Vec::new(); nodes_count];

        if descriptor.node_count == nodes_count {
            log::info!("expander: full graph, {} nodes", nodes_count);
            for (node, neighbours) in descriptor.connected_graph_adjacency.iter().enumerate() {
                for &neighbour in neighbours {
                    if node < neighbour {
                        Self::connect(&mut adjacency, node, neighbour);
                    }
                }
            }
        } else if descriptor.node_count == 2 * nodes_count {
            log::info!(
                "expander: split graph, {} nodes from a {}-node descriptor",
                nodes_count,
                descriptor.node_count,
            );
            let groups = descriptor.groups.as_ref().ok_or_else(|| {
                DescriptorError::Invalid("split-mode descriptor is missing groups".into())
            })?;
            if groups.a.len() != nodes_count {
                return Err(DescriptorError::Invalid(format!(
                    "group A has {} members, expected {}",
                    groups.a.len(),
                    nodes_count,
                )));
            }
            let node_to_local: HashMap<DeviceId, DeviceId> = groups
                .a
                .iter()
                .enumerate()
                .map(|(local, &node)| (node, local))
                .collect();
            let split = descriptor.split_adjacency();
            for (node, neighbours) in split.iter().enumerate() {
                let Some(&local) = node_to_local.get(&node) else {
                    continue;
                };
                for neighbour in neighbours {
                    if let Some(&neighbour_local) = node_to_local.get(neighbour) {
                        if local < neighbour_local {
                            Self::connect(&mut adjacency, local, neighbour_local);
                        }
                    }
                }
            }
        } else {
            return Err(DescriptorError::Invalid(format!(
                "descriptor node_count {} matches neither {} (full) nor {} (split)",
                descriptor.node_count,
                nodes_count,
                2 * nodes_count,
            )));
        }

        for (node, neighbours) in adjacency.iter().enumerate() {
            if neighbours.len() != descriptor.degree {
                log::warn!(
                    "expander node {} has degree {}, expected {}",
                    node,
                    neighbours.len(),
                    descriptor.degree,
                );
            }
        }

        Ok(Self {
            npus_count,
            nodes_count,
            degree: descriptor.degree,
            bandwidth,
            latency,
            routing,
            adjacency,
            route_cache: RefCell::new(HashMap::new()),
            top_k_cache: RefCell::new(HashMap::new()),
            distance_cache: RefCell::new(HashMap::new()),
            rng: RefCell::new(ChaCha8Rng::from_entropy()),
        })
    }

    /// Install a bidirectional adjacency entry. Self-loops and duplicate
    /// edges are logged and ignored.
    fn connect(adjacency: &mut [Vec<DeviceId>], src: DeviceId, dest: DeviceId) {
        assert!(src < adjacency.len());
        assert!(dest < adjacency.len());
        if src == dest {
            log::warn!("ignoring self-connection request for node {}", src);
            return;
        }
        if adjacency[src].contains(&dest) {
            log::warn!("ignoring duplicate connection {} <-> {}", src, dest);
            return;
        }
        adjacency[src].push(dest);
        adjacency[dest].push(src);
    }

    /// Fix the RNG used by `RandomTopK` selection, for reproducible runs.
    pub fn set_seed(&self, seed: u64) {
        *self.rng.borrow_mut() = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    /// Total routable nodes, spares included.
    pub fn devices_count(&self) -> usize {
        self.nodes_count
    }

    pub fn degree(&self) -> usize {
        self.degree
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

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        assert!(src < self.nodes_count);
        assert!(dest < self.nodes_count);
        assert_ne!(src, dest);
        match self.routing {
            ExpanderRouting::ShortestPath => self.shortest_route(src, dest),
            ExpanderRouting::RandomTopK => self.random_top_k_route(src, dest),
        }
    }

    /// The BFS shortest path, cached. Ties resolve to the first path
    /// found under the adjacency-list neighbour order.
    pub fn shortest_route(&self, src: DeviceId, dest: DeviceId) -> Route {
        assert_ne!(src, dest);
        if let Some(route) = self.route_cache.borrow().get(&(src, dest)) {
            return route.clone();
        }
        let route = self
            .bfs(src, dest, &HashSet::new(), &HashSet::new())
            .unwrap_or_else(|| panic!("no path between {} and {}", src, dest));
        self.route_cache
            .borrow_mut()
            .insert((src, dest), route.clone());
        route
    }

    fn random_top_k_route(&self, src: DeviceId, dest: DeviceId) -> Route {
        if !self.top_k_cache.borrow().contains_key(&(src, dest)) {
            let paths = self.yen_k_shortest(src, dest);
            self.top_k_cache.borrow_mut().insert((src, dest), paths);
        }
        let cache = self.top_k_cache.borrow();
        let paths = &cache[&(src, dest)];
        let start = if paths.len() > RANDOM_WINDOW_START {
            RANDOM_WINDOW_START
        } else {
            0
        };
        let pick = self.rng.borrow_mut().gen_range(start..paths.len());
        paths[pick].clone()
    }

    /// The k-shortest loopless paths list for a pair, cached on first use.
    pub fn k_shortest_routes(&self, src: DeviceId, dest: DeviceId) -> Vec<Route> {
        assert_ne!(src, dest);
        if let Some(paths) = self.top_k_cache.borrow().get(&(src, dest)) {
            return paths.clone();
        }
        let paths = self.yen_k_shortest(src, dest);
        self.top_k_cache
            .borrow_mut()
            .insert((src, dest), paths.clone());
        paths
    }

    /// Yen's algorithm: iterated spur search with node and edge bans,
    /// candidates admitted shortest-first with insertion-order ties.
    fn yen_k_shortest(&self, src: DeviceId, dest: DeviceId) -> Vec<Route> {
        let shortest = self
            .bfs(src, dest, &HashSet::new(), &HashSet::new())
            .unwrap_or_else(|| panic!("no path between {} and {}", src, dest));
        let mut paths = vec![shortest];
        let mut candidates: Vec<Route> = Vec::new();

        while paths.len() < K_SHORTEST_MAX {
            let prev = paths.last().unwrap().clone();
            for i in 0..prev.len() - 1 {
                let spur = prev[i];
                let root = &prev[..=i];

                let banned_nodes: HashSet<DeviceId> = root[..i].iter().copied().collect();
                let mut banned_edges: HashSet<(DeviceId, DeviceId)> = HashSet::new();
                for path in &paths {
                    if path.len() > i + 1 && path[..=i] == *root {
                        banned_edges.insert((path[i], path[i + 1]));
                    }
                }

                if let Some(spur_path) = self.bfs(spur, dest, &banned_nodes, &banned_edges) {
                    let mut candidate = root[..i].to_vec();
                    candidate.extend(spur_path);
                    if !paths.contains(&candidate) && !candidates.contains(&candidate) {
                        candidates.push(candidate);
                    }
                }
            }

            if candidates.is_empty() {
                break;
            }
            let best = candidates
                .iter()
                .enumerate()
                .min_by_key(|(index, path)| (path.len(), *index))
                .map(|(index, _)| index)
                .unwrap();
            paths.push(candidates.remove(best));
        }

        paths
    }

    fn bfs(
        &self,
        src: DeviceId,
        dest: DeviceId,
        banned_nodes: &HashSet<DeviceId>,
        banned_edges: &HashSet<(DeviceId, DeviceId)>,
    ) -> Option<Route> {
        let mut parent: HashMap<DeviceId, DeviceId> = HashMap::new();
        let mut visited: HashSet<DeviceId> = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(src);
        visited.insert(src);

        'search: while let Some(current) = queue.pop_front() {
            for &neighbour in &self.adjacency[current] {
                if visited.contains(&neighbour)
                    || banned_nodes.contains(&neighbour)
                    || banned_edges.contains(&(current, neighbour))
                {
                    continue;
                }
                visited.insert(neighbour);
                parent.insert(neighbour, current);
                if neighbour == dest {
                    break 'search;
                }
                queue.push_back(neighbour);
            }
        }

        if !parent.contains_key(&dest) {
            return None;
        }
        let mut path = vec![dest];
        let mut current = dest;
        while current != src {
            current = parent[&current];
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Shortest-path distance in hops, Dijkstra over unit edge weights,
    /// cached per pair.
    pub fn distance(&self, src: DeviceId, dest: DeviceId) -> usize {
        if src == dest {
            return 0;
        }
        if let Some(&distance) = self.distance_cache.borrow().get(&(src, dest)) {
            return distance;
        }

        let mut dist = vec![usize::MAX; self.nodes_count];
        let mut heap = BinaryHeap::new();
        dist[src] = 0;
        heap.push(Reverse((0usize, src)));

        while let Some(Reverse((d, node))) = heap.pop() {
            if node == dest {
                self.distance_cache.borrow_mut().insert((src, dest), d);
                return d;
            }
            if d > dist[node] {
                continue;
            }
            for &neighbour in &self.adjacency[node] {
                let next = d + 1;
                if next < dist[neighbour] {
                    dist[neighbour] = next;
                    heap.push(Reverse((next, neighbour)));
                }
            }
        }

        panic!("no path between {} and {}", src, dest);
    }

    pub fn hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        assert_ne!(src, dest);
        self.distance(src, dest)
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
