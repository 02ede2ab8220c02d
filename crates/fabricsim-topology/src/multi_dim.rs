//! Multi-dimensional topology: a stack of basic topologies, one per
//! dimension, routed dimension by dimension.
//!
//! NPU ids and per-dim coordinates are in mixed-radix bijection with
//! dimension 0 least significant: `id = sum coord[d] * prod(npus[e], e < d)`.
//!
//! Routes are emitted entirely in global-id space. When a per-dim route
//! passes through that dimension's auxiliary devices (switch hubs,
//! fat-tree switches), each `(dim, slice, local id)` triple is assigned a
//! global id above `npus_count` on first use, and the links along the
//! spliced segment are synthesized with the dimension's bandwidth and
//! latency the first time the transition appears.

use crate::types::{DeviceId, Edge, Route};
use crate::BasicTopology;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// A global-id route plus the link specifications the congestion-aware
/// engine must materialize before a chunk can traverse it.
#[derive(Debug, Clone)]
pub struct PlannedRoute {
    pub path: Route,
    pub links: Vec<Edge>,
}

#[derive(Debug)]
pub struct MultiDimTopology {
    dims: Vec<BasicTopology>,
    npus_count: usize,
    /// (dim, slice, local id) -> lazily allocated global auxiliary id.
    aux_ids: RefCell<HashMap<(usize, usize, DeviceId), DeviceId>>,
    next_aux_id: Cell<DeviceId>,
}

impl Default for MultiDimTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiDimTopology {
    pub fn new() -> Self {
        Self {
            dims: Vec::new(),
            npus_count: 1,
            aux_ids: RefCell::new(HashMap::new()),
            next_aux_id: Cell::new(1),
        }
    }

    pub fn from_dims(dims: Vec<BasicTopology>) -> Self {
        let mut topology = Self::new();
        for dim in dims {
            topology.append_dimension(dim);
        }
        topology
    }

    /// Append one dimension, validating that the dimension can route
    /// between every NPU pair it owns.
    pub fn append_dimension(&mut self, dim: BasicTopology) {
        let npus = dim.npus_count();
        assert!(npus > 0);
        for src in 0..npus {
            for dest in 0..npus {
                if src == dest {
                    continue;
                }
                let route = dim.route(src, dest);
                assert!(!route.is_empty());
                assert_eq!(route[0], src);
                assert_eq!(*route.last().unwrap(), dest);
            }
        }
        self.npus_count *= npus;
        self.next_aux_id.set(self.npus_count);
        self.aux_ids.borrow_mut().clear();
        self.dims.push(dim);
    }

    pub fn dims_count(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[BasicTopology] {
        &self.dims
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    /// NPUs plus the auxiliary devices allocated so far.
    pub fn devices_count(&self) -> usize {
        self.npus_count + self.aux_ids.borrow().len()
    }

    pub fn npus_count_per_dim(&self) -> Vec<usize> {
        self.dims.iter().map(|dim| dim.npus_count()).collect()
    }

    /// Decompose an NPU id into per-dim coordinates.
    pub fn translate_address(&self, npu_id: DeviceId) -> Vec<usize> {
        assert!(npu_id < self.npus_count);
        let mut address = Vec::with_capacity(self.dims.len());
        let mut leftover = npu_id;
        for dim in &self.dims {
            address.push(leftover % dim.npus_count());
            leftover /= dim.npus_count();
        }
        address
    }

    /// Recompose per-dim coordinates into an NPU id.
    pub fn address_to_id(&self, address: &[usize]) -> DeviceId {
        assert_eq!(address.len(), self.dims.len());
        let mut id = 0;
        let mut radix = 1;
        for (coord, dim) in address.iter().zip(&self.dims) {
            assert!(*coord < dim.npus_count());
            id += coord * radix;
            radix *= dim.npus_count();
        }
        id
    }

    /// Index of the slice a route through `dim` belongs to: the mixed-radix
    /// encoding of every other dimension's coordinate.
    fn slice_index(&self, dim: usize, address: &[usize]) -> usize {
        let mut index = 0;
        for (d, coord) in address.iter().enumerate() {
            if d == dim {
                continue;
            }
            index = index * self.dims[d].npus_count() + coord;
        }
        index
    }

    fn aux_id(&self, dim: usize, slice: usize, local: DeviceId) -> DeviceId {
        let mut aux_ids = self.aux_ids.borrow_mut();
        *aux_ids.entry((dim, slice, local)).or_insert_with(|| {
            let id = self.next_aux_id.get();
            self.next_aux_id.set(id + 1);
            id
        })
    }

    /// Dimension-ordered route: walk dimensions from least significant,
    /// splicing each differing dimension's local route into global-id
    /// space. The first node of each sub-route is skipped so boundary
    /// devices are not duplicated.
    pub fn plan_route(&self, src: DeviceId, dest: DeviceId) -> PlannedRoute {
        assert!(src < self.npus_count);
        assert!(dest < self.npus_count);
        assert_ne!(src, dest);

        let dest_address = self.translate_address(dest);
        let mut address = self.translate_address(src);
        let mut path = vec![src];
        let mut links = Vec::new();
        let mut previous = src;

        for (d, dim) in self.dims.iter().enumerate() {
            if address[d] == dest_address[d] {
                continue;
            }
            let local_route = dim.route(address[d], dest_address[d]);
            let slice = self.slice_index(d, &address);
            for &local in &local_route[1..] {
                let global = if local < dim.npus_count() {
                    address[d] = local;
                    self.address_to_id(&address)
                } else {
                    self.aux_id(d, slice, local)
                };
                links.push(Edge {
                    a: previous,
                    b: global,
                    bandwidth: dim.bandwidth(),
                    latency: dim.latency(),
                });
                path.push(global);
                previous = global;
            }
        }

        assert_eq!(path[0], src);
        assert_eq!(*path.last().unwrap(), dest);
        assert_eq!(links.len(), path.len() - 1);
        PlannedRoute { path, links }
    }

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        self.plan_route(src, dest).path
    }
}
