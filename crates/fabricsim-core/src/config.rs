//! TOML network-configuration ingestion.
//!
//! The configuration is a per-dimension columnar document: every list has
//! one entry per dimension, and the length of `topology` fixes the
//! dimension count. `NetworkConfig::build` turns a validated document
//! into a [`Topology`], loading expander descriptors from the configured
//! input files.

use fabricsim_topology::{
    BasicTopology, DescriptorError, EpExpanderTopology, EpRoutesDescriptor, ExpanderDescriptor,
    ExpanderGraph, ExpanderRouting, FatTree, FatTreeRouting, FullyConnected, MultiDimTopology,
    Ring, RoutingModeRegistry, Switch, SwitchOrExpander, Topology,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

const TOPOLOGY_NAMES: &[&str] = &[
    "Ring",
    "FullyConnected",
    "Switch",
    "ExpanderGraph",
    "SwitchOrExpander",
    "FatTree",
];

fn default_fattree_radix() -> usize {
    4
}

/// Network configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-dim topology kind. Length determines the dimension count.
    pub topology: Vec<String>,
    /// Per-dim NPU count; 1 means no communication on that dimension.
    pub npus_count: Vec<usize>,
    /// Per-dim link bandwidth in GB/s.
    pub bandwidth: Vec<f64>,
    /// Per-dim link latency in ns.
    pub latency: Vec<u64>,
    /// Per-dim external descriptor path; empty string means none.
    #[serde(default)]
    pub inputfile: Option<Vec<String>>,
    /// Per-dim routing algorithm: `ShortestPath`/`RandomTopK` for
    /// expanders, `Deterministic`/`Random` for fat trees.
    #[serde(default)]
    pub routing_algorithm: Option<Vec<String>>,
    /// Per-dim fat-tree radix.
    #[serde(default)]
    pub fattree_radix: Option<Vec<usize>>,
    /// Presence of this key (any value) enables spare-node resiliency in
    /// expander dims.
    #[serde(default)]
    pub resiliancy_npus: Option<toml::Value>,
}

impl NetworkConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: NetworkConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn dims_count(&self) -> usize {
        self.topology.len()
    }

    pub fn use_resiliency(&self) -> bool {
        self.resiliancy_npus.is_some()
    }

    fn per_dim<'a>(&self, list: &'a Option<Vec<String>>, dim: usize) -> &'a str {
        list.as_ref().map(|v| v[dim].as_str()).unwrap_or("")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let dims = self.dims_count();
        if dims == 0 {
            return Err(ConfigError::Validation(
                "topology list must not be empty".to_string(),
            ));
        }

        let check_len = |name: &str, len: usize| {
            if len != dims {
                Err(ConfigError::Validation(format!(
                    "length of {} ({}) doesn't match dimension count ({})",
                    name, len, dims,
                )))
            } else {
                Ok(())
            }
        };
        check_len("npus_count", self.npus_count.len())?;
        check_len("bandwidth", self.bandwidth.len())?;
        check_len("latency", self.latency.len())?;
        if let Some(inputfile) = &self.inputfile {
            check_len("inputfile", inputfile.len())?;
        }
        if let Some(routing) = &self.routing_algorithm {
            check_len("routing_algorithm", routing.len())?;
        }
        if let Some(radix) = &self.fattree_radix {
            check_len("fattree_radix", radix.len())?;
        }

        for name in &self.topology {
            if !TOPOLOGY_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "topology name {:?} not supported",
                    name,
                )));
            }
        }
        for &npus in &self.npus_count {
            if npus < 1 {
                return Err(ConfigError::Validation(
                    "npus_count entries must be at least 1".to_string(),
                ));
            }
        }
        for &bandwidth in &self.bandwidth {
            if bandwidth <= 0.0 {
                return Err(ConfigError::Validation(
                    "bandwidth entries must be larger than 0".to_string(),
                ));
            }
        }

        for (dim, name) in self.topology.iter().enumerate() {
            if name == "FatTree" {
                let radix = self.fattree_radix_for(dim);
                if radix == 0 || radix % 2 != 0 {
                    return Err(ConfigError::Validation(format!(
                        "fattree_radix ({}) must be a positive even number",
                        radix,
                    )));
                }
                if self.npus_count[dim] > radix * radix * radix / 4 {
                    return Err(ConfigError::Validation(format!(
                        "a radix-{} fat tree hosts at most {} NPUs, got {}",
                        radix,
                        radix * radix * radix / 4,
                        self.npus_count[dim],
                    )));
                }
            }
        }
        Ok(())
    }

    fn fattree_radix_for(&self, dim: usize) -> usize {
        self.fattree_radix
            .as_ref()
            .map(|v| v[dim])
            .unwrap_or_else(default_fattree_radix)
    }

    fn descriptor_path(&self, dim: usize, kind: &str) -> Result<String, ConfigError> {
        let path = self
            .inputfile
            .as_ref()
            .map(|v| v[dim].clone())
            .unwrap_or_default();
        if path.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} dimension {} requires an inputfile",
                kind, dim,
            )));
        }
        Ok(path)
    }

    /// Construct the topology this configuration describes. The routing
    /// mode registry is threaded into any switch-or-expander dimension.
    pub fn build(&self, modes: &RoutingModeRegistry) -> Result<Topology, ConfigError> {
        let mut dims = Vec::with_capacity(self.dims_count());
        for (dim, name) in self.topology.iter().enumerate() {
            let npus = self.npus_count[dim];
            let bandwidth = self.bandwidth[dim];
            let latency = self.latency[dim];
            let algorithm = self.per_dim(&self.routing_algorithm, dim);

            let built = match name.as_str() {
                "Ring" => BasicTopology::Ring(Ring::new(npus, bandwidth, latency)),
                "FullyConnected" => {
                    BasicTopology::FullyConnected(FullyConnected::new(npus, bandwidth, latency))
                }
                "Switch" => BasicTopology::Switch(Switch::new(npus, bandwidth, latency)),
                "FatTree" => BasicTopology::FatTree(FatTree::new(
                    npus,
                    self.fattree_radix_for(dim),
                    bandwidth,
                    latency,
                    FatTreeRouting::from_name(algorithm),
                )),
                "ExpanderGraph" => {
                    let path = self.descriptor_path(dim, "ExpanderGraph")?;
                    let descriptor = ExpanderDescriptor::from_file(Path::new(&path))?;
                    BasicTopology::Expander(ExpanderGraph::from_descriptor(
                        npus,
                        bandwidth,
                        latency,
                        &descriptor,
                        self.use_resiliency(),
                        ExpanderRouting::from_name(algorithm),
                    )?)
                }
                "SwitchOrExpander" => {
                    let path = self.descriptor_path(dim, "SwitchOrExpander")?;
                    let descriptor = ExpanderDescriptor::from_file(Path::new(&path))?;
                    BasicTopology::SwitchOrExpander(SwitchOrExpander::from_descriptor(
                        npus,
                        bandwidth,
                        latency,
                        &descriptor,
                        self.use_resiliency(),
                        ExpanderRouting::from_name(algorithm),
                        modes.clone(),
                    )?)
                }
                other => {
                    return Err(ConfigError::Validation(format!(
                        "topology name {:?} not supported",
                        other,
                    )))
                }
            };
            dims.push(built);
        }

        if dims.len() == 1 {
            Ok(Topology::Basic(dims.pop().unwrap()))
        } else {
            Ok(Topology::MultiDim(MultiDimTopology::from_dims(dims)))
        }
    }
}

/// Build an EP expander topology directly from its routes file. EP
/// expanders are not part of the columnar network config; harnesses
/// construct them from the descriptor the EP planner emits.
pub fn build_ep_expander(
    routes_file: &Path,
    bandwidth: f64,
    latency: u64,
) -> Result<EpExpanderTopology, ConfigError> {
    let descriptor = EpRoutesDescriptor::from_file(routes_file)?;
    Ok(EpExpanderTopology::from_descriptor(
        &descriptor,
        bandwidth,
        latency,
    )?)
}
