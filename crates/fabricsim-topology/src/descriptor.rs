//! External descriptor ingestion.
//!
//! Two JSON document kinds feed the expander topologies:
//!
//! - the **expander adjacency descriptor** (`node_count`, `degree`,
//!   adjacency lists, optional A/B split groups), consumed by
//!   [`ExpanderGraph`](crate::ExpanderGraph);
//! - the **EP route descriptor** (`metadata` + pre-weighted multi-path
//!   route table), consumed by
//!   [`EpExpanderTopology`](crate::EpExpanderTopology).
//!
//! Failure to open or parse a descriptor is fatal at topology
//! construction.

use crate::types::DeviceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to read descriptor file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid descriptor: {0}")]
    Invalid(String),
}

/// Expander adjacency descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpanderDescriptor {
    /// Number of nodes described by the adjacency lists.
    pub node_count: usize,
    /// Declared degree of every node. A mismatch against the actual
    /// adjacency is reported as a warning, not an error.
    pub degree: usize,
    /// Adjacency list for the full connected graph: entry `i` holds the
    /// neighbours of node `i`.
    pub connected_graph_adjacency: Vec<Vec<DeviceId>>,
    /// Adjacency list used when the graph is consumed as two halves.
    #[serde(default)]
    pub split_graph_adjacency: Option<Vec<Vec<DeviceId>>>,
    /// The two disjoint halves of a split graph.
    #[serde(default)]
    pub groups: Option<SplitGroups>,
}

/// Node-id membership of the two halves of a split expander graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitGroups {
    #[serde(rename = "A")]
    pub a: Vec<DeviceId>,
    #[serde(rename = "B")]
    pub b: Vec<DeviceId>,
}

impl ExpanderDescriptor {
    /// Load and validate a descriptor from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse and validate a descriptor from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, DescriptorError> {
        let descriptor: ExpanderDescriptor = serde_json::from_str(s)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        if self.node_count == 0 {
            return Err(DescriptorError::Invalid("node_count must be > 0".into()));
        }
        if self.connected_graph_adjacency.len() != self.node_count {
            return Err(DescriptorError::Invalid(format!(
                "connected_graph_adjacency has {} entries for node_count {}",
                self.connected_graph_adjacency.len(),
                self.node_count,
            )));
        }
        for (node, neighbours) in self.connected_graph_adjacency.iter().enumerate() {
            for &n in neighbours {
                if n >= self.node_count {
                    return Err(DescriptorError::Invalid(format!(
                        "node {} references out-of-range neighbour {}",
                        node, n,
                    )));
                }
            }
        }
        if let Some(split) = &self.split_graph_adjacency {
            for (node, neighbours) in split.iter().enumerate() {
                for &n in neighbours {
                    if n >= self.node_count {
                        return Err(DescriptorError::Invalid(format!(
                            "split node {} references out-of-range neighbour {}",
                            node, n,
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// The adjacency list to use for split-mode construction.
    pub fn split_adjacency(&self) -> &Vec<Vec<DeviceId>> {
        self.split_graph_adjacency
            .as_ref()
            .unwrap_or(&self.connected_graph_adjacency)
    }
}

/// One pre-computed route option between an EP (src, dst) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfo {
    /// Device ids along the path, source and destination included.
    pub path: Vec<DeviceId>,
    /// Number of links traversed.
    pub hops: usize,
    /// Selection weight in (0, 1]. Weights per (src, dst) sum to ~1;
    /// residual probability mass lands on the last option.
    pub weight: f64,
}

/// Metadata block of an EP route descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpMetadata {
    pub node_count: usize,
    pub degree: usize,
    /// Number of nodes participating in layer permutations. Defaults to
    /// `node_count` when absent (no switch-only nodes).
    #[serde(default)]
    pub ep_nodes: Option<usize>,
}

/// EP route descriptor: weighted multi-path route table keyed by source
/// then destination id (ids serialized as JSON object keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpRoutesDescriptor {
    pub metadata: EpMetadata,
    pub routes: HashMap<String, HashMap<String, Vec<RouteInfo>>>,
}

impl EpRoutesDescriptor {
    /// Load and validate a descriptor from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse and validate a descriptor from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, DescriptorError> {
        let descriptor: EpRoutesDescriptor = serde_json::from_str(s)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        if self.metadata.node_count == 0 {
            return Err(DescriptorError::Invalid("node_count must be > 0".into()));
        }
        for (src, destinations) in &self.routes {
            for (dst, options) in destinations {
                if options.is_empty() {
                    return Err(DescriptorError::Invalid(format!(
                        "no route options for pair ({}, {})",
                        src, dst,
                    )));
                }
                for info in options {
                    if info.path.len() < 2 {
                        return Err(DescriptorError::Invalid(format!(
                            "degenerate path for pair ({}, {})",
                            src, dst,
                        )));
                    }
                    for &node in &info.path {
                        if node >= self.metadata.node_count {
                            return Err(DescriptorError::Invalid(format!(
                                "path for ({}, {}) references out-of-range node {}",
                                src, dst, node,
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode the string-keyed route table into id-keyed form.
    pub fn routes_by_id(
        &self,
    ) -> Result<HashMap<DeviceId, HashMap<DeviceId, Vec<RouteInfo>>>, DescriptorError> {
        let mut table = HashMap::new();
        for (src, destinations) in &self.routes {
            let src_id: DeviceId = src
                .parse()
                .map_err(|_| DescriptorError::Invalid(format!("bad source key {:?}", src)))?;
            let mut by_dst = HashMap::new();
            for (dst, options) in destinations {
                let dst_id: DeviceId = dst.parse().map_err(|_| {
                    DescriptorError::Invalid(format!("bad destination key {:?}", dst))
                })?;
                by_dst.insert(dst_id, options.clone());
            }
            table.insert(src_id, by_dst);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPANDER_JSON: &str = r#"{
        "node_count": 4,
        "degree": 2,
        "connected_graph_adjacency": [[1, 3], [0, 2], [1, 3], [2, 0]],
        "groups": { "A": [0, 1], "B": [2, 3] }
    }"#;

    #[test]
    fn test_parse_expander_descriptor() {
        let d = ExpanderDescriptor::from_str(EXPANDER_JSON).unwrap();
        assert_eq!(d.node_count, 4);
        assert_eq!(d.degree, 2);
        assert_eq!(d.connected_graph_adjacency[1], vec![0, 2]);
        assert_eq!(d.groups.unwrap().a, vec![0, 1]);
        assert!(d.split_graph_adjacency.is_none());
    }

    #[test]
    fn test_split_adjacency_falls_back_to_connected() {
        let d = ExpanderDescriptor::from_str(EXPANDER_JSON).unwrap();
        assert_eq!(d.split_adjacency(), &d.connected_graph_adjacency);
    }

    #[test]
    fn test_out_of_range_neighbour_rejected() {
        let bad = r#"{
            "node_count": 2,
            "degree": 1,
            "connected_graph_adjacency": [[1], [5]]
        }"#;
        assert!(matches!(
            ExpanderDescriptor::from_str(bad),
            Err(DescriptorError::Invalid(_))
        ));
    }

    #[test]
    fn test_adjacency_length_mismatch_rejected() {
        let bad = r#"{
            "node_count": 3,
            "degree": 1,
            "connected_graph_adjacency": [[1], [0]]
        }"#;
        assert!(ExpanderDescriptor::from_str(bad).is_err());
    }

    const EP_JSON: &str = r#"{
        "metadata": { "node_count": 4, "degree": 2 },
        "routes": {
            "0": {
                "1": [
                    { "path": [0, 1], "hops": 1, "weight": 0.75 },
                    { "path": [0, 2, 1], "hops": 2, "weight": 0.25 }
                ]
            }
        }
    }"#;

    #[test]
    fn test_parse_ep_descriptor() {
        let d = EpRoutesDescriptor::from_str(EP_JSON).unwrap();
        assert_eq!(d.metadata.node_count, 4);
        assert_eq!(d.metadata.ep_nodes, None);
        let table = d.routes_by_id().unwrap();
        let options = &table[&0][&1];
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].path, vec![0, 1]);
        assert!((options[0].weight - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ep_out_of_range_path_rejected() {
        let bad = r#"{
            "metadata": { "node_count": 2, "degree": 1 },
            "routes": { "0": { "1": [ { "path": [0, 9, 1], "hops": 2, "weight": 1.0 } ] } }
        }"#;
        assert!(matches!(
            EpRoutesDescriptor::from_str(bad),
            Err(DescriptorError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ExpanderDescriptor::from_file(Path::new("/nonexistent/graph.json"));
        assert!(matches!(err, Err(DescriptorError::Io(_))));
    }
}
