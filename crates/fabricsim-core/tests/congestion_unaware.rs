//! End-to-end congestion-unaware scenarios.

use fabricsim_core::{AnalyticalNetwork, NetworkConfig};
use fabricsim_topology::{
    BasicTopology, DeviceId, ExpanderDescriptor, RoutingModeRegistry, Topology,
};
use std::path::PathBuf;

const MIB: u64 = 1_048_576;

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

fn build(config: &str) -> AnalyticalNetwork {
    let topology = NetworkConfig::from_str(config)
        .unwrap()
        .build(&RoutingModeRegistry::new())
        .unwrap();
    AnalyticalNetwork::new(topology)
}

#[test]
fn test_ring() {
    let network = build(
        r#"
topology = ["Ring"]
npus_count = [8]
bandwidth = [50.0]
latency = [500]
"#,
    );
    assert_eq!(network.send(1, 4, MIB), 22_471);
}

#[test]
fn test_fully_connected() {
    let network = build(
        r#"
topology = ["FullyConnected"]
npus_count = [8]
bandwidth = [50.0]
latency = [500]
"#,
    );
    assert_eq!(network.send(1, 4, MIB), 21_471);
}

#[test]
fn test_switch() {
    let network = build(
        r#"
topology = ["Switch"]
npus_count = [8]
bandwidth = [50.0]
latency = [500]
"#,
    );
    assert_eq!(network.send(1, 4, MIB), 21_971);
}

#[test]
fn test_ring_fully_connected_switch() {
    let network = build(
        r#"
topology = ["Ring", "FullyConnected", "Switch"]
npus_count = [2, 8, 4]
bandwidth = [200.0, 100.0, 50.0]
latency = [50, 500, 2000]
"#,
    );
    // one transfer per dimension
    assert_eq!(network.send(0, 1, MIB), 5_292);
    assert_eq!(network.send(37, 41, MIB), 10_985);
    assert_eq!(network.send(26, 42, MIB), 24_971);
}

#[test]
fn test_expander_graph() {
    let descriptor = ExpanderDescriptor {
        node_count: 16,
        degree: 8,
        connected_graph_adjacency: circulant(16, &[1, 2, 3, 4]),
        split_graph_adjacency: None,
        groups: None,
    };
    let path: PathBuf = std::env::temp_dir().join(format!(
        "fabricsim-expander-unaware-{}.json",
        std::process::id(),
    ));
    std::fs::write(&path, serde_json::to_string(&descriptor).unwrap()).unwrap();

    let network = build(&format!(
        r#"
topology = ["ExpanderGraph"]
npus_count = [16]
bandwidth = [50.0]
latency = [500]
inputfile = ["{}"]
"#,
        path.display(),
    ));

    let Topology::Basic(BasicTopology::Expander(graph)) = network.topology() else {
        panic!("expected an expander graph");
    };
    for node in 0..16 {
        assert_eq!(graph.adjacency()[node].len(), 8);
    }

    let mut total_distance = 0usize;
    let mut count = 0usize;
    for src in 0..8 {
        for dest in 0..16 {
            if src == dest {
                continue;
            }
            let distance = graph.distance(src, dest);
            assert!(distance <= 16 / 2);
            total_distance += distance;
            count += 1;

            // 1-byte chunks: delay collapses to distance * latency
            assert_eq!(network.send(src, dest, 1), (distance as u64) * 500);
        }
    }
    let average = total_distance as f64 / count as f64;
    assert!(average <= 16.0 / 4.0);
    std::fs::remove_file(path).ok();
}
