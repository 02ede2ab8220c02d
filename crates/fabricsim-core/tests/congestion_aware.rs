//! End-to-end congestion-aware scenarios.

use fabricsim_core::{simulate_all_gather, Chunk, Network, NetworkConfig};
use fabricsim_topology::{
    BasicTopology, DeviceId, ExpanderDescriptor, RoutingModeRegistry, Topology,
};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

const MIB: u64 = 1_048_576;

/// Circulant graph adjacency: node `i` connects to `i +- o` for each offset.
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

fn write_expander_descriptor(name: &str, nodes: usize) -> PathBuf {
    let descriptor = ExpanderDescriptor {
        node_count: nodes,
        degree: 8,
        connected_graph_adjacency: circulant(nodes, &[1, 2, 3, 4]),
        split_graph_adjacency: None,
        groups: None,
    };
    let path = std::env::temp_dir().join(format!(
        "fabricsim-{}-{}-{}.json",
        name,
        nodes,
        std::process::id(),
    ));
    std::fs::write(&path, serde_json::to_string(&descriptor).unwrap()).unwrap();
    path
}

fn build(config: &str) -> Topology {
    NetworkConfig::from_str(config)
        .unwrap()
        .build(&RoutingModeRegistry::new())
        .unwrap()
}

/// Send one chunk on an otherwise idle network and return how long the
/// transfer took.
fn send_one(network: &mut Network, src: usize, dest: usize, size: u64) -> u64 {
    let start = network.current_time();
    let route = network.route(src, dest);
    let completed = Rc::new(Cell::new(0));
    let observer = Rc::clone(&completed);
    network.send(Chunk::new(
        size,
        route,
        Box::new(move |time| observer.set(time)),
    ));
    network.run();
    completed.get() - start
}

#[test]
fn test_ring() {
    let topology = build(
        r#"
topology = ["Ring"]
npus_count = [8]
bandwidth = [50.0]
latency = [500]
"#,
    );
    let mut network = Network::new(topology);
    assert_eq!(send_one(&mut network, 1, 4, MIB), 64_413);
}

#[test]
fn test_fully_connected() {
    let topology = build(
        r#"
topology = ["FullyConnected"]
npus_count = [8]
bandwidth = [50.0]
latency = [500]
"#,
    );
    let mut network = Network::new(topology);
    assert_eq!(send_one(&mut network, 1, 4, MIB), 21_471);
}

#[test]
fn test_switch() {
    let topology = build(
        r#"
topology = ["Switch"]
npus_count = [8]
bandwidth = [50.0]
latency = [500]
"#,
    );
    let mut network = Network::new(topology);
    assert_eq!(send_one(&mut network, 1, 4, MIB), 42_942);
}

#[test]
fn test_all_gather_on_ring() {
    let topology = build(
        r#"
topology = ["Ring"]
npus_count = [8]
bandwidth = [50.0]
latency = [500]
"#,
    );
    let mut network = Network::new(topology);
    let (total, completed) = simulate_all_gather(&mut network, MIB);
    assert_eq!(completed, 8 * 7);
    assert_eq!(total, 210_710);
}

#[test]
fn test_expander_graph() {
    let path = write_expander_descriptor("expander-aware", 16);
    let config = format!(
        r#"
topology = ["ExpanderGraph"]
npus_count = [16]
bandwidth = [50.0]
latency = [500]
inputfile = ["{}"]
"#,
        path.display(),
    );
    let topology = build(&config);
    let Topology::Basic(BasicTopology::Expander(graph)) = &topology else {
        panic!("expected an expander graph");
    };
    for node in 0..16 {
        assert_eq!(graph.adjacency()[node].len(), 8);
    }

    let mut total_distance = 0usize;
    let mut count = 0usize;
    let mut network = Network::new(topology);
    for src in 0..8 {
        for dest in 0..16 {
            if src == dest {
                continue;
            }
            let route = network.route(src, dest);
            assert!(route.len() <= 16 / 2);
            total_distance += route.len();
            count += 1;

            // 1-byte chunks: completion is latency-bound per hop
            let hops = route.len() - 1;
            let start = network.current_time();
            let completed = Rc::new(Cell::new(0));
            let observer = Rc::clone(&completed);
            network.send(Chunk::new(
                1,
                route,
                Box::new(move |time| observer.set(time)),
            ));
            network.run();
            assert_eq!(completed.get() - start, (hops as u64) * 500);
        }
    }
    let average = total_distance as f64 / count as f64;
    assert!(average <= 16.0 / 4.0);
    std::fs::remove_file(path).ok();
}

#[test]
fn test_expander_graph_with_resiliency() {
    // 32 NPUs plus 32/8 spares: the descriptor covers all 36 nodes
    let path = write_expander_descriptor("expander-resilient", 36);
    let config = format!(
        r#"
topology = ["ExpanderGraph"]
npus_count = [32]
bandwidth = [50.0]
latency = [500]
inputfile = ["{}"]
resiliancy_npus = true
"#,
        path.display(),
    );
    let topology = build(&config);
    assert_eq!(topology.npus_count(), 32);
    assert_eq!(topology.devices_count(), 36);
    assert_eq!(topology.devices_count(), 32 + 32 / 8);

    let Topology::Basic(BasicTopology::Expander(graph)) = &topology else {
        panic!("expected an expander graph");
    };
    for node in 0..36 {
        assert_eq!(graph.adjacency()[node].len(), 8);
    }
    std::fs::remove_file(path).ok();
}

#[test]
fn test_switch_or_expander_modes() {
    let path = write_expander_descriptor("switch-or-expander", 18);
    let config = format!(
        r#"
topology = ["SwitchOrExpander"]
npus_count = [16]
bandwidth = [50.0]
latency = [500]
inputfile = ["{}"]
resiliancy_npus = true
"#,
        path.display(),
    );
    let modes = RoutingModeRegistry::new();
    let topology = NetworkConfig::from_str(&config)
        .unwrap()
        .build(&modes)
        .unwrap();
    assert_eq!(topology.npus_count(), 16);
    assert_eq!(topology.devices_count(), 18);
    assert_eq!(topology.devices_count(), 16 + 16 / 8);

    let Topology::Basic(BasicTopology::SwitchOrExpander(composite)) = &topology else {
        panic!("expected a switch-or-expander");
    };

    // MoE mode: expander routes
    modes.set_all(composite.arena_size(), true);
    for src in 0..16 {
        for dest in 0..16 {
            if src == dest {
                continue;
            }
            let route = composite.route(src, dest);
            assert!(route.len() <= 5);
            assert_eq!(composite.hops_count(src, dest), route.len() - 1);
        }
    }

    // switch mode: two hops via the hub
    modes.set_all(composite.arena_size(), false);
    for src in 0..16 {
        for dest in 0..16 {
            if src == dest {
                continue;
            }
            let route = composite.route(src, dest);
            assert_eq!(route.len(), 3);
            assert_eq!(composite.hops_count(src, dest), 2);
        }
    }

    // chunks traverse the switch path end to end
    let mut network = Network::new(topology);
    assert_eq!(send_one(&mut network, 1, 4, MIB), 42_942);
    std::fs::remove_file(path).ok();
}

#[test]
fn test_ep_expander_chunks_traverse_selected_route() {
    let routes = r#"{
        "metadata": { "node_count": 4, "degree": 2 },
        "routes": {
            "0": { "2": [ { "path": [0, 1, 2], "hops": 2, "weight": 0.5 },
                          { "path": [0, 3, 2], "hops": 2, "weight": 0.5 } ] }
        }
    }"#;
    let path = std::env::temp_dir().join(format!("fabricsim-ep-aware-{}.json", std::process::id()));
    std::fs::write(&path, routes).unwrap();

    let ep = fabricsim_core::build_ep_expander(&path, 50.0, 500).unwrap();
    ep.set_seed(21);
    let mut network = Network::new(Topology::Basic(BasicTopology::EpExpander(ep)));
    // both route options are two hops over real links
    let duration = send_one(&mut network, 0, 2, MIB);
    assert_eq!(duration, 2 * 21_471);
    std::fs::remove_file(path).ok();
}

#[test]
fn test_multi_dim_congestion_aware() {
    let topology = build(
        r#"
topology = ["Ring", "FullyConnected", "Switch"]
npus_count = [2, 8, 4]
bandwidth = [200.0, 100.0, 50.0]
latency = [50, 500, 2000]
"#,
    );
    let mut network = Network::new(topology);
    // single ring hop
    assert_eq!(send_one(&mut network, 0, 1, MIB), 5_292);
    // two switch-dim hops via an auxiliary hub
    assert_eq!(send_one(&mut network, 26, 42, MIB), 2 * 22_971);
}
