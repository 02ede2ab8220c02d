//! fabricsim CLI — cost message transfers over hypothetical interconnects.

use clap::{Parser, Subcommand};
use fabricsim_core::{
    simulate_all_gather, AnalyticalNetwork, Chunk, Network, NetworkConfig, QueueDiscipline,
};
use fabricsim_topology::{RoutingModeRegistry, Topology};
use serde::Serialize;
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser)]
#[command(
    name = "fabricsim",
    about = "Estimate message transfer times across accelerator interconnects",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a single transfer between two NPUs.
    Send {
        /// Path to TOML network configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Source NPU id.
        #[arg(long)]
        src: usize,
        /// Destination NPU id.
        #[arg(long)]
        dest: usize,
        /// Chunk size in bytes.
        #[arg(short, long, default_value = "1048576")]
        size: u64,
        /// Simulation mode: "aware" (event-driven) or "unaware" (analytical).
        #[arg(short, long, default_value = "aware")]
        mode: String,
        /// Route MoE traffic over the expander in SwitchOrExpander dims.
        #[arg(long)]
        moe: bool,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate an all-gather: every ordered NPU pair sends one chunk.
    AllGather {
        /// Path to TOML network configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Chunk size in bytes.
        #[arg(short, long, default_value = "1048576")]
        size: u64,
        /// Pick pending chunks uniformly at random instead of FIFO.
        #[arg(long)]
        random_queue: bool,
        /// Seed for randomized queueing and routing.
        #[arg(long)]
        seed: Option<u64>,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the parsed topology summary.
    Info {
        /// Path to TOML network configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Serialize)]
struct TransferResult {
    mode: String,
    src: usize,
    dest: usize,
    size_bytes: u64,
    route: Vec<usize>,
    completion_time_ns: u64,
}

#[derive(Serialize)]
struct AllGatherResult {
    npus_count: usize,
    size_bytes: u64,
    chunks_completed: usize,
    total_time_ns: u64,
}

fn load_topology(path: &PathBuf, moe: bool) -> Topology {
    let config = NetworkConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });
    let modes = RoutingModeRegistry::new();
    let topology = config.build(&modes).unwrap_or_else(|e| {
        eprintln!("Error building topology: {}", e);
        std::process::exit(1);
    });
    if moe {
        modes.set_all(topology.devices_count() + 1, true);
    }
    topology
}

fn write_json<T: Serialize>(value: &T, path: &PathBuf) {
    let json = serde_json::to_string_pretty(value).unwrap();
    std::fs::write(path, json).unwrap_or_else(|e| {
        eprintln!("Error writing output: {}", e);
        std::process::exit(1);
    });
    println!("Results written to {}", path.display());
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Send {
            config,
            src,
            dest,
            size,
            mode,
            moe,
            output,
        } => {
            let topology = load_topology(&config, moe);
            let result = match mode.as_str() {
                "aware" => {
                    let mut network = Network::new(topology);
                    let route = network.route(src, dest);
                    let completed = Rc::new(Cell::new(0));
                    let observer = Rc::clone(&completed);
                    network.send(Chunk::new(
                        size,
                        route.clone(),
                        Box::new(move |time| observer.set(time)),
                    ));
                    network.run();
                    TransferResult {
                        mode,
                        src,
                        dest,
                        size_bytes: size,
                        route,
                        completion_time_ns: completed.get(),
                    }
                }
                "unaware" => {
                    let network = AnalyticalNetwork::new(topology);
                    let completion = network.send(src, dest, size);
                    let route = network.topology().route(src, dest);
                    TransferResult {
                        mode,
                        src,
                        dest,
                        size_bytes: size,
                        route,
                        completion_time_ns: completion,
                    }
                }
                other => {
                    eprintln!("Unknown mode: {}. Use \"aware\" or \"unaware\".", other);
                    std::process::exit(1);
                }
            };

            println!(
                "{} -> {} ({} B, {} hops): {} ns",
                result.src,
                result.dest,
                result.size_bytes,
                result.route.len() - 1,
                result.completion_time_ns,
            );
            if let Some(path) = output {
                write_json(&result, &path);
            }
        }
        Commands::AllGather {
            config,
            size,
            random_queue,
            seed,
            output,
        } => {
            let topology = load_topology(&config, false);
            let mut network = Network::new(topology);
            if random_queue {
                network.set_discipline(QueueDiscipline::Random);
            }
            if let Some(seed) = seed {
                network.set_seed(seed);
            }
            let (total, completed) = simulate_all_gather(&mut network, size);
            let result = AllGatherResult {
                npus_count: network.npus_count(),
                size_bytes: size,
                chunks_completed: completed,
                total_time_ns: total,
            };
            println!(
                "all-gather over {} NPUs ({} chunks of {} B): {} ns",
                result.npus_count, result.chunks_completed, result.size_bytes, result.total_time_ns,
            );
            if let Some(path) = output {
                write_json(&result, &path);
            }
        }
        Commands::Info { config } => {
            let parsed = NetworkConfig::from_file(&config).unwrap_or_else(|e| {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            });
            let topology = parsed.build(&RoutingModeRegistry::new()).unwrap_or_else(|e| {
                eprintln!("Error building topology: {}", e);
                std::process::exit(1);
            });
            println!("dimensions: {}", parsed.dims_count());
            for dim in 0..parsed.dims_count() {
                println!(
                    "  dim {}: {} x {} @ {} GB/s, {} ns",
                    dim,
                    parsed.topology[dim],
                    parsed.npus_count[dim],
                    parsed.bandwidth[dim],
                    parsed.latency[dim],
                );
            }
            println!("npus_count: {}", topology.npus_count());
            println!("devices_count: {}", topology.devices_count());
        }
    }
}
