//! Shared unit types for the topology and engine layers.
//!
//! Simulated time is integer nanoseconds. Bandwidth is configured in GB/s
//! and converted 1:1 to bytes-per-nanosecond for arithmetic.

/// Identifier of a routable node (NPU or switch/auxiliary device).
///
/// NPUs occupy `[0, npus_count)`; auxiliary devices occupy
/// `[npus_count, devices_count)`.
pub type DeviceId = usize;

/// Link bandwidth in GB/s (decimal 10^9).
pub type Bandwidth = f64;

/// Link latency in nanoseconds.
pub type Latency = u64;

/// A point in simulated time, in nanoseconds.
pub type EventTime = u64;

/// Payload size of a chunk, in bytes.
pub type ChunkSize = u64;

/// An ordered sequence of device ids from source to destination.
/// Adjacent entries are always connected by a link.
pub type Route = Vec<DeviceId>;

/// A directed-pair link specification used to materialize links in the
/// congestion-aware engine. `connect` installs both directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub a: DeviceId,
    pub b: DeviceId,
    pub bandwidth: Bandwidth,
    pub latency: Latency,
}

/// Convert bandwidth from GB/s to bytes per nanosecond.
///
/// 1 GB/s = 10^9 B/s = 1 B/ns. Decimal GB, not GiB: a 2^30-based
/// conversion inflates bandwidth by 7.37%.
pub fn bw_gbps_to_bpns(bw_gbps: Bandwidth) -> f64 {
    debug_assert!(bw_gbps > 0.0);
    bw_gbps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bandwidth_conversion_is_decimal() {
        assert_eq!(bw_gbps_to_bpns(1.0), 1.0);
        assert_eq!(bw_gbps_to_bpns(50.0), 50.0);
    }

    #[test]
    fn test_serialization_time_of_one_mib() {
        // 1 MiB at 50 GB/s: 1_048_576 / 50 = 20_971.52 ns
        let bpns = bw_gbps_to_bpns(50.0);
        let nanos = 1_048_576.0 / bpns;
        assert!((nanos - 20_971.52).abs() < 1e-9);
    }
}
