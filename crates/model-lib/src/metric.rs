//! Telemetry metric identifiers
//!
//! Every metric name doubles as the column header in telemetry tables and as
//! a key in persisted files, so the set is closed and the strings are fixed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column holding the job (workload) name in every telemetry table
pub const JOB_COLUMN: &str = "name";

/// Metrics calculated from platform measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "cycle")]
    Cycles,
    #[serde(rename = "instruction")]
    Instructions,
    #[serde(rename = "cache_miss")]
    CacheMiss,
    #[serde(rename = "cache_occupancy")]
    CacheOccupancy,
    #[serde(rename = "memory_bandwidth_total")]
    MemoryBandwidth,
    #[serde(rename = "memory_bandwidth_local")]
    MemoryBandwidthLocal,
    #[serde(rename = "memory_bandwidth_remote")]
    MemoryBandwidthRemote,
    #[serde(rename = "cycles_per_instruction")]
    CyclesPerInstruction,
    #[serde(rename = "cache_miss_per_kilo_instruction")]
    CacheMissPerKiloInstruction,
    #[serde(rename = "normalized_frequency")]
    NormalizedFrequency,
    #[serde(rename = "cpu_utilization")]
    CpuUtilization,
    #[serde(rename = "stalls_l2_miss")]
    StallsL2Miss,
    #[serde(rename = "stalls_mem_load")]
    StallsMemLoad,
    #[serde(rename = "stalls_l2miss_per_kilo_instruction")]
    StallsL2MissPerKiloInstruction,
    #[serde(rename = "stalls_memory_load_per_kilo_instruction")]
    StallsMemLoadPerKiloInstruction,
    #[serde(rename = "latency_critical_utilization_capacity")]
    LatencyCriticalUtilizationCapacity,
    #[serde(rename = "latency_critical_utilization_max")]
    LatencyCriticalUtilizationMax,
    #[serde(rename = "system_utilization")]
    SystemUtilization,
}

impl Metric {
    /// All metrics in declaration order
    pub const ALL: [Metric; 18] = [
        Metric::Cycles,
        Metric::Instructions,
        Metric::CacheMiss,
        Metric::CacheOccupancy,
        Metric::MemoryBandwidth,
        Metric::MemoryBandwidthLocal,
        Metric::MemoryBandwidthRemote,
        Metric::CyclesPerInstruction,
        Metric::CacheMissPerKiloInstruction,
        Metric::NormalizedFrequency,
        Metric::CpuUtilization,
        Metric::StallsL2Miss,
        Metric::StallsMemLoad,
        Metric::StallsL2MissPerKiloInstruction,
        Metric::StallsMemLoadPerKiloInstruction,
        Metric::LatencyCriticalUtilizationCapacity,
        Metric::LatencyCriticalUtilizationMax,
        Metric::SystemUtilization,
    ];

    /// Column identifier used in telemetry tables
    pub const fn as_str(&self) -> &'static str {
        match self {
            Metric::Cycles => "cycle",
            Metric::Instructions => "instruction",
            Metric::CacheMiss => "cache_miss",
            Metric::CacheOccupancy => "cache_occupancy",
            Metric::MemoryBandwidth => "memory_bandwidth_total",
            Metric::MemoryBandwidthLocal => "memory_bandwidth_local",
            Metric::MemoryBandwidthRemote => "memory_bandwidth_remote",
            Metric::CyclesPerInstruction => "cycles_per_instruction",
            Metric::CacheMissPerKiloInstruction => "cache_miss_per_kilo_instruction",
            Metric::NormalizedFrequency => "normalized_frequency",
            Metric::CpuUtilization => "cpu_utilization",
            Metric::StallsL2Miss => "stalls_l2_miss",
            Metric::StallsMemLoad => "stalls_mem_load",
            Metric::StallsL2MissPerKiloInstruction => "stalls_l2miss_per_kilo_instruction",
            Metric::StallsMemLoadPerKiloInstruction => "stalls_memory_load_per_kilo_instruction",
            Metric::LatencyCriticalUtilizationCapacity => "latency_critical_utilization_capacity",
            Metric::LatencyCriticalUtilizationMax => "latency_critical_utilization_max",
            Metric::SystemUtilization => "system_utilization",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the known metric identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric identifier '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}
