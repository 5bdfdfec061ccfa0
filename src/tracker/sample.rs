//! Process-wide samples.

use serde::{Deserialize, Serialize};

use crate::runtime::{BlockCounts, MemoryStats};

/// One timestamped, process-wide observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Capture time, milliseconds since epoch.
    pub time: i64,
    /// Scheduled tasks.
    #[serde(rename = "goroutines")]
    pub tasks: usize,
    /// Requests in the trailing request window.
    pub requests: usize,
    pub heap_alloc: u64,
    pub heap_inuse: u64,
    pub heap_sys: u64,
    pub heap_objects: u64,
    /// Cumulative reclamation count.
    #[serde(rename = "numGC")]
    pub num_gc: u32,
    /// Reclamations since the previous sample.
    pub gc_increment: u32,
    pub block_lock: usize,
    #[serde(rename = "blockIO")]
    pub block_io: usize,
    pub block_perm: usize,
}

impl Sample {
    pub(crate) fn new(
        time: i64,
        tasks: usize,
        requests: usize,
        memory: MemoryStats,
        gc_increment: u32,
        blocks: BlockCounts,
    ) -> Self {
        Self {
            time,
            tasks,
            requests,
            heap_alloc: memory.heap_alloc,
            heap_inuse: memory.heap_inuse,
            heap_sys: memory.heap_sys,
            heap_objects: memory.heap_objects,
            num_gc: memory.reclaims,
            gc_increment,
            block_lock: blocks.lock,
            block_io: blocks.io,
            block_perm: blocks.long_blocked,
        }
    }
}

/// Reclamations between two cumulative readings.
///
/// A reading lower than the previous one means the counter wrapped or was
/// reset, so the new absolute value is taken as the increment.
pub fn gc_increment(previous: u32, current: u32) -> u32 {
    if current >= previous {
        current - previous
    } else {
        current
    }
}
