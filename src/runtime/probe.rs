//! Runtime snapshot provider.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::runtime::alloc::TrackingAllocator;
use crate::runtime::tasks::TaskRegistry;

/// Instantaneous heap figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Bytes currently allocated.
    pub heap_alloc: u64,
    /// Allocated bytes rounded up to allocator size classes.
    pub heap_inuse: u64,
    /// High-water mark of `heap_inuse`.
    pub heap_sys: u64,
    /// Live allocations.
    pub heap_objects: u64,
    /// Cumulative deallocations, wrapping at `u32::MAX`.
    pub reclaims: u32,
}

/// Capability interface over process introspection.
pub trait RuntimeProbe: Send + Sync {
    /// Current heap figures.
    fn memory(&self) -> MemoryStats;

    /// Number of tasks currently scheduled.
    fn scheduled_tasks(&self) -> usize;

    /// Text snapshot of tracked task states, one block per task.
    fn task_dump(&self) -> String;
}

/// Probe backed by the tracking allocator, the tokio runtime and a task registry.
#[derive(Debug, Clone)]
pub struct ProcessProbe {
    tasks: Arc<TaskRegistry>,
}

impl ProcessProbe {
    pub fn new(tasks: Arc<TaskRegistry>) -> Self {
        Self { tasks }
    }
}

impl RuntimeProbe for ProcessProbe {
    fn memory(&self) -> MemoryStats {
        TrackingAllocator::stats()
    }

    fn scheduled_tasks(&self) -> usize {
        match Handle::try_current() {
            Ok(handle) => handle.metrics().num_alive_tasks(),
            Err(_) => self.tasks.len(),
        }
    }

    fn task_dump(&self) -> String {
        self.tasks.dump()
    }
}
