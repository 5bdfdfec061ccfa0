//! Runtime introspection subsystem.
//!
//! # Data Flow
//! ```text
//! TrackingAllocator (global allocator counters)
//!     → probe.rs (MemoryStats)
//!
//! tracking middleware / spawn_labeled
//!     → tasks.rs (TaskRegistry: route label + wait state per task)
//!     → probe.rs (task_dump text)
//!     → classify.rs (lock / io / long-blocked counts)
//! ```
//!
//! # Design Decisions
//! - Consumers depend on the `RuntimeProbe` trait, never on the allocator or
//!   registry directly, so classification can run against synthetic dumps
//! - The dump is plain text; the classifier is a best-effort parser and
//!   skips anything it does not recognise
//! - Route labels travel in a task-local and are inherited at spawn time

pub mod alloc;
pub mod classify;
pub mod probe;
pub mod tasks;

pub use alloc::TrackingAllocator;
pub use classify::{classify, classify_by_route, BlockCounts};
pub use probe::{MemoryStats, ProcessProbe, RuntimeProbe};
pub use tasks::{current_route, wait_on, TaskRegistry, TaskState};
