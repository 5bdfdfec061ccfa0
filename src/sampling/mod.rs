//! Periodic sampling subsystem.
//!
//! # Data Flow
//! ```text
//! ticker (sampling.interval_ms)
//!     → Monitor::push_sample (probe + classifier + window count)
//!     → History (bounded FIFO)
//!     → Hub::notify
//!     → Prometheus gauges (when the exporter is installed)
//! ```

pub mod scheduler;

pub use scheduler::Sampler;
