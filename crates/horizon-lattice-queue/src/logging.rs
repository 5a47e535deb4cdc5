//! Tracing targets used by the queue.
//!
//! The crate emits events through the `tracing` crate and never installs a
//! subscriber itself. Install one in the application to see them:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_lattice_queue=trace")
//!     .init();
//! ```

/// Span names used for tracing.
pub mod span_names {
    /// Consumer thread main loop.
    pub const CONSUMER_LOOP: &str = "horizon_lattice::queue::consumer_loop";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Crate-wide target.
    pub const CORE: &str = "horizon_lattice_queue";
    /// Message queue operations.
    pub const QUEUE: &str = "horizon_lattice_queue::queue";
    /// Consumer thread lifecycle.
    pub const CONSUMER: &str = "horizon_lattice_queue::consumer";
}
