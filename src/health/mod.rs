//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (monitor.rs)
//!     → probe.rs: probe every registered backend concurrently,
//!       each bounded by the probe timeout
//!     → state.rs: apply outcomes to the hysteresis state machine
//!     → weights recomputed from the new states
//!     → health + weights published as one snapshot
//!
//! Request routing reads the published snapshot only.
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - One probe's failure never aborts the cycle
//! - Probe failures are never surfaced to request callers
//! - Health state is owned exclusively by the monitor

pub mod monitor;
pub mod probe;
pub mod state;

pub use monitor::{CycleReport, HealthMonitor, HealthTable, MonitorSettings};
pub use probe::{HttpProber, ProbeError, ProbeReport, Prober};
pub use state::{HealthState, HealthStatus, Thresholds, Transition};
