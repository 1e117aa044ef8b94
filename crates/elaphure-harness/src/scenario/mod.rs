//! Scenario framework.
//!
//! A scenario scripts the probe, lists the batches the producer submits, and
//! must end in an oracle that judges the observed [`Outcome`]. The session
//! runs under Turmoil, so every run is deterministic.

mod builder;
pub mod oracle;
mod outcome;

pub use builder::{OracleFn, PROBE_PORT, RunnableScenario, Scenario};
pub use outcome::{DeviceSnapshot, Outcome};
