//! Test tooling for the elaphure proxy.
//!
//! A scripted probe peer, a fake command producer and a recording listener,
//! plus a Turmoil-based scenario runner that drives a full session through a
//! simulated network and hands the observed outcome to an oracle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod probe;
pub mod producer;
pub mod recorder;
pub mod scenario;
pub mod sim_connector;

pub use probe::{LinkEvent, MockProbe, ProbeLog, ProbeScript, Reply, info_record};
pub use producer::{Completion, FakeProducer};
pub use recorder::{ListenerEvent, RecordingListener};
pub use scenario::{DeviceSnapshot, OracleFn, Outcome, PROBE_PORT, RunnableScenario, Scenario};
pub use sim_connector::SimConnector;
