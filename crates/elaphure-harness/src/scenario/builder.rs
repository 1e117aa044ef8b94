//! Scenario builder API.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use elaphure_core::{
    ChannelSignal, HeapRegion, SessionDriver, SessionState, SessionTarget, SharedRegion,
    Shutdown, TransportHandle,
};
use tracing::debug;

use crate::{
    FakeProducer, MockProbe, ProbeScript, RecordingListener, SimConnector,
    scenario::{DeviceSnapshot, Outcome},
};

/// Port the simulated probe listens on.
pub const PROBE_PORT: u16 = 3240;

/// Verdict over a finished run.
pub type OracleFn = Box<dyn FnOnce(&Outcome) -> Result<(), String>>;

/// Scenario builder.
///
/// Must call `.oracle()` to get a [`RunnableScenario`].
pub struct Scenario {
    name: String,
    script: ProbeScript,
    batches: Vec<(u32, Bytes)>,
    io_timeout: Option<Duration>,
    latency: Option<Duration>,
}

impl Scenario {
    /// Create a scenario against a well-behaved probe.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: ProbeScript::new(),
            batches: Vec::new(),
            io_timeout: None,
            latency: None,
        }
    }

    /// Replace the probe script.
    #[must_use]
    pub fn probe(mut self, script: ProbeScript) -> Self {
        self.script = script;
        self
    }

    /// Submit this batch once the session is relaying.
    #[must_use]
    pub fn batch(mut self, command_count: u32, data: impl Into<Bytes>) -> Self {
        self.batches.push((command_count, data.into()));
        self
    }

    /// Bound wire I/O.
    #[must_use]
    pub fn io_timeout(mut self, limit: Duration) -> Self {
        self.io_timeout = Some(limit);
        self
    }

    /// Fixed one-way network latency.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Set the oracle and return a runnable scenario.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// The probe host serves one connection. The proxy host runs a session
    /// driver next to a fake producer that submits every batch once the
    /// session is relaying, stopping early if it closes, then requests a
    /// stop.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, script, batches, io_timeout, latency } = self.scenario;

        let mut builder = turmoil::Builder::new();
        builder.simulation_duration(Duration::from_secs(60));
        if let Some(latency) = latency {
            builder.min_message_latency(latency).max_message_latency(latency);
        }
        let mut sim = builder.build();

        let probe = MockProbe::new(script);
        let server = probe.clone();
        sim.host("probe", move || {
            let server = server.clone();
            async move {
                let listener =
                    turmoil::net::TcpListener::bind(format!("0.0.0.0:{PROBE_PORT}").as_str())
                        .await?;
                let (stream, _) = listener.accept().await?;
                server.serve(stream).await?;
                Ok(())
            }
        });

        let observed: Arc<Mutex<Option<Outcome>>> = Arc::default();
        let sink = Arc::clone(&observed);
        let log = probe.clone();
        sim.client("proxy", async move {
            let handle = TransportHandle::new(
                Arc::new(HeapRegion::new()),
                Arc::new(ChannelSignal::new()),
                Arc::new(ChannelSignal::new()),
            );
            let listener = Arc::new(RecordingListener::new());
            let shutdown = Arc::new(Shutdown::new());
            let mut driver =
                SessionDriver::new(handle.clone(), listener.clone(), Arc::clone(&shutdown))
                    .with_io_timeout(io_timeout);
            let mut states = driver.subscribe();
            let producer = FakeProducer::new(handle.clone());
            let target = SessionTarget::new("probe", PROBE_PORT);

            let host = async {
                let reached = states
                    .wait_for(|state| {
                        matches!(state, SessionState::Relaying | SessionState::Closed)
                    })
                    .await
                    .map_or(SessionState::Closed, |state| *state);

                let mut completions = Vec::new();
                if reached == SessionState::Relaying {
                    for (command_count, data) in &batches {
                        completions.push(producer.submit(*command_count, data).await?);
                        if *states.borrow() == SessionState::Closed {
                            break;
                        }
                    }
                }

                shutdown.trigger();
                Ok::<_, elaphure_core::SessionError>((reached, completions))
            };

            let (final_state, host) = tokio::join!(driver.run(&SimConnector, &target), host);
            let (reached, completions) = host?;
            debug!(?final_state, ?reached, batches = completions.len(), "scenario finished");

            let device = handle.region().with_memory(|memory| DeviceSnapshot::capture(memory));
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(Outcome {
                final_state,
                reached,
                completions,
                events: listener.events(),
                probe: log.log(),
                device,
            });
            Ok(())
        });

        sim.run().map_err(|e| format!("Scenario '{name}': simulation failed: {e}"))?;

        let mut outcome = observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| format!("Scenario '{name}': proxy produced no outcome"))?;
        outcome.probe = probe.log();

        (self.oracle)(&outcome).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_requires_oracle() {
        let _scenario = Scenario::new("test").batch(1, vec![0x05]).oracle(Box::new(|_| Ok(())));
    }
}
