//! What a scenario run observed.

use elaphure_core::{SessionState, SharedMemory};

use crate::{Completion, ListenerEvent, ProbeLog};

/// Device fields of the info page at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    /// `is_proxy_ready`
    pub ready: bool,
    /// Product name without padding
    pub product_name: Vec<u8>,
    /// Serial number without padding
    pub serial_number: Vec<u8>,
    /// Firmware version without padding
    pub firmware_version: Vec<u8>,
    /// Capabilities bitmap
    pub capabilities: u32,
    /// Final consumer status
    pub command_response: u32,
}

impl DeviceSnapshot {
    /// Capture the info page and the consumer status.
    pub fn capture(memory: &SharedMemory) -> Self {
        Self {
            ready: memory.info.is_ready(),
            product_name: memory.info.product_name().to_vec(),
            serial_number: memory.info.serial_number().to_vec(),
            firmware_version: memory.info.firmware_version().to_vec(),
            capabilities: memory.info.capabilities,
            command_response: memory.consumer.command_response,
        }
    }
}

/// Observations of one scenario run.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// State the session ended in
    pub final_state: SessionState,
    /// `Relaying` if session setup completed, `Closed` otherwise
    pub reached: SessionState,
    /// Producer completions in submission order
    pub completions: Vec<Completion>,
    /// Listener notifications in arrival order
    pub events: Vec<ListenerEvent>,
    /// What the probe received
    pub probe: ProbeLog,
    /// Region contents after the run
    pub device: DeviceSnapshot,
}

impl Outcome {
    /// Messages passed to `on_disconnect`.
    pub fn disconnects(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ListenerEvent::Disconnected(message) => Some(message.as_str()),
                ListenerEvent::Connected(_) => None,
            })
            .collect()
    }

    /// Messages passed to `on_connect`.
    pub fn connects(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ListenerEvent::Connected(message) => Some(message.as_str()),
                ListenerEvent::Disconnected(_) => None,
            })
            .collect()
    }
}
