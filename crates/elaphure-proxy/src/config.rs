//! Proxy configuration.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use elaphure_core::KeepAlivePolicy;

/// TCP port probes listen on.
pub const DEFAULT_PORT: u16 = 3240;

/// Names of the shared region and the two signals.
///
/// Each name becomes a file in `dir`, so both processes find the same
/// objects by agreeing on the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    /// Directory holding the backing files
    pub dir: PathBuf,
    /// Shared region
    pub memory: String,
    /// Signal raised by the producer
    pub producer_event: String,
    /// Signal raised by the proxy
    pub consumer_event: String,
}

impl ResourceNames {
    /// Standard names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            memory: "elaphure.Memory".to_string(),
            producer_event: "elaphure.Event.Producer".to_string(),
            consumer_event: "elaphure.Event.Consumer".to_string(),
        }
    }

    /// Path of the region's backing file.
    pub fn memory_path(&self) -> PathBuf {
        self.dir.join(&self.memory)
    }

    /// Path of the producer FIFO.
    pub fn producer_path(&self) -> PathBuf {
        self.dir.join(&self.producer_event)
    }

    /// Path of the consumer FIFO.
    pub fn consumer_path(&self) -> PathBuf {
        self.dir.join(&self.consumer_event)
    }
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self::in_dir(default_runtime_dir())
    }
}

/// `/dev/shm` where it exists, the temp directory otherwise.
pub fn default_runtime_dir() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if shm.is_dir() { shm.to_path_buf() } else { env::temp_dir() }
}

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Probe port
    pub port: u16,
    /// Keep-alive tuning applied after connect
    pub keepalive: KeepAlivePolicy,
    /// Deadline for each wire read and write; `None` waits forever
    pub io_timeout: Option<Duration>,
    /// Shared object names
    pub names: ResourceNames,
    /// Pause after a forced stop before a new session may start
    pub stop_grace: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            keepalive: KeepAlivePolicy::default(),
            io_timeout: None,
            names: ResourceNames::default(),
            stop_grace: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_inside_dir() {
        let names = ResourceNames::in_dir("/run/elaphure");
        assert_eq!(names.memory_path(), Path::new("/run/elaphure/elaphure.Memory"));
        assert_eq!(names.producer_path(), Path::new("/run/elaphure/elaphure.Event.Producer"));
        assert_eq!(names.consumer_path(), Path::new("/run/elaphure/elaphure.Event.Consumer"));
    }

    #[test]
    fn defaults_are_strict() {
        let config = ProxyConfig::default();
        assert_eq!(config.port, 3240);
        assert_eq!(config.io_timeout, None);
        assert_eq!(config.stop_grace, Duration::from_millis(100));
    }
}
