//! Scoped transport resources.
//!
//! Acquiring maps the region, opens both signals and stamps the proxy's
//! version into the info page. Dropping releases everything, including the
//! backing files this process created.

use std::sync::Arc;

use elaphure_core::{SharedRegion, Signal, TransportHandle};
use tracing::info;

use crate::{
    config::ResourceNames,
    error::InitError,
    shm::{FifoSignal, MappedRegion},
};

/// Human-readable version written to the info page.
pub const VERSION_STRING: &str = concat!("elaphure-proxy ", env!("CARGO_PKG_VERSION"));

/// Mapped region plus signal pair.
pub struct ProxyResources {
    handle: TransportHandle<MappedRegion>,
}

impl ProxyResources {
    /// Acquire every resource named by `names`.
    ///
    /// Partially acquired resources are released again on failure.
    pub fn acquire(names: &ResourceNames) -> Result<Self, InitError> {
        let memory_path = names.memory_path();
        let region = MappedRegion::open_or_create(&memory_path)
            .map_err(|source| InitError::Region { path: memory_path, source })?;

        let producer = open_signal(names.producer_path())?;
        let consumer = open_signal(names.consumer_path())?;

        region.with_memory(|memory| {
            memory.info.set_version(
                version_part(env!("CARGO_PKG_VERSION_MAJOR")),
                version_part(env!("CARGO_PKG_VERSION_MINOR")),
                version_part(env!("CARGO_PKG_VERSION_PATCH")),
                VERSION_STRING,
            );
            memory.info.set_ready(false);
        });

        info!(dir = %names.dir.display(), "transport resources acquired");
        Ok(Self { handle: TransportHandle::new(Arc::new(region), producer, consumer) })
    }

    /// Handle threaded through sessions.
    pub fn handle(&self) -> &TransportHandle<MappedRegion> {
        &self.handle
    }

    /// Allow or forbid vendor commands.
    pub fn set_vendor_commands(&self, enabled: bool) {
        self.handle.region().with_memory(|memory| {
            memory.info.enable_vendor_command = u32::from(enabled);
        });
    }
}

fn open_signal(path: std::path::PathBuf) -> Result<Arc<dyn Signal>, InitError> {
    match FifoSignal::open_or_create(&path) {
        Ok(signal) => Ok(Arc::new(signal)),
        Err(source) => Err(InitError::Signal { path, source }),
    }
}

fn version_part(part: &str) -> u32 {
    part.parse().unwrap_or(0)
}
