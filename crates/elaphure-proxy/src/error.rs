//! Proxy error types.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Transport resources could not be acquired.
#[derive(Debug, Error)]
pub enum InitError {
    /// Shared region could not be created or mapped
    #[error("failed to map shared region {path}: {source}")]
    Region {
        /// Backing file
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Named signal could not be created or opened
    #[error("failed to open signal {path}: {source}")]
    Signal {
        /// Backing FIFO
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
}

/// Errors surfaced by the session manager and the host API.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Resources are missing
    #[error(transparent)]
    Init(#[from] InitError),

    /// Worker thread could not be spawned
    #[error("failed to spawn session worker: {0}")]
    Spawn(#[source] io::Error),

    /// Session closed before setup completed
    #[error("session to {target} failed during setup")]
    SetupFailed {
        /// `host:port` that was dialed
        target: String,
    },
}
