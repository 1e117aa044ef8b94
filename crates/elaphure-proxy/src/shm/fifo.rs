//! FIFO-backed signal for cross-process wakeup.
//!
//! Raising writes one byte; waiting drains every pending byte, so any number
//! of raises before a wait collapse into one. The FIFO is opened read-write
//! and non-blocking, which keeps it open even while the other process has
//! not attached yet.

#![allow(unsafe_code)]

use std::{
    ffi::CString,
    fs::{File, OpenOptions},
    io::{self, ErrorKind, Read, Write},
    os::unix::{
        ffi::OsStrExt,
        fs::{FileTypeExt, OpenOptionsExt},
        io::OwnedFd,
    },
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use elaphure_core::Signal;
use tokio::io::{Interest, unix::AsyncFd};
use tracing::{debug, warn};

/// Named binary signal.
#[derive(Debug)]
pub struct FifoSignal {
    file: File,
    path: PathBuf,
    owns_fifo: bool,
}

impl FifoSignal {
    /// Open the FIFO at `path`, creating it if needed.
    pub fn open_or_create(path: &Path) -> io::Result<Self> {
        let owns_fifo = make_fifo(path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;

        if !file.metadata()?.file_type().is_fifo() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} exists and is not a FIFO", path.display()),
            ));
        }

        debug!(path = %path.display(), created = owns_fifo, "opened signal");
        Ok(Self { file, path: path.to_path_buf(), owns_fifo })
    }

    /// Path of the FIFO.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every pending byte. True if there was at least one.
    fn drain(&self) -> io::Result<bool> {
        let mut buf = [0u8; 64];
        let mut drained = false;

        loop {
            match (&self.file).read(&mut buf) {
                Ok(0) => break,
                Ok(_) => drained = true,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => {},
                Err(err) => return Err(err),
            }
        }

        Ok(drained)
    }
}

#[async_trait]
impl Signal for FifoSignal {
    fn raise(&self) -> io::Result<()> {
        match (&self.file).write(&[1]) {
            Ok(_) => Ok(()),
            // A full pipe is already raised.
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn wait(&self) -> io::Result<()> {
        if self.drain()? {
            return Ok(());
        }

        // Registered per wait: each session runs its own runtime.
        let owned = OwnedFd::from(self.file.try_clone()?);
        #[allow(deprecated)] // tokio 1.53 deprecation; behavior unchanged
        let fd = AsyncFd::with_interest(owned, Interest::READABLE)?;
        loop {
            let mut guard = fd.readable().await?;
            if self.drain()? {
                return Ok(());
            }
            guard.clear_ready();
        }
    }

    fn try_wait(&self) -> io::Result<bool> {
        self.drain()
    }
}

impl Drop for FifoSignal {
    fn drop(&mut self) {
        if self.owns_fifo {
            if let Err(err) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %err, "failed to remove signal");
            }
        }
    }
}

/// Create a FIFO at `path`. False if one already exists.
fn make_fifo(path: &Path) -> io::Result<bool> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "signal path contains NUL"))?;

    // SAFETY: `c_path` is a valid NUL-terminated string.
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if ret == 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    if err.kind() == ErrorKind::AlreadyExists { Ok(false) } else { Err(err) }
}
